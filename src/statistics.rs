//! Per-pixel statistics that `dem_mosaic` can compute for a tile

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported `dem_mosaic` statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    /// Value of the first input covering the pixel
    First,
    /// Index of the first input covering the pixel
    Firstindex,
    /// Value of the last input covering the pixel
    Last,
    /// Index of the last input covering the pixel
    Lastindex,
    Min,
    Max,
    Mean,
    Stddev,
    /// Number of valid inputs per pixel
    Count,
    Median,
    /// Index of the input holding the median value
    Medianindex,
    /// Normalized median absolute deviation
    Nmad,
    /// Weighted mean, the `dem_mosaic` default
    Wmean,
}

impl Stat {
    /// Name used in file names and on the command line
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Firstindex => "firstindex",
            Self::Last => "last",
            Self::Lastindex => "lastindex",
            Self::Min => "min",
            Self::Max => "max",
            Self::Mean => "mean",
            Self::Stddev => "stddev",
            Self::Count => "count",
            Self::Median => "median",
            Self::Medianindex => "medianindex",
            Self::Nmad => "nmad",
            Self::Wmean => "wmean",
        }
    }

    /// Statistics producing an input index map that is converted to timestamps afterwards
    #[must_use]
    pub const fn is_index(self) -> bool {
        matches!(self, Self::Firstindex | Self::Lastindex | Self::Medianindex)
    }

    /// `dem_mosaic` flags selecting this statistic.
    ///
    /// The weighted mean is the tool's default and needs no flag. Index statistics run
    /// their base statistic and ask for the index map to be saved.
    #[must_use]
    pub fn dem_mosaic_flags(self) -> Vec<String> {
        match self {
            Self::Wmean => Vec::new(),
            s if s.is_index() => vec![
                format!("--{}", s.as_str().trim_end_matches("index")),
                "--save-index-map".to_string(),
            ],
            s => vec![format!("--{}", s.as_str())],
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dem_mosaic_flags() {
        assert!(Stat::Wmean.dem_mosaic_flags().is_empty());
        assert_eq!(Stat::Count.dem_mosaic_flags(), vec!["--count"]);
        assert_eq!(
            Stat::Lastindex.dem_mosaic_flags(),
            vec!["--last", "--save-index-map"]
        );
    }

    #[test]
    fn test_value_enum_names_match_as_str() {
        for stat in Stat::value_variants() {
            let pv = stat.to_possible_value().unwrap();
            assert_eq!(pv.get_name(), stat.as_str());
        }
    }
}
