//! Spatial reference handling shared by all raster backends

use crate::errors::{MosaicError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A spatial reference system, kept as its textual definition.
///
/// The definition is whatever the active backend produces: `EPSG:nnnn` for the
/// GeoTIFF reader, a PROJ string for the GDAL reader. It is passed to `dem_mosaic`
/// verbatim as `--t_srs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Srs {
    pub definition: String,
    pub geographic: bool,
}

impl Srs {
    #[must_use]
    pub fn new(definition: impl Into<String>, geographic: bool) -> Self {
        Self {
            definition: normalize(&definition.into()),
            geographic,
        }
    }

    /// Build an Srs from an EPSG code.
    ///
    /// Without a projection database the geographic flag is inferred from the code
    /// range: the EPSG registry places geographic 2D systems at 4000-4999.
    #[must_use]
    pub fn from_epsg(code: u32, geographic: Option<bool>) -> Self {
        let geographic = geographic.unwrap_or((4000..5000).contains(&code));
        Self::new(format!("EPSG:{code}"), geographic)
    }

    /// Parse `EPSG:nnnn` (any case), or a bare EPSG number.
    ///
    /// # Errors
    ///
    /// Returns [`MosaicError::UnsupportedSrs`] for anything else.
    pub fn parse_epsg(definition: &str) -> Result<Self> {
        let trimmed = definition.trim();
        let code_str = trimmed
            .get(..5)
            .filter(|p| p.eq_ignore_ascii_case("epsg:"))
            .map_or(trimmed, |_| &trimmed[5..]);
        code_str
            .parse::<u32>()
            .map(|code| Self::from_epsg(code, None))
            .map_err(|_| MosaicError::UnsupportedSrs(definition.to_string()))
    }

    /// EPSG code when the definition is of the `EPSG:nnnn` form
    #[must_use]
    pub fn epsg_code(&self) -> Option<u32> {
        self.definition.strip_prefix("EPSG:")?.parse().ok()
    }
}

impl PartialEq for Srs {
    fn eq(&self, other: &Self) -> bool {
        self.definition == other.definition
    }
}

impl fmt::Display for Srs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.definition)
    }
}

fn normalize(definition: &str) -> String {
    let trimmed = definition.trim();
    match trimmed.get(..5) {
        Some(p) if p.eq_ignore_ascii_case("epsg:") => format!("EPSG:{}", &trimmed[5..]),
        _ => trimmed.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_epsg_forms() {
        assert_eq!(Srs::parse_epsg("epsg:32610").unwrap().epsg_code(), Some(32610));
        assert_eq!(Srs::parse_epsg("4326").unwrap().epsg_code(), Some(4326));
        assert!(Srs::parse_epsg("+proj=utm +zone=10").is_err());
    }

    #[test]
    fn test_geographic_inference() {
        assert!(Srs::from_epsg(4326, None).geographic);
        assert!(!Srs::from_epsg(32610, None).geographic);
        assert!(!Srs::from_epsg(4326, Some(false)).geographic);
    }

    #[test]
    fn test_equality_ignores_case_and_spacing() {
        assert_eq!(Srs::new("epsg:3413", false), Srs::new("EPSG:3413", false));
        assert_eq!(
            Srs::new("+proj=stere  +lat_0=90", false),
            Srs::new(" +proj=stere +lat_0=90", false)
        );
    }
}
