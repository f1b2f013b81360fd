//! Negotiation of the common mosaic parameters
//!
//! Every input raster has its own coordinate system, pixel size and extent. This
//! module reduces them to one [`MosaicParams`] value: the output reference system,
//! a single square resolution, and an extent snapped outward to whole pixels so that
//! tile boundaries fall on pixel edges.
//!
//! Each parameter is chosen by a policy given on the command line:
//!
//! | Policy | Keywords | Other accepted forms |
//! |--------|----------|----------------------|
//! | [`SrsPolicy`] | `first`, `last` | raster path, EPSG code / PROJ / WKT |
//! | [`ResolutionPolicy`] | `first`, `last`, `min`, `max`, `mean`, `median` | number, raster path |
//! | [`ExtentPolicy`] | `union`, `intersection`, `first`, `last` | `xmin ymin xmax ymax`, raster path |

use crate::data_source::{Footprint, RasterInfo, RasterReader};
use crate::errors::{MosaicError, Result};
use crate::extent::Extent;
use crate::srs::Srs;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How the output spatial reference is chosen
#[derive(Debug, Clone, PartialEq)]
pub enum SrsPolicy {
    First,
    Last,
    /// Use the reference system of this raster
    Raster(PathBuf),
    /// A definition understood by the active [`RasterReader`]
    Definition(String),
}

/// How the output resolution is chosen
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionPolicy {
    First,
    Last,
    Min,
    Max,
    Mean,
    Median,
    Value(f64),
    Raster(PathBuf),
}

/// How the output extent is chosen
#[derive(Debug, Clone, PartialEq)]
pub enum ExtentPolicy {
    Union,
    Intersection,
    First,
    Last,
    Explicit(Extent),
    Raster(PathBuf),
}

fn existing_path(s: &str) -> Option<PathBuf> {
    let p = Path::new(s);
    p.is_file().then(|| p.to_path_buf())
}

impl SrsPolicy {
    /// Parse a `--t-srs` argument.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty string.
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        match s.trim() {
            "" => Err("empty spatial reference".to_string()),
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            other => Ok(existing_path(other)
                .map_or_else(|| Self::Definition(other.to_string()), Self::Raster)),
        }
    }
}

impl ResolutionPolicy {
    /// Parse a `--tr` argument.
    ///
    /// # Errors
    ///
    /// Returns an error if the argument is neither a keyword, a positive number nor
    /// an existing file.
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        let s = s.trim();
        match s {
            "first" => return Ok(Self::First),
            "last" => return Ok(Self::Last),
            "min" => return Ok(Self::Min),
            "max" => return Ok(Self::Max),
            "mean" => return Ok(Self::Mean),
            "median" | "med" => return Ok(Self::Median),
            _ => {}
        }
        if let Ok(v) = s.parse::<f64>() {
            return if v.is_finite() && v > 0.0 {
                Ok(Self::Value(v))
            } else {
                Err(format!("resolution must be positive, got {v}"))
            };
        }
        existing_path(s).map(Self::Raster).ok_or_else(|| {
            format!(
                "invalid resolution '{s}': expected first|last|min|max|mean|median, a number or a raster path"
            )
        })
    }
}

impl ExtentPolicy {
    /// Parse a `--t-projwin` argument.
    ///
    /// # Errors
    ///
    /// Returns an error if the argument is neither a keyword, four numbers forming a
    /// non-empty box, nor an existing file.
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        let s = s.trim();
        match s {
            "union" => return Ok(Self::Union),
            "intersection" => return Ok(Self::Intersection),
            "first" => return Ok(Self::First),
            "last" => return Ok(Self::Last),
            _ => {}
        }
        if let Some(p) = existing_path(s) {
            return Ok(Self::Raster(p));
        }

        let values: Vec<f64> = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(str::parse)
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| format!("invalid extent '{s}'"))?;
        match values.as_slice() {
            &[xmin, ymin, xmax, ymax] => {
                let e = Extent::new(xmin, ymin, xmax, ymax);
                if e.is_valid() {
                    Ok(Self::Explicit(e))
                } else {
                    Err(format!("extent '{s}' has no area"))
                }
            }
            _ => Err(format!(
                "invalid extent '{s}': expected union|intersection|first|last, 'xmin ymin xmax ymax' or a raster path"
            )),
        }
    }
}

/// Parameters shared by every tile of the mosaic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MosaicParams {
    /// Square pixel size in output units
    pub resolution: f64,
    pub srs: Srs,
    /// Mosaic extent, aligned to multiples of `resolution`
    pub extent: Extent,
}

/// Pick the output reference system.
///
/// # Errors
///
/// Returns [`MosaicError::NoInputs`] for an empty input list, or a reader error for a
/// definition or raster that cannot be resolved.
pub fn negotiate_srs(
    policy: &SrsPolicy,
    inputs: &[RasterInfo],
    reader: &dyn RasterReader,
) -> Result<Srs> {
    match policy {
        SrsPolicy::First => inputs.first().map(|i| i.srs.clone()).ok_or(MosaicError::NoInputs),
        SrsPolicy::Last => inputs.last().map(|i| i.srs.clone()).ok_or(MosaicError::NoInputs),
        SrsPolicy::Raster(path) => Ok(reader.read_info(path)?.srs),
        SrsPolicy::Definition(def) => reader.resolve_srs(def),
    }
}

/// Pick the output resolution from the input footprints.
///
/// # Errors
///
/// Returns [`MosaicError::NoInputs`] when a statistic is requested over no inputs and
/// [`MosaicError::InvalidResolution`] if the result is not positive.
pub fn negotiate_resolution(
    policy: &ResolutionPolicy,
    footprints: &[Footprint],
    reader: &dyn RasterReader,
    t_srs: &Srs,
) -> Result<f64> {
    // Every x and y pixel size of every input
    let mut all: Vec<f64> = footprints
        .iter()
        .flat_map(|f| [f.resolution.0, f.resolution.1])
        .collect();

    let res = match policy {
        ResolutionPolicy::Value(v) => *v,
        ResolutionPolicy::First => footprints
            .first()
            .map(Footprint::square_resolution)
            .ok_or(MosaicError::NoInputs)?,
        ResolutionPolicy::Last => footprints
            .last()
            .map(Footprint::square_resolution)
            .ok_or(MosaicError::NoInputs)?,
        ResolutionPolicy::Raster(path) => {
            let info = reader.read_info(path)?;
            Footprint::new(&info, reader, t_srs)?.square_resolution()
        }
        _ if all.is_empty() => return Err(MosaicError::NoInputs),
        ResolutionPolicy::Min => all.iter().copied().fold(f64::INFINITY, f64::min),
        ResolutionPolicy::Max => all.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        ResolutionPolicy::Mean => all.iter().sum::<f64>() / all.len() as f64,
        ResolutionPolicy::Median => {
            all.sort_by(f64::total_cmp);
            let mid = all.len() / 2;
            if all.len() % 2 == 0 {
                (all[mid - 1] + all[mid]) / 2.0
            } else {
                all[mid]
            }
        }
    };

    if res.is_finite() && res > 0.0 {
        Ok(res)
    } else {
        Err(MosaicError::InvalidResolution(res))
    }
}

/// Pick the raw (unsnapped) output extent from the input footprints.
///
/// # Errors
///
/// Returns [`MosaicError::EmptyExtent`] when the inputs do not overlap under the
/// intersection policy, or [`MosaicError::NoInputs`] for an empty input list.
pub fn negotiate_extent(
    policy: &ExtentPolicy,
    footprints: &[Footprint],
    reader: &dyn RasterReader,
    t_srs: &Srs,
) -> Result<Extent> {
    let mut bounds = footprints.iter().map(|f| f.bounds);
    let extent = match policy {
        ExtentPolicy::Explicit(e) => *e,
        ExtentPolicy::Raster(path) => {
            let info = reader.read_info(path)?;
            Footprint::new(&info, reader, t_srs)?.bounds
        }
        ExtentPolicy::First => bounds.next().ok_or(MosaicError::NoInputs)?,
        ExtentPolicy::Last => bounds.last().ok_or(MosaicError::NoInputs)?,
        ExtentPolicy::Union => bounds
            .reduce(|a, b| a.union(&b))
            .ok_or(MosaicError::NoInputs)?,
        ExtentPolicy::Intersection => {
            let first = bounds.next().ok_or(MosaicError::NoInputs)?;
            bounds.try_fold(first, |acc, b| {
                acc.intersection(&b).ok_or(MosaicError::EmptyExtent {
                    xmin: acc.xmin.max(b.xmin),
                    ymin: acc.ymin.max(b.ymin),
                    xmax: acc.xmax.min(b.xmax),
                    ymax: acc.ymax.min(b.ymax),
                })
            })?
        }
    };
    extent.ensure_valid()
}

/// Everything needed to start tiling: the mosaic parameters and the input footprints
/// already expressed in the output reference system.
#[derive(Debug)]
pub struct Negotiated {
    pub params: MosaicParams,
    pub footprints: Vec<Footprint>,
}

/// Reduce the inputs to one set of mosaic parameters.
///
/// # Errors
///
/// Propagates reader, policy and geometry errors from the individual steps.
pub fn negotiate(
    inputs: &[RasterInfo],
    reader: &dyn RasterReader,
    srs_policy: &SrsPolicy,
    res_policy: &ResolutionPolicy,
    extent_policy: &ExtentPolicy,
) -> Result<Negotiated> {
    if inputs.is_empty() {
        return Err(MosaicError::NoInputs);
    }

    info!("Parsing t_srs");
    let srs = negotiate_srs(srs_policy, inputs, reader)?;
    info!("{}", srs);

    info!("Computing extent geom for all input datasets");
    let mut footprints = Vec::with_capacity(inputs.len());
    for (n, input) in inputs.iter().enumerate() {
        if n % 100 == 0 {
            info!("{} of {} done", n, inputs.len());
        }
        footprints.push(Footprint::new(input, reader, &srs)?);
    }

    info!("Parsing tr");
    let resolution = negotiate_resolution(res_policy, &footprints, reader, &srs)?;
    info!("{}", resolution);

    info!("Determining t_projwin (bounding box for inputs)");
    let raw = negotiate_extent(extent_policy, &footprints, reader, &srs)?;
    let extent = raw.snap_outward(resolution)?.ensure_valid()?;
    info!("{} (snapped to {})", raw, extent);

    Ok(Negotiated {
        params: MosaicParams {
            resolution,
            srs,
            extent,
        },
        footprints,
    })
}
