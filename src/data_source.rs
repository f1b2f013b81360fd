//! Raster metadata access
//!
//! The tiler never reads pixel data itself; it only needs to know where each input
//! raster sits. This module provides the [`RasterReader`] abstraction over the raster
//! library, the pure-Rust [`GeoTiffReader`] used by default, and [`Footprint`], the
//! polygon of an input raster expressed in the output coordinate system.

use crate::errors::{MosaicError, Result};
use crate::extent::Extent;
use crate::srs::Srs;
use geo::{LineString, Polygon};
use log::{debug, info, warn};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tiff::decoder::Decoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_POINT: u16 = 2;
/// GeoKey value meaning "user defined", i.e. no EPSG code available
const USER_DEFINED: u16 = 32767;

/// Spatial metadata of one input raster
#[derive(Debug, Clone)]
pub struct RasterInfo {
    pub path: PathBuf,
    pub width: usize,
    pub height: usize,
    /// Affine geotransform in GDAL coefficient order
    pub geotransform: [f64; 6],
    pub srs: Srs,
}

impl RasterInfo {
    /// Map coordinates of a pixel corner
    #[must_use]
    pub fn pixel_to_map(&self, col: f64, row: f64) -> (f64, f64) {
        let gt = &self.geotransform;
        (
            gt[0] + col * gt[1] + row * gt[2],
            gt[3] + col * gt[4] + row * gt[5],
        )
    }

    /// The four outer corners, clockwise from the upper left
    #[must_use]
    pub fn corners(&self) -> [(f64, f64); 4] {
        let (w, h) = (self.width as f64, self.height as f64);
        [
            self.pixel_to_map(0.0, 0.0),
            self.pixel_to_map(w, 0.0),
            self.pixel_to_map(w, h),
            self.pixel_to_map(0.0, h),
        ]
    }
}

/// Access to raster metadata and coordinate transformation.
///
/// This is the seam between the tiling algorithm and the raster library.
pub trait RasterReader {
    /// Read size, geotransform and spatial reference of a raster
    fn read_info(&self, path: &Path) -> Result<RasterInfo>;

    /// Turn a user supplied definition (EPSG code, PROJ string, WKT) into an [`Srs`]
    fn resolve_srs(&self, definition: &str) -> Result<Srs>;

    /// Transform points in place from one reference system into another
    fn transform_points(&self, points: &mut [(f64, f64)], from: &Srs, to: &Srs) -> Result<()>;
}

/// Transformation available to backends without a projection engine.
///
/// # Errors
///
/// Returns [`MosaicError::ReprojectionUnavailable`] unless both references are equal.
pub fn identity_transform(from: &Srs, to: &Srs) -> Result<()> {
    if from == to {
        Ok(())
    } else {
        Err(MosaicError::ReprojectionUnavailable {
            from: from.definition.clone(),
            to: to.definition.clone(),
        })
    }
}

/// Pure-Rust reader for GeoTIFF files.
///
/// Only the first IFD's tags are read; pixel data is never decoded. Reference systems
/// are identified by their EPSG code from the GeoKey directory, so reprojection is not
/// available with this reader.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoTiffReader;

impl GeoTiffReader {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn invalid(path: &Path, reason: impl Into<String>) -> MosaicError {
        MosaicError::InvalidGeoTiff {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    fn read_geotransform(
        decoder: &mut Decoder<BufReader<File>>,
        path: &Path,
    ) -> Result<[f64; 6]> {
        if let Ok(m) = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TRANSFORMATION)) {
            if m.len() >= 16 {
                return Ok([m[3], m[0], m[1], m[7], m[4], m[5]]);
            }
        }

        let tiepoint = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT));
        let scale = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE));
        match (tiepoint, scale) {
            (Ok(tp), Ok(sc)) if tp.len() >= 6 && sc.len() >= 2 => {
                // Tiepoint is [i, j, k, x, y, z]: raster (i, j) sits at map (x, y)
                let (i, j, x, y) = (tp[0], tp[1], tp[3], tp[4]);
                let (sx, sy) = (sc[0], sc[1]);
                Ok([x - i * sx, sx, 0.0, y + j * sy, 0.0, -sy])
            }
            _ => Err(Self::invalid(
                path,
                "missing ModelTransformation or ModelTiepoint/ModelPixelScale tags",
            )),
        }
    }

    fn pixel_is_point(decoder: &mut Decoder<BufReader<File>>) -> bool {
        decoder
            .get_tag_u16_vec(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY))
            .ok()
            .and_then(|keys| geo_key_value(&keys, GT_RASTER_TYPE_KEY))
            == Some(RASTER_PIXEL_IS_POINT)
    }

    fn read_srs(decoder: &mut Decoder<BufReader<File>>, path: &Path) -> Result<Srs> {
        let keys = decoder
            .get_tag_u16_vec(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY))
            .map_err(|_| Self::invalid(path, "missing GeoKeyDirectory tag"))?;
        let lookup = |id: u16| geo_key_value(&keys, id);

        let model_type = lookup(GT_MODEL_TYPE_KEY);
        let code = match model_type {
            Some(MODEL_TYPE_GEOGRAPHIC) => lookup(GEOGRAPHIC_TYPE_KEY),
            Some(MODEL_TYPE_PROJECTED) => lookup(PROJECTED_CS_TYPE_KEY),
            _ => lookup(PROJECTED_CS_TYPE_KEY).or_else(|| lookup(GEOGRAPHIC_TYPE_KEY)),
        }
        .filter(|&c| c != USER_DEFINED && c != 0)
        .ok_or_else(|| Self::invalid(path, "no EPSG code in GeoKeyDirectory"))?;

        let geographic = model_type.map(|t| t == MODEL_TYPE_GEOGRAPHIC);
        Ok(Srs::from_epsg(u32::from(code), geographic))
    }
}

/// Inline value of a GeoKey; keys stored in other tags are not needed here.
fn geo_key_value(directory: &[u16], key_id: u16) -> Option<u16> {
    let count = usize::from(*directory.get(3)?);
    directory
        .get(4..)?
        .chunks_exact(4)
        .take(count)
        .find(|entry| entry[0] == key_id && entry[1] == 0)
        .map(|entry| entry[3])
}

impl RasterReader for GeoTiffReader {
    fn read_info(&self, path: &Path) -> Result<RasterInfo> {
        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?;
        let (width, height) = decoder.dimensions()?;
        if width == 0 || height == 0 {
            return Err(Self::invalid(path, format!("invalid size {width}x{height}")));
        }

        let mut geotransform = Self::read_geotransform(&mut decoder, path)?;
        if Self::pixel_is_point(&mut decoder) {
            // Tie points name pixel centers; move the origin to the outer corner
            let gt = &mut geotransform;
            gt[0] -= 0.5 * (gt[1] + gt[2]);
            gt[3] -= 0.5 * (gt[4] + gt[5]);
        }
        let srs = Self::read_srs(&mut decoder, path)?;
        debug!(
            "{}: {}x{} px, origin ({}, {}), pixel ({}, {}), {}",
            path.display(),
            width,
            height,
            geotransform[0],
            geotransform[3],
            geotransform[1],
            geotransform[5],
            srs
        );

        Ok(RasterInfo {
            path: path.to_path_buf(),
            width: width as usize,
            height: height as usize,
            geotransform,
            srs,
        })
    }

    fn resolve_srs(&self, definition: &str) -> Result<Srs> {
        Srs::parse_epsg(definition)
    }

    fn transform_points(&self, _points: &mut [(f64, f64)], from: &Srs, to: &Srs) -> Result<()> {
        identity_transform(from, to)
    }
}

/// An input raster's outline in the output coordinate system
#[derive(Debug, Clone)]
pub struct Footprint {
    pub path: PathBuf,
    pub polygon: Polygon<f64>,
    pub bounds: Extent,
    /// Pixel size (x, y) in output units
    pub resolution: (f64, f64),
}

impl Footprint {
    /// Project the raster's corners into `t_srs` and close them into a polygon.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader cannot transform into `t_srs`.
    pub fn new(info: &RasterInfo, reader: &dyn RasterReader, t_srs: &Srs) -> Result<Self> {
        let mut corners = info.corners();
        reader.transform_points(&mut corners, &info.srs, t_srs)?;

        let bounds = Extent::from_points(&corners)
            .ok_or_else(|| MosaicError::InvalidGeoTiff {
                path: info.path.clone(),
                reason: "no corners".to_string(),
            })?;
        let resolution = (
            bounds.width() / info.width as f64,
            bounds.height() / info.height as f64,
        );

        let mut ring = corners.to_vec();
        ring.push(corners[0]);
        Ok(Self {
            path: info.path.clone(),
            polygon: Polygon::new(LineString::from(ring), Vec::new()),
            bounds,
            resolution,
        })
    }

    /// Mean of the x and y pixel size
    #[must_use]
    pub fn square_resolution(&self) -> f64 {
        (self.resolution.0 + self.resolution.1) / 2.0
    }
}

/// Read metadata of every input, skipping (and reporting) unreadable ones.
///
/// Duplicate paths are dropped, keeping the first occurrence.
///
/// # Errors
///
/// Returns [`MosaicError::NoInputs`] when nothing could be read.
pub fn read_inputs(reader: &dyn RasterReader, paths: &[PathBuf]) -> Result<Vec<RasterInfo>> {
    info!("Loading {} input datasets", paths.len());
    let mut seen = std::collections::HashSet::new();
    let mut infos = Vec::with_capacity(paths.len());
    let mut skipped = 0usize;

    for (n, path) in paths.iter().enumerate() {
        if n % 100 == 0 {
            info!("{} of {} done", n, paths.len());
        }
        if !seen.insert(path.clone()) {
            warn!("Duplicate input ignored: {}", path.display());
            continue;
        }
        match reader.read_info(path) {
            Ok(ri) => infos.push(ri),
            Err(e) => {
                warn!("Skipping unreadable input {}: {}", path.display(), e);
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!("{} inputs could not be read", skipped);
    }
    if infos.is_empty() {
        return Err(MosaicError::NoInputs);
    }
    Ok(infos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_key_value_inline_only() {
        // header, then ProjectedCSType inline, then a key stored in another tag
        let dir = [1, 1, 0, 2, 3072, 0, 1, 32610, 2049, 34737, 7, 0];
        assert_eq!(geo_key_value(&dir, 3072), Some(32610));
        assert_eq!(geo_key_value(&dir, 2049), None);
        assert_eq!(geo_key_value(&dir, 1024), None);
    }

    #[test]
    fn test_corners_follow_geotransform() {
        let info = RasterInfo {
            path: PathBuf::from("a.tif"),
            width: 4,
            height: 2,
            geotransform: [100.0, 10.0, 0.0, 500.0, 0.0, -10.0],
            srs: Srs::from_epsg(32610, None),
        };
        assert_eq!(
            info.corners(),
            [(100.0, 500.0), (140.0, 500.0), (140.0, 480.0), (100.0, 480.0)]
        );
    }
}
