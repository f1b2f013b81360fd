//! Shared fixtures: an in-memory raster catalogue standing in for real files

#![allow(dead_code)]

use mosaic_tiler::data_source::{identity_transform, RasterInfo, RasterReader};
use mosaic_tiler::errors::{MosaicError, Result};
use mosaic_tiler::srs::Srs;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

pub const UTM10: &str = "EPSG:32610";

/// Raster reader answering from a fixed table instead of opening files
#[derive(Debug, Default)]
pub struct MemReader {
    infos: HashMap<PathBuf, RasterInfo>,
    /// (from, to) -> offset added to x and y
    shifts: HashMap<(String, String), (f64, f64)>,
}

impl MemReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a north-up raster with square pixels
    pub fn with_raster(
        mut self,
        path: &str,
        srs: &str,
        ulx: f64,
        uly: f64,
        res: f64,
        width: usize,
        height: usize,
    ) -> Self {
        let info = RasterInfo {
            path: PathBuf::from(path),
            width,
            height,
            geotransform: [ulx, res, 0.0, uly, 0.0, -res],
            srs: Srs::parse_epsg(srs).unwrap(),
        };
        self.infos.insert(PathBuf::from(path), info);
        self
    }

    /// Pretend `from` -> `to` is a pure translation
    pub fn with_shift(mut self, from: &str, to: &str, dx: f64, dy: f64) -> Self {
        self.shifts
            .insert((from.to_string(), to.to_string()), (dx, dy));
        self
    }

    pub fn paths(&self, names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }
}

impl RasterReader for MemReader {
    fn read_info(&self, path: &Path) -> Result<RasterInfo> {
        self.infos.get(path).cloned().ok_or_else(|| {
            MosaicError::IoError(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not registered", path.display()),
            ))
        })
    }

    fn resolve_srs(&self, definition: &str) -> Result<Srs> {
        Srs::parse_epsg(definition)
    }

    fn transform_points(&self, points: &mut [(f64, f64)], from: &Srs, to: &Srs) -> Result<()> {
        if let Some(&(dx, dy)) = self
            .shifts
            .get(&(from.definition.clone(), to.definition.clone()))
        {
            for p in points.iter_mut() {
                p.0 += dx;
                p.1 += dy;
            }
            return Ok(());
        }
        identity_transform(from, to)
    }
}

/// Two 500 m square rasters in opposite corners of a 2x2 grid of 1 km tiles.
///
/// ```text
///  y=2000 +-----+-----+
///         | a   |     |
///  y=1000 +-----+-----+
///         |     |  b  |
///  y=0    +-----+-----+
///        x=0  1000  2000
/// ```
pub fn corner_rasters() -> MemReader {
    MemReader::new()
        .with_raster("a.tif", UTM10, 0.0, 2000.0, 10.0, 50, 50)
        .with_raster("b.tif", UTM10, 1200.0, 800.0, 10.0, 50, 50)
}
