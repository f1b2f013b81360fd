//! GDAL-backed raster metadata and coordinate transformation
//!
//! Enabled with the `gdal` cargo feature. Unlike [`crate::data_source::GeoTiffReader`]
//! this reader accepts every raster format GDAL knows and can reproject footprints,
//! so inputs in different coordinate systems can be mixed.

use crate::data_source::{RasterInfo, RasterReader};
use crate::errors::{MosaicError, Result};
use crate::srs::Srs;
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use gdal::Dataset;
use log::debug;
use std::path::Path;

/// Raster reader using the GDAL library
#[derive(Debug, Default, Clone, Copy)]
pub struct GdalReader;

impl GdalReader {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    // x/y always means easting/northing (or lon/lat) regardless of the authority axis order
    fn spatial_ref(srs: &Srs) -> Result<SpatialRef> {
        let mut sr = SpatialRef::from_definition(&srs.definition)?;
        sr.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
        Ok(sr)
    }

    fn to_srs(sr: &SpatialRef) -> Result<Srs> {
        Ok(Srs::new(sr.to_proj4()?, sr.is_geographic()))
    }
}

impl RasterReader for GdalReader {
    fn read_info(&self, path: &Path) -> Result<RasterInfo> {
        let dataset = Dataset::open(path)?;
        let (width, height) = dataset.raster_size();
        if width == 0 || height == 0 {
            return Err(MosaicError::InvalidGeoTiff {
                path: path.to_path_buf(),
                reason: format!("invalid size {width}x{height}"),
            });
        }

        let geotransform = dataset.geo_transform()?;
        let srs = Self::to_srs(&dataset.spatial_ref()?)?;
        debug!("{}: {}x{} px, {}", path.display(), width, height, srs);

        Ok(RasterInfo {
            path: path.to_path_buf(),
            width,
            height,
            geotransform,
            srs,
        })
    }

    fn resolve_srs(&self, definition: &str) -> Result<Srs> {
        let sr = SpatialRef::from_definition(definition)
            .map_err(|_| MosaicError::UnsupportedSrs(definition.to_string()))?;
        Self::to_srs(&sr)
    }

    fn transform_points(&self, points: &mut [(f64, f64)], from: &Srs, to: &Srs) -> Result<()> {
        if from == to {
            return Ok(());
        }
        let transform = CoordTransform::new(&Self::spatial_ref(from)?, &Self::spatial_ref(to)?)?;

        let mut xs: Vec<f64> = points.iter().map(|p| p.0).collect();
        let mut ys: Vec<f64> = points.iter().map(|p| p.1).collect();
        let mut zs = vec![0.0; points.len()];
        transform.transform_coords(&mut xs, &mut ys, &mut zs)?;

        for (p, (x, y)) in points.iter_mut().zip(xs.into_iter().zip(ys)) {
            *p = (x, y);
        }
        Ok(())
    }
}
