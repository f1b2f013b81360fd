//! mosaic_tiler: run `dem_mosaic` for valid tiles only
//!
//! Mosaicking thousands of overlapping DEMs in one `dem_mosaic` call is slow and
//! memory hungry. This crate splits the output mosaic into a regular grid of tiles,
//! finds the inputs that intersect each tile, and runs one `dem_mosaic` per tile and
//! statistic on just those inputs. Tiles without any input are never processed.
//!
//! ## Workflow
//!
//! 1. Read each input's size, geotransform and reference system ([`data_source`]).
//! 2. Negotiate a common reference system, resolution and pixel-aligned extent
//!    ([`negotiation`]).
//! 3. Lay a tile grid over the extent ([`grid`]).
//! 4. Intersect tiles with input footprints and persist the result ([`index`]).
//! 5. Run `dem_mosaic` on a bounded worker pool, or submit to PBS ([`dispatch`]).
//! 6. Build a VRT per statistic and archive the logs ([`postprocess`]).
//!
//! Steps 1-4 are skipped when the tile index of a previous run with the same output
//! prefix exists.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use mosaic_tiler::prelude::*;
//! use std::path::PathBuf;
//!
//! let reader = GeoTiffReader::new();
//! let inputs = read_inputs(&reader, &[PathBuf::from("a.tif"), PathBuf::from("b.tif")]).unwrap();
//! let negotiated = negotiate(
//!     &inputs,
//!     &reader,
//!     &SrsPolicy::First,
//!     &ResolutionPolicy::Min,
//!     &ExtentPolicy::Union,
//! )
//! .unwrap();
//! let grid = TileGrid::new(&negotiated.params, 100_000.0).unwrap();
//! let index = build_tile_index(&grid, &negotiated.footprints, &negotiated.params).unwrap();
//! println!("{} valid tiles", index.len());
//! ```
//!
//! With the `gdal` feature, `GdalReader` reads any GDAL format and reprojects
//! footprints, so inputs in different coordinate systems can be combined.

// Core modules
pub mod cli;
pub mod config;
pub mod data_source;
pub mod dispatch;
pub mod errors;
pub mod extent;
#[cfg(feature = "gdal")]
pub mod gdal_source;
pub mod grid;
pub mod index;
pub mod layout;
pub mod negotiation;
pub mod parallel;
pub mod pipeline;
pub mod postprocess;
pub mod srs;
pub mod statistics;

// Direct re-exports for the public API
pub use data_source::{Footprint, GeoTiffReader, RasterInfo, RasterReader};
pub use errors::{MosaicError, Result};
pub use extent::Extent;
#[cfg(feature = "gdal")]
pub use gdal_source::GdalReader;
pub use grid::TileGrid;
pub use index::{TileIndex, TileRecord};
pub use negotiation::MosaicParams;
pub use srs::Srs;
pub use statistics::Stat;

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::data_source::{read_inputs, Footprint, GeoTiffReader, RasterInfo, RasterReader};
    pub use crate::errors::{MosaicError, Result};
    pub use crate::extent::Extent;
    pub use crate::grid::TileGrid;
    pub use crate::index::{build_tile_index, TileIndex, TileRecord};
    pub use crate::layout::OutputLayout;
    pub use crate::negotiation::{negotiate, ExtentPolicy, MosaicParams, ResolutionPolicy, SrsPolicy};
    pub use crate::parallel::ParallelConfig;
    pub use crate::srs::Srs;
    pub use crate::statistics::Stat;
}
