//! Centralized error handling for mosaic_tiler
//!
//! All fallible operations in the crate return [`Result`]. Failures of the external
//! mosaicking tool are deliberately *not* represented here: they only show up later as
//! missing tile outputs.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for mosaic_tiler operations
#[derive(Debug, Error)]
pub enum MosaicError {
    /// I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// TIFF decoding errors from the pure-Rust GeoTIFF reader
    #[error("TIFF decode error: {0}")]
    TiffError(#[from] tiff::TiffError),

    /// GDAL errors from the optional GDAL backend
    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    GdalError(#[from] gdal::errors::GdalError),

    /// Tile index (de)serialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A raster lacks the tags needed to place it in space
    #[error("Invalid GeoTIFF '{}': {reason}", path.display())]
    InvalidGeoTiff { path: PathBuf, reason: String },

    /// A spatial reference definition could not be understood
    #[error("Unsupported spatial reference: {0}")]
    UnsupportedSrs(String),

    /// The active raster backend cannot transform between these references
    #[error("Cannot transform from {from} to {to} without the GDAL backend")]
    ReprojectionUnavailable { from: String, to: String },

    /// A --tr/--t-srs/--t-projwin policy string could not be parsed or applied
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// Tile size must be positive and finite
    #[error("Invalid tile size: {0} (must be positive)")]
    InvalidTileSize(f64),

    /// The tile grid has more tiles than can be numbered
    #[error("Tile grid of {cols} x {rows} tiles is too large, increase the tile size")]
    GridTooLarge { cols: u64, rows: u64 },

    /// Resolution must be positive and finite
    #[error("Invalid resolution: {0} (must be positive)")]
    InvalidResolution(f64),

    /// The negotiated mosaic extent has no area
    #[error("Mosaic extent is empty: [{xmin}, {ymin}, {xmax}, {ymax}]")]
    EmptyExtent {
        xmin: f64,
        ymin: f64,
        xmax: f64,
        ymax: f64,
    },

    /// No readable input rasters were given
    #[error("No readable input rasters")]
    NoInputs,

    /// No tile of the grid intersects any input footprint
    #[error("No tile intersects any input raster")]
    NoCoverage,

    /// A persisted tile index violates its invariants
    #[error("Corrupt tile index '{}': {reason}", path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    /// Thread pool configuration error
    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),
}

/// Result type alias for mosaic_tiler operations
pub type Result<T> = std::result::Result<T, MosaicError>;
