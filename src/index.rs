//! Tile index: which inputs intersect which tile
//!
//! Building the index is the expensive part of a run: every tile polygon is tested
//! against every input footprint. The result is persisted next to the outputs so a
//! re-run with the same prefix can skip straight to dispatch.
//!
//! # Invariants
//!
//! - A [`TileRecord`] only exists if at least one input intersects the tile.
//! - Inputs within a record keep the order in which they were given.
//! - Records are keyed by tile number and never modified after the index is built.

use crate::data_source::Footprint;
use crate::errors::{MosaicError, Result};
use crate::extent::Extent;
use crate::grid::{GridTile, TileGrid};
use crate::negotiation::MosaicParams;
use chrono::{DateTime, Utc};
use geo::{BoundingRect, Intersects};
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Version of the on-disk index layout
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// A tile with at least one intersecting input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    pub tile: u32,
    pub extent: Extent,
    pub name: String,
    pub inputs: Vec<PathBuf>,
}

/// Mapping from tile number to tile record, together with the parameters it was
/// computed for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileIndex {
    pub version: u32,
    pub created: DateTime<Utc>,
    pub params: MosaicParams,
    pub tile_size: f64,
    pub tiles: BTreeMap<u32, TileRecord>,
}

impl TileIndex {
    /// Number of valid tiles
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Records in tile-number order
    pub fn records(&self) -> impl Iterator<Item = &TileRecord> {
        self.tiles.values()
    }

    /// Write the index as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        info!("Writing out tile index: {}", path.display());
        let tmp = path.with_extension("json.tmp");
        {
            let writer = BufWriter::new(fs::File::create(&tmp)?);
            serde_json::to_writer_pretty(writer, self)?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Read and validate a persisted index.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or
    /// [`MosaicError::CorruptIndex`] if it breaks the index invariants.
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading existing tile index: {}", path.display());
        let reader = BufReader::new(fs::File::open(path)?);
        let index: Self = serde_json::from_reader(reader)?;
        index.validate(path)?;
        Ok(index)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let corrupt = |reason: String| MosaicError::CorruptIndex {
            path: path.to_path_buf(),
            reason,
        };
        if self.version != INDEX_FORMAT_VERSION {
            return Err(corrupt(format!("unsupported version {}", self.version)));
        }
        if self.tiles.is_empty() {
            return Err(corrupt("no tiles".to_string()));
        }
        for (&number, record) in &self.tiles {
            if record.tile != number {
                return Err(corrupt(format!(
                    "key {} holds record for tile {}",
                    number, record.tile
                )));
            }
            if record.inputs.is_empty() {
                return Err(corrupt(format!("tile {number} has no inputs")));
            }
        }
        Ok(())
    }

    /// Load the index at `path` if it exists, otherwise build it with `build` and
    /// persist the result.
    ///
    /// # Errors
    ///
    /// Propagates load, build and save errors.
    pub fn load_or_build<F>(path: &Path, build: F) -> Result<(Self, bool)>
    where
        F: FnOnce() -> Result<Self>,
    {
        if path.exists() {
            return Ok((Self::load(path)?, true));
        }
        let index = build()?;
        index.save(path)?;
        Ok((index, false))
    }
}

/// Inputs whose footprint intersects the tile, in input order.
///
/// Boundaries that merely touch count as intersecting.
#[must_use]
pub fn intersecting_inputs(tile: &GridTile, footprints: &[Footprint]) -> Vec<PathBuf> {
    let tile_poly = tile.extent.to_polygon();
    let tile_rect = tile.extent.to_rect();
    footprints
        .iter()
        .filter(|fp| {
            fp.polygon
                .bounding_rect()
                .is_some_and(|r| r.intersects(&tile_rect))
                && tile_poly.intersects(&fp.polygon)
        })
        .map(|fp| fp.path.clone())
        .collect()
}

/// Test every tile of `grid` against every footprint and keep the tiles with coverage.
///
/// # Errors
///
/// Returns [`MosaicError::NoCoverage`] when no tile intersects any input.
pub fn build_tile_index(
    grid: &TileGrid,
    footprints: &[Footprint],
    params: &MosaicParams,
) -> Result<TileIndex> {
    info!("Computing valid intersections between input dataset geom and tile geom");
    let tiles: Vec<GridTile> = grid.iter().collect();

    let tiles: BTreeMap<u32, TileRecord> = tiles
        .into_par_iter()
        .filter_map(|tile| {
            let inputs = intersecting_inputs(&tile, footprints);
            debug!("Tile {}: {} inputs", tile.number, inputs.len());
            (!inputs.is_empty()).then(|| {
                (
                    tile.number,
                    TileRecord {
                        tile: tile.number,
                        extent: tile.extent,
                        name: tile.name,
                        inputs,
                    },
                )
            })
        })
        .collect();

    info!("{} valid output tiles", tiles.len());
    if tiles.is_empty() {
        return Err(MosaicError::NoCoverage);
    }
    debug!(
        "{}",
        tiles
            .keys()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    );

    Ok(TileIndex {
        version: INDEX_FORMAT_VERSION,
        created: Utc::now(),
        params: params.clone(),
        tile_size: grid.tile_size(),
        tiles,
    })
}

/// Print one line per valid tile: number, name, input count and extent.
pub fn print_index(index: &TileIndex) {
    let p = &index.params;
    println!("\n===== Tile index =====");
    println!("- srs: {}", p.srs);
    println!("- tr: {}", p.resolution);
    println!("- t_projwin: {}", p.extent);
    println!("- tile size: {}", index.tile_size);
    println!("- created: {}", index.created.to_rfc3339());
    println!("\n===== Valid tiles ({}) =====", index.len());
    for r in index.records() {
        println!("{:>6}  {:<20} {:>5} inputs  [{}]", r.tile, r.name, r.inputs.len(), r.extent);
    }
}
