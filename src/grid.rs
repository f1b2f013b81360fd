use crate::errors::{MosaicError, Result};
use crate::extent::{Extent, SNAP_TOLERANCE};
use crate::negotiation::MosaicParams;
use log::{debug, info, warn};

/// One candidate output tile
#[derive(Debug, Clone, PartialEq)]
pub struct GridTile {
    /// `row * ntiles_w + col`, rows counted from the top of the mosaic
    pub number: u32,
    pub col: u32,
    pub row: u32,
    pub extent: Extent,
    pub name: String,
}

/// Regular grid of square tiles anchored at the upper-left corner of the mosaic.
///
/// The last column and row may reach past the mosaic extent.
#[derive(Debug, Clone)]
pub struct TileGrid {
    origin_x: f64,
    origin_y: f64,
    tile_size: f64,
    geographic: bool,
    pub ntiles_w: u32,
    pub ntiles_h: u32,
    pub total_tiles: u32,
}

impl TileGrid {
    /// Lay out a grid over `params.extent`.
    ///
    /// `tile_size` is rounded to a whole number of pixels (at least one) so tile
    /// edges stay on pixel edges.
    ///
    /// # Errors
    ///
    /// Returns [`MosaicError::InvalidTileSize`] for a non-positive size,
    /// [`MosaicError::EmptyExtent`] for an extent without area and
    /// [`MosaicError::GridTooLarge`] when the tiles cannot be numbered in a `u32`.
    pub fn new(params: &MosaicParams, tile_size: f64) -> Result<Self> {
        if !(tile_size.is_finite() && tile_size > 0.0) {
            return Err(MosaicError::InvalidTileSize(tile_size));
        }
        let extent = params.extent.ensure_valid()?;
        let res = params.resolution;

        let aligned = aligned_tile_size(tile_size, res);
        if (aligned - tile_size).abs() > res * SNAP_TOLERANCE {
            warn!(
                "Tile size {} is not a multiple of resolution {}, using {} ({} px)",
                tile_size,
                res,
                aligned,
                (aligned / res).round()
            );
        }

        // f64 -> u64 saturates, so huge spans end up in the error below
        let count = |span: f64| (span / aligned - SNAP_TOLERANCE).ceil().max(1.0) as u64;
        let (cols, rows) = (count(extent.width()), count(extent.height()));
        let too_large = MosaicError::GridTooLarge { cols, rows };
        let total_tiles = cols
            .checked_mul(rows)
            .and_then(|t| u32::try_from(t).ok())
            .ok_or(too_large)?;
        // Both factors are at most the product
        let ntiles_w = cols as u32;
        let ntiles_h = rows as u32;

        info!(
            "{} ({} cols x {} rows) tiles required for full mosaic",
            total_tiles, ntiles_w, ntiles_h
        );

        Ok(Self {
            origin_x: extent.xmin,
            origin_y: extent.ymax,
            tile_size: aligned,
            geographic: params.srs.geographic,
            ntiles_w,
            ntiles_h,
            total_tiles,
        })
    }

    /// Tile edge length actually used, in output units
    #[must_use]
    pub fn tile_size(&self) -> f64 {
        self.tile_size
    }

    pub fn iter(&self) -> TileIterator<'_> {
        TileIterator::new(self)
    }

    /// Tile with the given number, `None` outside the grid
    #[must_use]
    pub fn get_tile(&self, number: u32) -> Option<GridTile> {
        if number >= self.total_tiles {
            return None;
        }
        let row = number / self.ntiles_w;
        let col = number % self.ntiles_w;

        let xmin = self.origin_x + f64::from(col) * self.tile_size;
        let xmax = self.origin_x + f64::from(col + 1) * self.tile_size;
        let ymax = self.origin_y - f64::from(row) * self.tile_size;
        let ymin = self.origin_y - f64::from(row + 1) * self.tile_size;
        let extent = Extent::new(xmin, ymin, xmax, ymax);
        let name = tile_name(&extent, self.geographic);

        debug!("Tile {} ({}, {}): [{}] {}", number, col, row, extent, name);

        Some(GridTile {
            number,
            col,
            row,
            extent,
            name,
        })
    }
}

/// `tile_size` rounded to a whole number of `res` pixels, at least one
#[must_use]
pub fn aligned_tile_size(tile_size: f64, res: f64) -> f64 {
    (tile_size / res).round().max(1.0) * res
}

/// Name a tile after its center, rounded to whole units.
///
/// Geographic grids use `{lat}N{lon:03}E`, projected ones `{y}_{x}`.
#[must_use]
pub fn tile_name(extent: &Extent, geographic: bool) -> String {
    let (cx, cy) = extent.center();
    if geographic {
        format!("{cy:.0}N{cx:03.0}E")
    } else {
        format!("{cy:.0}_{cx:.0}")
    }
}

pub struct TileIterator<'a> {
    grid: &'a TileGrid,
    current: u32,
}

impl<'a> TileIterator<'a> {
    fn new(grid: &'a TileGrid) -> Self {
        Self { grid, current: 0 }
    }
}

impl<'a> Iterator for TileIterator<'a> {
    type Item = GridTile;

    fn next(&mut self) -> Option<Self::Item> {
        let tile = self.grid.get_tile(self.current)?;
        self.current += 1;
        Some(tile)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.grid.total_tiles.saturating_sub(self.current) as usize;
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::srs::Srs;

    fn params(extent: Extent, res: f64, geographic: bool) -> MosaicParams {
        MosaicParams {
            resolution: res,
            srs: Srs::new(if geographic { "EPSG:4326" } else { "EPSG:32610" }, geographic),
            extent,
        }
    }

    #[test]
    fn test_tile_grid_counts() {
        let grid = TileGrid::new(&params(Extent::new(0.0, 0.0, 250.0, 100.0), 1.0, false), 100.0)
            .unwrap();
        assert_eq!(grid.ntiles_w, 3);
        assert_eq!(grid.ntiles_h, 1);
        assert_eq!(grid.total_tiles, 3);
    }

    #[test]
    fn test_exact_fit_adds_no_extra_column() {
        let grid = TileGrid::new(&params(Extent::new(0.0, 0.0, 300.0, 200.0), 10.0, false), 100.0)
            .unwrap();
        assert_eq!((grid.ntiles_w, grid.ntiles_h), (3, 2));
    }

    #[test]
    fn test_numbering_is_row_major_from_top() {
        let grid = TileGrid::new(&params(Extent::new(0.0, 0.0, 200.0, 200.0), 1.0, false), 100.0)
            .unwrap();
        let t1 = grid.get_tile(1).unwrap();
        assert_eq!((t1.col, t1.row), (1, 0));
        assert_eq!(t1.extent, Extent::new(100.0, 100.0, 200.0, 200.0));
        let t2 = grid.get_tile(2).unwrap();
        assert_eq!((t2.col, t2.row), (0, 1));
        assert_eq!(t2.extent, Extent::new(0.0, 0.0, 100.0, 100.0));
        assert!(grid.get_tile(4).is_none());
    }

    #[test]
    fn test_tile_size_rounded_to_pixels() {
        let grid = TileGrid::new(&params(Extent::new(0.0, 0.0, 90.0, 90.0), 30.0, false), 100.0)
            .unwrap();
        assert_eq!(grid.tile_size(), 90.0);
        assert_eq!(grid.total_tiles, 1);
    }

    #[test]
    fn test_tile_names() {
        assert_eq!(tile_name(&Extent::new(0.0, 0.0, 100.0, 200.0), false), "100_50");
        assert_eq!(tile_name(&Extent::new(5.0, 44.0, 7.0, 46.0), true), "45N006E");
    }

    #[test]
    fn test_iterator_yields_every_tile() {
        let grid = TileGrid::new(&params(Extent::new(0.0, 0.0, 300.0, 300.0), 1.0, false), 100.0)
            .unwrap();
        let numbers: Vec<u32> = grid.iter().map(|t| t.number).collect();
        assert_eq!(numbers, (0..9).collect::<Vec<_>>());
    }

    #[test]
    fn test_oversized_grid_is_an_error() {
        let p = params(Extent::new(0.0, 0.0, 100_000.0, 100_000.0), 1.0, false);
        match TileGrid::new(&p, 1.0) {
            Err(MosaicError::GridTooLarge { cols, rows }) => {
                assert_eq!((cols, rows), (100_000, 100_000));
            }
            other => panic!("expected GridTooLarge, got {other:?}"),
        }
        // 65536 x 65536 is one past u32::MAX
        let p = params(Extent::new(0.0, 0.0, 65_536.0, 65_536.0), 1.0, false);
        assert!(TileGrid::new(&p, 1.0).is_err());
        let p = params(Extent::new(0.0, 0.0, 65_536.0, 65_535.0), 1.0, false);
        assert_eq!(TileGrid::new(&p, 1.0).unwrap().total_tiles, 65_536 * 65_535);
    }

    #[test]
    fn test_aligned_tile_size() {
        assert_eq!(aligned_tile_size(1000.0, 30.0), 990.0);
        assert_eq!(aligned_tile_size(1000.0, 10.0), 1000.0);
        assert_eq!(aligned_tile_size(1.0, 30.0), 30.0);
    }

    #[test]
    fn test_rejects_bad_tile_size() {
        let p = params(Extent::new(0.0, 0.0, 1.0, 1.0), 1.0, false);
        assert!(TileGrid::new(&p, 0.0).is_err());
        assert!(TileGrid::new(&p, -5.0).is_err());
    }
}
