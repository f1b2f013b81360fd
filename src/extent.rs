//! Axis-aligned extents in output map units
//!
//! Extents follow the `[xmin, ymin, xmax, ymax]` convention used by `dem_mosaic
//! --t_projwin` and are persisted in that form.

use crate::errors::{MosaicError, Result};
use geo::{coord, Polygon, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fraction of a pixel tolerated when snapping, so edges already on the pixel grid stay put.
pub(crate) const SNAP_TOLERANCE: f64 = 1e-6;

/// A bounding box `[xmin, ymin, xmax, ymax]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Extent {
    #[must_use]
    pub const fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Bounding box of a set of points, `None` for an empty set
    pub fn from_points(points: &[(f64, f64)]) -> Option<Self> {
        let (&(x0, y0), rest) = points.split_first()?;
        let init = Self::new(x0, y0, x0, y0);
        Some(rest.iter().fold(init, |e, &(x, y)| {
            Self::new(e.xmin.min(x), e.ymin.min(y), e.xmax.max(x), e.ymax.max(y))
        }))
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// True when the extent has positive, finite area
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.xmin, self.ymin, self.xmax, self.ymax]
            .iter()
            .all(|v| v.is_finite())
            && self.width() > 0.0
            && self.height() > 0.0
    }

    /// Smallest extent covering both
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::new(
            self.xmin.min(other.xmin),
            self.ymin.min(other.ymin),
            self.xmax.max(other.xmax),
            self.ymax.max(other.ymax),
        )
    }

    /// Overlap of both, `None` when they do not overlap with positive area
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let e = Self::new(
            self.xmin.max(other.xmin),
            self.ymin.max(other.ymin),
            self.xmax.min(other.xmax),
            self.ymax.min(other.ymax),
        );
        e.is_valid().then_some(e)
    }

    /// Grow the extent outward so every edge is a whole multiple of `res`.
    ///
    /// An edge within [`SNAP_TOLERANCE`] pixels of a multiple snaps to that multiple
    /// even if it lies just outside, so the result contains `self` up to
    /// `SNAP_TOLERANCE * res` on each side.
    ///
    /// # Errors
    ///
    /// Returns an error if `res` is not a positive finite number.
    pub fn snap_outward(&self, res: f64) -> Result<Self> {
        if !(res.is_finite() && res > 0.0) {
            return Err(MosaicError::InvalidResolution(res));
        }
        let down = |v: f64| (v / res + SNAP_TOLERANCE).floor() * res;
        let up = |v: f64| (v / res - SNAP_TOLERANCE).ceil() * res;
        Ok(Self::new(
            down(self.xmin),
            down(self.ymin),
            up(self.xmax),
            up(self.ymax),
        ))
    }

    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
        )
    }

    #[must_use]
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.xmin, y: self.ymin },
            coord! { x: self.xmax, y: self.ymax },
        )
    }

    #[must_use]
    pub fn to_polygon(&self) -> Polygon<f64> {
        self.to_rect().to_polygon()
    }

    /// Values in `--t_projwin` order
    #[must_use]
    pub fn to_array(&self) -> [f64; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }

    /// Require positive area, reporting the offending extent otherwise
    pub(crate) fn ensure_valid(self) -> Result<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(MosaicError::EmptyExtent {
                xmin: self.xmin,
                ymin: self.ymin,
                xmax: self.xmax,
                ymax: self.ymax,
            })
        }
    }
}

impl From<[f64; 4]> for Extent {
    fn from(a: [f64; 4]) -> Self {
        Self::new(a[0], a[1], a[2], a[3])
    }
}

impl From<Extent> for [f64; 4] {
    fn from(e: Extent) -> Self {
        e.to_array()
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.xmin, self.ymin, self.xmax, self.ymax)
    }
}
