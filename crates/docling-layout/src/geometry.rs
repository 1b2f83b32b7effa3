//! Bounding box algebra
//!
//! All boxes use a BOTTOMLEFT origin: `t >= b` and `r >= l` for a box with
//! positive area. "Above" therefore means larger y.
//!
//! Every ratio is total: degenerate or inverted boxes have zero area and
//! produce zero overlap instead of a division error.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box `(l, b, r, t)` in BOTTOMLEFT coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left x-coordinate
    pub l: f64,
    /// Bottom y-coordinate
    pub b: f64,
    /// Right x-coordinate
    pub r: f64,
    /// Top y-coordinate
    pub t: f64,
}

impl BoundingBox {
    /// Create a box from its left, bottom, right and top edges
    #[inline]
    #[must_use]
    pub const fn new(l: f64, b: f64, r: f64, t: f64) -> Self {
        Self { l, b, r, t }
    }

    /// Width, clamped to zero for inverted boxes
    #[inline]
    #[must_use]
    pub fn width(&self) -> f64 {
        (self.r - self.l).max(0.0)
    }

    /// Height, clamped to zero for inverted boxes
    #[inline]
    #[must_use]
    pub fn height(&self) -> f64 {
        (self.t - self.b).max(0.0)
    }

    /// Area of the box (never negative)
    #[inline]
    #[must_use = "returns the area of the bounding box"]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Intersection of two boxes
    ///
    /// Returns the empty box `(0, 0, 0, 0)` when the boxes do not share a
    /// region of positive area.
    #[inline]
    #[must_use = "returns the intersection box"]
    pub fn intersect(&self, other: &Self) -> Self {
        let l = self.l.max(other.l);
        let b = self.b.max(other.b);
        let r = self.r.min(other.r);
        let t = self.t.min(other.t);

        if l < r && b < t {
            Self::new(l, b, r, t)
        } else {
            Self::default()
        }
    }

    /// Area of the intersection with another box
    #[inline]
    #[must_use = "returns the intersection area with another bounding box"]
    pub fn intersection_area(&self, other: &Self) -> f64 {
        self.intersect(other).area()
    }

    /// Intersection-over-union (`IoU`), 0 when the union is empty
    #[must_use = "returns the IoU ratio with another bounding box"]
    pub fn intersection_over_union(&self, other: &Self) -> f64 {
        let intersection = self.intersection_area(other);
        if intersection <= 0.0 {
            return 0.0;
        }
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }

    /// Fraction of this box's own area covered by `other`, in `[0, 1]`
    ///
    /// Returns 0 when this box has no area.
    #[must_use = "returns the overlap fraction relative to this box's area"]
    pub fn intersection_over_self(&self, other: &Self) -> f64 {
        let area = self.area();
        if area <= 0.0 {
            return 0.0;
        }
        self.intersection_area(other) / area
    }

    /// Strict 2D overlap (touching edges do not count)
    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.overlaps_horizontally(other) && self.overlaps_vertically(other)
    }

    /// Whether the x-ranges `[l, r]` overlap with positive length
    #[inline]
    #[must_use]
    pub fn overlaps_horizontally(&self, other: &Self) -> bool {
        self.l < other.r && self.r > other.l
    }

    /// Whether the y-ranges `[b, t]` overlap with positive length
    #[inline]
    #[must_use]
    pub fn overlaps_vertically(&self, other: &Self) -> bool {
        self.b < other.t && self.t > other.b
    }

    #[inline]
    #[must_use]
    pub fn is_strictly_left_of(&self, other: &Self) -> bool {
        self.r <= other.l
    }

    /// Whether this box lies entirely above `other` (larger y)
    #[inline]
    #[must_use]
    pub fn is_strictly_above(&self, other: &Self) -> bool {
        self.b >= other.t
    }

    /// Smallest box containing both boxes
    #[inline]
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::new(
            self.l.min(other.l),
            self.b.min(other.b),
            self.r.max(other.r),
            self.t.max(other.t),
        )
    }

    /// Smallest box containing every box of the iterator, `None` if empty
    pub fn enclosing<I>(boxes: I) -> Option<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        boxes.into_iter().reduce(|acc, bbox| acc.union(&bbox))
    }
}

/// Quadrilateral given by its four corners, as produced by PDF parsers and OCR
///
/// Rotated text yields corners that are not axis aligned; [`to_bbox`]
/// reduces them to their axis-aligned envelope.
///
/// [`to_bbox`]: BoundingRectangle::to_bbox
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingRectangle {
    pub r_x0: f64,
    pub r_y0: f64,
    pub r_x1: f64,
    pub r_y1: f64,
    pub r_x2: f64,
    pub r_y2: f64,
    pub r_x3: f64,
    pub r_y3: f64,
}

impl BoundingRectangle {
    /// Axis-aligned rectangle with corners in counter-clockwise order
    /// starting at the bottom-left
    #[must_use]
    pub const fn from_bbox(bbox: BoundingBox) -> Self {
        Self {
            r_x0: bbox.l,
            r_y0: bbox.b,
            r_x1: bbox.r,
            r_y1: bbox.b,
            r_x2: bbox.r,
            r_y2: bbox.t,
            r_x3: bbox.l,
            r_y3: bbox.t,
        }
    }

    /// Axis-aligned envelope of the four corners
    #[must_use = "returns the axis-aligned envelope of the rectangle"]
    pub fn to_bbox(&self) -> BoundingBox {
        BoundingBox {
            l: self.r_x0.min(self.r_x1).min(self.r_x2.min(self.r_x3)),
            b: self.r_y0.min(self.r_y1).min(self.r_y2.min(self.r_y3)),
            r: self.r_x0.max(self.r_x1).max(self.r_x2.max(self.r_x3)),
            t: self.r_y0.max(self.r_y1).max(self.r_y2.max(self.r_y3)),
        }
    }
}

impl From<BoundingBox> for BoundingRectangle {
    #[inline]
    fn from(bbox: BoundingBox) -> Self {
        Self::from_bbox(bbox)
    }
}
