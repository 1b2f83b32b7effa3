//! Candidate pruning structures over bounding boxes
//!
//! - [`SpatialIndex`]: R-tree over `(id, bbox)` entries, queried by 2D overlap
//! - [`IntervalTree`]: sorted 1D intervals, queried by point containment
//!
//! Both only prune candidates; callers always run a precise geometric check
//! on what comes back.

use crate::geometry::BoundingBox;
use rstar::{RTree, AABB};
use rustc_hash::FxHashSet;

/// Envelope for R-tree spatial indexing
#[derive(Debug, Clone, Copy, PartialEq)]
struct IndexedBox {
    aabb: AABB<[f64; 2]>,
    bbox: BoundingBox,
    id: usize,
}

impl IndexedBox {
    fn new(id: usize, bbox: BoundingBox) -> Self {
        Self {
            aabb: to_aabb(&bbox),
            bbox,
            id,
        }
    }
}

impl rstar::RTreeObject for IndexedBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

#[inline]
fn to_aabb(bbox: &BoundingBox) -> AABB<[f64; 2]> {
    AABB::from_corners([bbox.l, bbox.b], [bbox.r, bbox.t])
}

/// 2D spatial index over `(id, bbox)` pairs
///
/// Query results are sorted by id, so callers that insert ids in
/// ascending order see the same order a linear insertion-order scan would
/// produce.
#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    tree: RTree<IndexedBox>,
}

impl SpatialIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-load an index from `(id, bbox)` pairs
    pub fn from_entries(entries: impl IntoIterator<Item = (usize, BoundingBox)>) -> Self {
        let items = entries
            .into_iter()
            .map(|(id, bbox)| IndexedBox::new(id, bbox))
            .collect();
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    pub fn insert(&mut self, id: usize, bbox: BoundingBox) {
        self.tree.insert(IndexedBox::new(id, bbox));
    }

    /// Remove every entry stored under `id`
    pub fn remove(&mut self, id: usize) {
        let stale: Vec<IndexedBox> = self
            .tree
            .iter()
            .filter(|item| item.id == id)
            .copied()
            .collect();
        for item in &stale {
            self.tree.remove(item);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Ids of entries whose box strictly overlaps `query`, ascending
    ///
    /// `query` may use infinite edges to express half-open regions.
    #[must_use]
    pub fn intersecting(&self, query: &BoundingBox) -> Vec<usize> {
        let mut ids: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&to_aabb(query))
            .filter(|item| item.bbox.overlaps(query))
            .map(|item| item.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Ids of entries whose envelope touches or overlaps `query`
    ///
    /// Looser than [`intersecting`](Self::intersecting): shared edges count.
    #[must_use]
    pub fn touching(&self, query: &BoundingBox) -> FxHashSet<usize> {
        self.tree
            .locate_in_envelope_intersecting(&to_aabb(query))
            .map(|item| item.id)
            .collect()
    }
}

/// Closed interval `[min_val, max_val]` tagged with an id
#[derive(Debug, Clone, Copy, PartialEq)]
struct Interval {
    min_val: f64,
    max_val: f64,
    id: usize,
}

/// Intervals kept sorted by their start, for 1D point-containment queries
#[derive(Debug, Clone, Default)]
pub struct IntervalTree {
    intervals: Vec<Interval>,
}

impl IntervalTree {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            intervals: Vec::new(),
        }
    }

    /// Insert an interval with binary insertion to maintain sorted order
    pub fn insert(&mut self, min_val: f64, max_val: f64, id: usize) {
        let pos = self
            .intervals
            .partition_point(|interval| interval.min_val.total_cmp(&min_val).is_le());
        self.intervals.insert(
            pos,
            Interval {
                min_val,
                max_val,
                id,
            },
        );
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Ids of all intervals containing `point` (bounds inclusive)
    #[must_use]
    pub fn find_containing(&self, point: f64) -> FxHashSet<usize> {
        // Intervals past this position all start after `point`
        let end = self
            .intervals
            .partition_point(|interval| interval.min_val <= point);

        // Ends are not sorted, so every earlier interval has to be checked
        self.intervals[..end]
            .iter()
            .filter(|interval| point <= interval.max_val)
            .map(|interval| interval.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersecting_is_strict_and_sorted() {
        let index = SpatialIndex::from_entries([
            (2, BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
            (0, BoundingBox::new(5.0, 5.0, 15.0, 15.0)),
            (1, BoundingBox::new(10.0, 0.0, 20.0, 10.0)),
        ]);

        let hits = index.intersecting(&BoundingBox::new(1.0, 1.0, 9.0, 9.0));
        assert_eq!(hits, vec![0, 2]);

        // Touching the shared edge at x=10 is not an overlap
        let edge = index.intersecting(&BoundingBox::new(-5.0, 0.0, 0.0, 10.0));
        assert!(edge.is_empty());
        assert!(index
            .touching(&BoundingBox::new(-5.0, 0.0, 0.0, 10.0))
            .contains(&2));
    }

    #[test]
    fn test_intersecting_half_open_query() {
        let index = SpatialIndex::from_entries([
            (0, BoundingBox::new(0.0, 80.0, 100.0, 100.0)),
            (1, BoundingBox::new(0.0, 0.0, 100.0, 20.0)),
        ]);
        let above = BoundingBox::new(-0.1, 20.0, 100.1, f64::INFINITY);
        assert_eq!(index.intersecting(&above), vec![0]);
    }

    #[test]
    fn test_insert_and_remove() {
        let mut index = SpatialIndex::new();
        index.insert(4, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        index.insert(5, BoundingBox::new(0.5, 0.5, 2.0, 2.0));
        assert_eq!(index.len(), 2);

        index.remove(4);
        assert_eq!(
            index.intersecting(&BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
            vec![5]
        );
        assert!(!index.is_empty());
    }

    #[test]
    fn test_interval_tree_find_containing() {
        let mut tree = IntervalTree::new();
        tree.insert(0.0, 100.0, 1);
        tree.insert(10.0, 20.0, 2);
        tree.insert(30.0, 40.0, 3);
        tree.insert(50.0, 50.0, 4);

        let hits = tree.find_containing(35.0);
        assert_eq!(hits.len(), 2);
        assert!(hits.contains(&1) && hits.contains(&3));

        // A long interval that starts early must not hide later short ones
        assert!(tree.find_containing(15.0).contains(&2));
        assert!(tree.find_containing(50.0).contains(&4));
        assert!(tree.find_containing(150.0).is_empty());
    }
}
