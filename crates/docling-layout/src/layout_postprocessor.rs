//! Layout post-processing
//!
//! Turns raw, overlapping cluster proposals plus the page's text cells into
//! a clean cluster set:
//! - Confidence filtering and label remapping
//! - Cell assignment (20% coverage threshold, best match wins)
//! - Empty cluster removal and orphan creation (unassigned cells → TEXT clusters)
//! - Iterative refinement (bbox adjustment + overlap removal)
//! - Special clusters: table/region arbitration, full-page picture removal,
//!   child containment, picture and wrapper overlap removal
//! - Final ordering by first cell index
//!
//! Clusters are addressed by their position in the working vector during
//! each merge pass, so caller ids never need to be unique for the
//! algorithm to terminate.

use crate::config::{OverlapParams, PostprocessOptions, PostprocessorConfig};
use crate::geometry::BoundingBox;
use crate::spatial::{IntervalTree, SpatialIndex};
use crate::types::{DocItemLabel, LayoutCluster, PageGeometry, TextCell};
use crate::union_find::UnionFind;
use log::{debug, trace};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Cluster orderings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterSortMode {
    /// Smallest cell index ascending (clusters without cells last), then
    /// top descending, then left ascending
    #[default]
    CellIndex,
    /// Top descending, then left ascending
    TopBottomLeftRight,
    /// Left ascending, then top descending
    LeftRightTopBottom,
}

/// Stable sort of clusters in the given mode
pub fn sort_clusters(clusters: &mut [LayoutCluster], mode: ClusterSortMode) {
    match mode {
        ClusterSortMode::CellIndex => clusters.sort_by(|a, b| {
            cell_order_key(a)
                .cmp(&cell_order_key(b))
                .then_with(|| b.bbox.t.total_cmp(&a.bbox.t))
                .then_with(|| a.bbox.l.total_cmp(&b.bbox.l))
        }),
        ClusterSortMode::TopBottomLeftRight => clusters.sort_by(|a, b| {
            b.bbox
                .t
                .total_cmp(&a.bbox.t)
                .then_with(|| a.bbox.l.total_cmp(&b.bbox.l))
        }),
        ClusterSortMode::LeftRightTopBottom => clusters.sort_by(|a, b| {
            a.bbox
                .l
                .total_cmp(&b.bbox.l)
                .then_with(|| b.bbox.t.total_cmp(&a.bbox.t))
        }),
    }
}

/// Clusters without cells sort after every cluster with cells
#[inline]
fn cell_order_key(cluster: &LayoutCluster) -> (bool, usize) {
    match cluster.min_cell_index() {
        Some(index) => (false, index),
        None => (true, 0),
    }
}

/// Drop repeated cell indices, keeping the first occurrence
fn dedup_cells(cells: &mut Vec<TextCell>) {
    let mut seen = FxHashSet::default();
    cells.retain(|cell| seen.insert(cell.index));
}

#[inline]
fn sort_cells(cells: &mut [TextCell]) {
    cells.sort_by_key(|cell| cell.index);
}

/// Candidate search for overlap merging
///
/// Combines an R-tree over the cluster boxes with interval trees over their
/// x and y extents; the interval lookups also catch clusters that merely
/// share an edge with the query.
struct ClusterIndex {
    boxes: SpatialIndex,
    x_intervals: IntervalTree,
    y_intervals: IntervalTree,
}

impl ClusterIndex {
    /// Index clusters under their position in `clusters`
    fn new(clusters: &[LayoutCluster]) -> Self {
        let mut x_intervals = IntervalTree::new();
        let mut y_intervals = IntervalTree::new();
        for (pos, cluster) in clusters.iter().enumerate() {
            x_intervals.insert(cluster.bbox.l, cluster.bbox.r, pos);
            y_intervals.insert(cluster.bbox.b, cluster.bbox.t, pos);
        }

        Self {
            boxes: SpatialIndex::from_entries(
                clusters.iter().enumerate().map(|(pos, c)| (pos, c.bbox)),
            ),
            x_intervals,
            y_intervals,
        }
    }

    /// Positions of clusters that might overlap `bbox`, ascending
    fn find_candidates(&self, bbox: &BoundingBox) -> Vec<usize> {
        let mut candidates = self.boxes.touching(bbox);
        candidates.extend(self.x_intervals.find_containing(bbox.l));
        candidates.extend(self.x_intervals.find_containing(bbox.r));
        candidates.extend(self.y_intervals.find_containing(bbox.b));
        candidates.extend(self.y_intervals.find_containing(bbox.t));

        let mut candidates: Vec<usize> = candidates.into_iter().collect();
        candidates.sort_unstable();
        candidates
    }
}

/// Result of [`LayoutPostprocessor::postprocess`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostprocessOutput {
    /// Final clusters in [`ClusterSortMode::CellIndex`] order
    pub clusters: Vec<LayoutCluster>,
    /// The page's cells, unchanged
    pub cells: Vec<TextCell>,
}

/// Layout post-processor
#[derive(Debug, Clone, Default)]
pub struct LayoutPostprocessor {
    config: PostprocessorConfig,
}

impl LayoutPostprocessor {
    #[must_use]
    pub const fn new(config: PostprocessorConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &PostprocessorConfig {
        &self.config
    }

    /// Clean up the raw clusters of one page
    ///
    /// Never fails: degenerate geometry yields zero overlaps, unknown labels
    /// are regular clusters with a threshold of 0, and empty inputs produce
    /// empty outputs.
    #[must_use = "post-processing returns the cleaned clusters"]
    pub fn postprocess(
        &self,
        page: &PageGeometry,
        cells: &[TextCell],
        clusters: Vec<LayoutCluster>,
        options: &PostprocessOptions,
    ) -> PostprocessOutput {
        let next_orphan_id = clusters.iter().map(|c| c.id).max().map_or(1, |id| id + 1);
        let raw_count = clusters.len();

        let (special, regular): (Vec<_>, Vec<_>) =
            clusters.into_iter().partition(|c| c.label.is_special());

        let regular = self.process_regular_clusters(regular, cells, next_orphan_id, options);
        let (special, contained) = self.process_special_clusters(special, &regular, page, options);

        let mut final_clusters: Vec<LayoutCluster> = regular
            .into_iter()
            .enumerate()
            .filter(|(pos, _)| !contained.contains(pos))
            .map(|(_, c)| c)
            .chain(special)
            .collect();

        sort_clusters(&mut final_clusters, ClusterSortMode::CellIndex);

        if !options.skip_cell_assignment {
            for cluster in &mut final_clusters {
                sort_cells(&mut cluster.cells);
                for child in &mut cluster.children {
                    sort_cells(&mut child.cells);
                }
            }
        }

        debug!(
            "Post-processed {} raw clusters into {} clusters ({} cells)",
            raw_count,
            final_clusters.len(),
            cells.len()
        );

        PostprocessOutput {
            clusters: final_clusters,
            cells: cells.to_vec(),
        }
    }

    fn filter_by_confidence(&self, clusters: Vec<LayoutCluster>) -> Vec<LayoutCluster> {
        clusters
            .into_iter()
            .filter(|c| c.confidence >= self.config.threshold_for(&c.label))
            .collect()
    }

    fn process_regular_clusters(
        &self,
        clusters: Vec<LayoutCluster>,
        cells: &[TextCell],
        next_orphan_id: usize,
        options: &PostprocessOptions,
    ) -> Vec<LayoutCluster> {
        let mut clusters = self.filter_by_confidence(clusters);
        for cluster in &mut clusters {
            cluster.label = self.config.remap(&cluster.label);
        }
        debug!("  Regular: {} clusters after confidence filtering", clusters.len());

        if !options.skip_cell_assignment {
            self.assign_cells_to_clusters(&mut clusters, cells);

            if !options.keep_empty_clusters {
                clusters.retain(|c| !c.cells.is_empty() || c.label == DocItemLabel::Formula);
            }

            if options.create_orphan_clusters {
                let orphans = Self::create_orphan_clusters(&clusters, cells, next_orphan_id);
                debug!("  Regular: created {} orphan clusters", orphans.len());
                clusters.extend(orphans);
            }
        }

        self.iterative_refinement(clusters)
    }

    /// Assign each non-blank cell to the cluster covering most of it
    ///
    /// Coverage must exceed `min_cell_overlap`; on ties the earlier cluster
    /// keeps the cell. Cells already attached to the clusters are discarded.
    pub fn assign_cells_to_clusters(&self, clusters: &mut [LayoutCluster], cells: &[TextCell]) {
        for cluster in clusters.iter_mut() {
            cluster.cells.clear();
        }

        let index =
            SpatialIndex::from_entries(clusters.iter().enumerate().map(|(pos, c)| (pos, c.bbox)));

        for cell in cells {
            if cell.is_blank() {
                continue;
            }
            let cell_bbox = cell.bbox();
            if cell_bbox.area() <= 0.0 {
                continue;
            }

            let mut best_overlap = self.config.min_cell_overlap;
            let mut best_cluster: Option<usize> = None;

            for pos in index.intersecting(&cell_bbox) {
                let overlap = cell_bbox.intersection_over_self(&clusters[pos].bbox);
                if overlap > best_overlap {
                    best_overlap = overlap;
                    best_cluster = Some(pos);
                }
            }

            if let Some(pos) = best_cluster {
                clusters[pos].cells.push(cell.clone());
            }
        }

        for cluster in clusters.iter_mut() {
            dedup_cells(&mut cluster.cells);
        }
    }

    /// Wrap every non-blank cell no cluster claimed in a `text` cluster
    fn create_orphan_clusters(
        clusters: &[LayoutCluster],
        cells: &[TextCell],
        first_id: usize,
    ) -> Vec<LayoutCluster> {
        let assigned: FxHashSet<usize> = clusters
            .iter()
            .flat_map(|c| c.cells.iter().map(|cell| cell.index))
            .collect();

        cells
            .iter()
            .filter(|cell| !assigned.contains(&cell.index) && !cell.is_blank())
            .enumerate()
            .map(|(offset, cell)| LayoutCluster {
                id: first_id + offset,
                label: DocItemLabel::Text,
                bbox: cell.bbox(),
                confidence: cell.confidence,
                cells: vec![cell.clone()],
                children: Vec::new(),
            })
            .collect()
    }

    /// Alternate bbox adjustment and overlap removal until the cluster
    /// count stops changing
    fn iterative_refinement(&self, mut clusters: Vec<LayoutCluster>) -> Vec<LayoutCluster> {
        let mut prev_count = clusters.len() + 1;

        for iteration in 0..self.config.max_refinement_iterations {
            if prev_count == clusters.len() {
                break;
            }
            prev_count = clusters.len();

            Self::adjust_cluster_bboxes(&mut clusters);
            clusters = self.remove_overlapping_clusters(clusters, self.config.regular);

            trace!(
                "  Refinement iteration {}: {} -> {} clusters",
                iteration,
                prev_count,
                clusters.len()
            );
        }

        clusters
    }

    /// Fit each cluster's bbox to its cells
    ///
    /// Tables only ever grow; clusters without cells keep their bbox.
    fn adjust_cluster_bboxes(clusters: &mut [LayoutCluster]) {
        for cluster in clusters {
            let Some(cells_bbox) = BoundingBox::enclosing(cluster.cells.iter().map(TextCell::bbox))
            else {
                continue;
            };

            cluster.bbox = if cluster.label == DocItemLabel::Table {
                cluster.bbox.union(&cells_bbox)
            } else {
                cells_bbox
            };
        }
    }

    /// Whether two boxes overlap enough to be merged
    ///
    /// Overlap detected if both boxes have area and ANY of these hold:
    /// - `IoU` > `overlap_threshold`
    /// - either box is covered beyond `containment_threshold`
    fn check_overlap(&self, bbox1: &BoundingBox, bbox2: &BoundingBox) -> bool {
        if bbox1.area() <= 0.0 || bbox2.area() <= 0.0 {
            return false;
        }

        bbox1.intersection_over_union(bbox2) > self.config.overlap_threshold
            || bbox1.intersection_over_self(bbox2) > self.config.containment_threshold
            || bbox2.intersection_over_self(bbox1) > self.config.containment_threshold
    }

    /// Merge groups of transitively overlapping clusters into one survivor
    ///
    /// The spatial index is rebuilt from the current geometry on each call.
    /// Groups come out in the order of their first member; the survivor
    /// absorbs the cells of the other members.
    fn remove_overlapping_clusters(
        &self,
        clusters: Vec<LayoutCluster>,
        params: OverlapParams,
    ) -> Vec<LayoutCluster> {
        self.merge_overlapping_clusters(clusters, params)
            .into_iter()
            .map(|(_, cluster)| cluster)
            .collect()
    }

    /// Survivors of the merge, each paired with its input position
    fn merge_overlapping_clusters(
        &self,
        clusters: Vec<LayoutCluster>,
        params: OverlapParams,
    ) -> Vec<(usize, LayoutCluster)> {
        if clusters.len() < 2 {
            return clusters.into_iter().enumerate().collect();
        }

        let index = ClusterIndex::new(&clusters);
        let mut uf = UnionFind::new(0..clusters.len());

        for (pos, cluster) in clusters.iter().enumerate() {
            for other in index.find_candidates(&cluster.bbox) {
                if other != pos && self.check_overlap(&cluster.bbox, &clusters[other].bbox) {
                    uf.union(pos, other);
                }
            }
        }

        let plan: Vec<(usize, Vec<usize>)> = uf
            .groups()
            .into_iter()
            .map(|(_, members)| {
                let best = if members.len() == 1 {
                    members[0]
                } else {
                    self.select_best_cluster_from_group(&clusters, &members, params)
                };
                (best, members)
            })
            .collect();

        let mut slots: Vec<Option<LayoutCluster>> = clusters.into_iter().map(Some).collect();
        let mut result = Vec::with_capacity(plan.len());

        for (best, members) in plan {
            let Some(mut winner) = slots[best].take() else {
                continue;
            };

            if members.len() > 1 {
                for &member in &members {
                    if member == best {
                        continue;
                    }
                    if let Some(loser) = slots[member].take() {
                        trace!(
                            "    Cluster {} ({}) absorbed into {} ({})",
                            loser.id,
                            loser.label,
                            winner.id,
                            winner.label
                        );
                        winner.cells.extend(loser.cells);
                    }
                }
                dedup_cells(&mut winner.cells);
                sort_cells(&mut winner.cells);
            }

            result.push((best, winner));
        }

        result
    }

    /// Pick the survivor of a merge group
    ///
    /// Candidates that lose a pairwise comparison against any member are
    /// ineligible. Among the eligible ones a larger cluster replaces the
    /// current best only if it costs at most `conf_threshold` confidence.
    /// Falls back to the first member.
    fn select_best_cluster_from_group(
        &self,
        clusters: &[LayoutCluster],
        members: &[usize],
        params: OverlapParams,
    ) -> usize {
        let mut current_best: Option<usize> = None;

        for &candidate in members {
            let eligible = members
                .iter()
                .filter(|&&other| other != candidate)
                .all(|&other| {
                    self.should_prefer_cluster(&clusters[candidate], &clusters[other], params)
                });

            if !eligible {
                continue;
            }

            current_best = match current_best {
                None => Some(candidate),
                Some(best) => {
                    let cand = &clusters[candidate];
                    let best_cluster = &clusters[best];
                    if cand.bbox.area() > best_cluster.bbox.area()
                        && best_cluster.confidence - cand.confidence <= params.conf_threshold
                    {
                        Some(candidate)
                    } else {
                        Some(best)
                    }
                }
            };
        }

        current_best.unwrap_or(members[0])
    }

    /// Whether `candidate` survives a pairwise comparison against `other`
    fn should_prefer_cluster(
        &self,
        candidate: &LayoutCluster,
        other: &LayoutCluster,
        params: OverlapParams,
    ) -> bool {
        let area_ratio = candidate.bbox.area() / other.bbox.area();

        // LIST_ITEM beats TEXT of similar size
        if candidate.label == DocItemLabel::ListItem
            && other.label == DocItemLabel::Text
            && (1.0 - area_ratio).abs() < self.config.list_item_area_similarity
        {
            return true;
        }

        // CODE beats anything it contains
        if candidate.label == DocItemLabel::Code
            && other.bbox.intersection_over_self(&candidate.bbox)
                > self.config.code_containment_threshold
        {
            return true;
        }

        let conf_diff = other.confidence - candidate.confidence;
        !(area_ratio <= params.area_threshold && conf_diff > params.conf_threshold)
    }

    /// Clean up the special clusters
    ///
    /// Also returns the positions in `regular_clusters` of every regular
    /// cluster a surviving special cluster took as a child.
    fn process_special_clusters(
        &self,
        clusters: Vec<LayoutCluster>,
        regular_clusters: &[LayoutCluster],
        page: &PageGeometry,
        options: &PostprocessOptions,
    ) -> (Vec<LayoutCluster>, FxHashSet<usize>) {
        let clusters = self.filter_by_confidence(clusters);
        let mut clusters = self.handle_cross_type_overlaps(clusters);

        let page_area = page.area();
        if page_area > 0.0 {
            clusters.retain(|c| {
                let full_page = c.label == DocItemLabel::Picture
                    && c.bbox.area() / page_area > self.config.full_page_picture_ratio;
                if full_page {
                    debug!("  Special: dropping full-page picture {}", c.id);
                }
                !full_page
            });
        }

        let children: Vec<Vec<usize>> = clusters
            .iter_mut()
            .map(|special| self.attach_children(special, regular_clusters, options))
            .collect();

        let (pictures, wrappers): (Vec<_>, Vec<_>) = clusters
            .into_iter()
            .zip(children)
            .partition(|(c, _)| c.label == DocItemLabel::Picture);

        let mut result = Vec::new();
        let mut contained = FxHashSet::default();
        for (family, params) in [(pictures, self.config.picture), (wrappers, self.config.wrapper)] {
            let (family, family_children): (Vec<LayoutCluster>, Vec<Vec<usize>>) =
                family.into_iter().unzip();
            for (pos, survivor) in self.merge_overlapping_clusters(family, params) {
                contained.extend(family_children[pos].iter().copied());
                result.push(survivor);
            }
        }

        debug!("  Special: {} clusters after overlap removal", result.len());
        (result, contained)
    }

    /// Drop key-value regions that are mostly covered by a table unless the
    /// region is clearly more confident
    fn handle_cross_type_overlaps(&self, clusters: Vec<LayoutCluster>) -> Vec<LayoutCluster> {
        let tables: Vec<(BoundingBox, f64)> = clusters
            .iter()
            .filter(|c| c.label == DocItemLabel::Table)
            .map(|c| (c.bbox, c.confidence))
            .collect();

        if tables.is_empty() {
            return clusters;
        }

        clusters
            .into_iter()
            .filter(|region| {
                if region.label != DocItemLabel::KeyValueRegion {
                    return true;
                }
                let dominated = tables.iter().any(|(table_bbox, table_conf)| {
                    region.bbox.intersection_over_self(table_bbox)
                        > self.config.kvr_table_overlap_threshold
                        && region.confidence - table_conf < self.config.kvr_table_confidence_gap
                });
                if dominated {
                    debug!("  Special: key-value region {} yields to table", region.id);
                }
                !dominated
            })
            .collect()
    }

    /// Attach the regular clusters a special cluster contains as children
    ///
    /// Returns the positions of the children in `regular_clusters`.
    fn attach_children(
        &self,
        special: &mut LayoutCluster,
        regular_clusters: &[LayoutCluster],
        options: &PostprocessOptions,
    ) -> Vec<usize> {
        let positions: Vec<usize> = regular_clusters
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                c.bbox.intersection_over_self(&special.bbox)
                    > self.config.child_containment_threshold
            })
            .map(|(pos, _)| pos)
            .collect();

        if positions.is_empty() {
            return positions;
        }

        let mut contained: Vec<LayoutCluster> =
            positions.iter().map(|&pos| regular_clusters[pos].clone()).collect();

        sort_clusters(&mut contained, ClusterSortMode::CellIndex);

        if matches!(
            special.label,
            DocItemLabel::Form | DocItemLabel::KeyValueRegion
        ) {
            if let Some(envelope) = BoundingBox::enclosing(contained.iter().map(|c| c.bbox)) {
                special.bbox = envelope;
            }
        }

        special.cells = if options.skip_cell_assignment {
            Vec::new()
        } else {
            let mut cells: Vec<TextCell> = contained
                .iter()
                .flat_map(|child| child.cells.iter().cloned())
                .collect();
            dedup_cells(&mut cells);
            sort_cells(&mut cells);
            cells
        };

        trace!(
            "    {} {} contains {} regular clusters",
            special.label,
            special.id,
            contained.len()
        );
        special.children = contained;
        positions
    }
}
