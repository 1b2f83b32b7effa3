//! Rule-based reading order prediction
//!
//! Elements are ordered page by page. On each page, page headers, body
//! elements and page footers are ordered independently and concatenated in
//! that order.
//!
//! Within a group the predictor builds an above/below graph: `i → j` when
//! `i` lies strictly above `j`, the two overlap horizontally and no third
//! element sits between them. Boxes are widened toward their first upper and
//! lower neighbours (when the widening stays small and does not create an
//! overlap) and the graph is rebuilt on the widened boxes. A depth-first
//! traversal from the heads, which always climbs to the highest unvisited
//! ancestor first, yields the order.

use crate::config::ReadingOrderConfig;
use crate::geometry::BoundingBox;
use crate::spatial::SpatialIndex;
use crate::types::{DocItemLabel, PageElement};
use log::{debug, trace};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Horizontal slack of the "elements above" query
const ABOVE_QUERY_PADDING: f64 = 0.1;
/// Horizontal slack of the interruption query
const INTERRUPTION_QUERY_PADDING: f64 = 1.0;

/// Working state for one group of elements, addressed by local index
#[derive(Debug, Default)]
struct ReadingOrderState {
    /// Left-to-right reading chain (never populated)
    l2r_map: FxHashMap<usize, usize>,
    /// Right-to-left reading chain (never populated)
    r2l_map: FxHashMap<usize, usize>,
    /// Elements directly above each element
    up_map: Vec<Vec<usize>>,
    /// Elements directly below each element
    dn_map: Vec<Vec<usize>>,
    /// Elements with nothing above, in traversal order
    heads: Vec<usize>,
}

impl ReadingOrderState {
    /// End of the left-to-right chain starting at `i`
    fn follow_l2r_chain(&self, i: usize) -> usize {
        let mut mapped = i;
        for _ in 0..self.l2r_map.len() {
            match self.l2r_map.get(&mapped) {
                Some(&next) => mapped = next,
                None => break,
            }
        }
        mapped
    }
}

/// Reading order comparison
///
/// Page first; horizontally overlapping elements go top-down (higher bottom
/// edge first), others left to right. The relation is not transitive, so it
/// must only be used with [`insertion_sort_by`].
fn reading_cmp(a_page: usize, a: &BoundingBox, b_page: usize, b: &BoundingBox) -> Ordering {
    a_page.cmp(&b_page).then_with(|| {
        if a.overlaps_horizontally(b) {
            b.b.total_cmp(&a.b)
        } else {
            a.l.total_cmp(&b.l)
        }
    })
}

/// Stable insertion sort that tolerates non-transitive comparators
fn insertion_sort_by<T: Copy>(items: &mut [T], mut compare: impl FnMut(&T, &T) -> Ordering) {
    for i in 1..items.len() {
        let current = items[i];
        let mut j = i;
        while j > 0 && compare(&current, &items[j - 1]) == Ordering::Less {
            items[j] = items[j - 1];
            j -= 1;
        }
        items[j] = current;
    }
}

/// Page header / body / footer split of one page, as input positions
#[derive(Debug, Default)]
struct PageGroups {
    headers: Vec<usize>,
    body: Vec<usize>,
    footers: Vec<usize>,
}

/// Rule-based reading order predictor
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadingOrderPredictor {
    config: ReadingOrderConfig,
}

impl ReadingOrderPredictor {
    #[inline]
    #[must_use = "returns a new ReadingOrderPredictor instance"]
    pub const fn new(config: ReadingOrderConfig) -> Self {
        Self { config }
    }

    /// Reorder elements into reading order
    ///
    /// The result is a permutation of the input; geometry is never changed.
    #[must_use = "returns the elements in reading order"]
    pub fn predict_reading_order(&self, elements: &[PageElement]) -> Vec<PageElement> {
        self.order_positions(elements)
            .into_iter()
            .map(|pos| elements[pos].clone())
            .collect()
    }

    /// Element cids in reading order
    #[must_use = "returns the predicted reading order cids"]
    pub fn predict(&self, elements: &[PageElement]) -> Vec<usize> {
        self.order_positions(elements)
            .into_iter()
            .map(|pos| elements[pos].cid)
            .collect()
    }

    /// Positions into `elements` in reading order
    fn order_positions(&self, elements: &[PageElement]) -> Vec<usize> {
        let mut pages: BTreeMap<usize, PageGroups> = BTreeMap::new();
        for (pos, elem) in elements.iter().enumerate() {
            let groups = pages.entry(elem.page_no).or_default();
            match elem.label {
                DocItemLabel::PageHeader => groups.headers.push(pos),
                DocItemLabel::PageFooter => groups.footers.push(pos),
                _ => groups.body.push(pos),
            }
        }

        debug!(
            "Reading order: {} elements across {} pages",
            elements.len(),
            pages.len()
        );

        let mut order = Vec::with_capacity(elements.len());
        for groups in pages.values() {
            order.extend(self.predict_page(elements, &groups.headers));
            order.extend(self.predict_page(elements, &groups.body));
            order.extend(self.predict_page(elements, &groups.footers));
        }
        order
    }

    /// Order one group of elements, given as positions into `elements`
    fn predict_page(&self, elements: &[PageElement], members: &[usize]) -> Vec<usize> {
        let Some(&first) = members.first() else {
            return Vec::new();
        };

        let originals: Vec<BoundingBox> = members.iter().map(|&pos| elements[pos].bbox).collect();
        let page_nos: Vec<usize> = members.iter().map(|&pos| elements[pos].page_no).collect();

        let mut state = ReadingOrderState::default();
        Self::init_ud_maps(&originals, &mut state);

        let bboxes = if self.config.dilated_page_element {
            let dilated =
                self.do_horizontal_dilation(&originals, elements[first].page_width, &state);
            Self::init_ud_maps(&dilated, &mut state);
            dilated
        } else {
            originals
        };

        let compare = |a: &usize, b: &usize| {
            reading_cmp(page_nos[*a], &bboxes[*a], page_nos[*b], &bboxes[*b])
        };
        Self::find_heads(&mut state, compare);
        Self::sort_ud_maps(&mut state, compare);

        Self::find_order(&state)
            .into_iter()
            .map(|local| members[local])
            .collect()
    }

    /// Build the up/down adjacency maps
    fn init_ud_maps(bboxes: &[BoundingBox], state: &mut ReadingOrderState) {
        state.up_map = vec![Vec::new(); bboxes.len()];
        state.dn_map = vec![Vec::new(); bboxes.len()];

        let index = SpatialIndex::from_entries(bboxes.iter().copied().enumerate());

        for (j, bbox_j) in bboxes.iter().enumerate() {
            if let Some(&left) = state.r2l_map.get(&j) {
                state.dn_map[left].push(j);
                state.up_map[j].push(left);
                continue;
            }

            let query = BoundingBox::new(
                bbox_j.l - ABOVE_QUERY_PADDING,
                bbox_j.t,
                bbox_j.r + ABOVE_QUERY_PADDING,
                f64::INFINITY,
            );

            for i in index.intersecting(&query) {
                if i == j {
                    continue;
                }
                let bbox_i = &bboxes[i];
                if !bbox_i.is_strictly_above(bbox_j) || !bbox_i.overlaps_horizontally(bbox_j) {
                    continue;
                }
                if Self::has_sequence_interruption(&index, bboxes, i, j) {
                    continue;
                }

                let mapped = state.follow_l2r_chain(i);
                state.dn_map[mapped].push(j);
                state.up_map[j].push(mapped);
            }
        }
    }

    /// Whether some element sits between `i` (above) and `j` (below) and
    /// overlaps either of them horizontally
    fn has_sequence_interruption(
        index: &SpatialIndex,
        bboxes: &[BoundingBox],
        i: usize,
        j: usize,
    ) -> bool {
        let (bbox_i, bbox_j) = (&bboxes[i], &bboxes[j]);
        let query = BoundingBox::new(
            bbox_i.l.min(bbox_j.l) - INTERRUPTION_QUERY_PADDING,
            bbox_j.t,
            bbox_i.r.max(bbox_j.r) + INTERRUPTION_QUERY_PADDING,
            bbox_i.b,
        );

        index.intersecting(&query).into_iter().any(|w| {
            if w == i || w == j {
                return false;
            }
            let bbox_w = &bboxes[w];
            (bbox_i.overlaps_horizontally(bbox_w) || bbox_j.overlaps_horizontally(bbox_w))
                && bbox_i.is_strictly_above(bbox_w)
                && bbox_w.is_strictly_above(bbox_j)
        })
    }

    /// Widen each box toward its first upper and lower neighbour
    ///
    /// Each widening step may extend either side by at most
    /// `horizontal_dilation_threshold_norm * page_width`. The widened box is
    /// dropped if it overlaps any other original box.
    fn do_horizontal_dilation(
        &self,
        bboxes: &[BoundingBox],
        page_width: f64,
        state: &ReadingOrderState,
    ) -> Vec<BoundingBox> {
        let th = self.config.horizontal_dilation_threshold_norm * page_width;
        let mut dilated_count = 0usize;

        let dilated = bboxes
            .iter()
            .enumerate()
            .map(|(i, original)| {
                let (mut x0, mut x1) = (original.l, original.r);

                let neighbours = [state.up_map[i].first(), state.dn_map[i].first()];
                for &neighbour in neighbours.into_iter().flatten() {
                    let other = &bboxes[neighbour];
                    let x0_dil = x0.min(other.l);
                    let x1_dil = x1.max(other.r);
                    if x0 - x0_dil <= th && x1_dil - x1 <= th {
                        x0 = x0_dil;
                        x1 = x1_dil;
                    }
                }

                let widened = BoundingBox::new(x0, original.b, x1, original.t);
                let overlaps_with_rest = bboxes
                    .iter()
                    .enumerate()
                    .any(|(j, other)| j != i && other.overlaps(&widened));

                if overlaps_with_rest {
                    *original
                } else {
                    if widened != *original {
                        dilated_count += 1;
                    }
                    widened
                }
            })
            .collect();

        trace!("Horizontal dilation widened {dilated_count} of {} boxes", bboxes.len());
        dilated
    }

    /// Collect elements with nothing above them, in reading order
    fn find_heads(state: &mut ReadingOrderState, compare: impl FnMut(&usize, &usize) -> Ordering) {
        let mut heads: Vec<usize> = state
            .up_map
            .iter()
            .enumerate()
            .filter(|(_, ups)| ups.is_empty())
            .map(|(i, _)| i)
            .collect();
        insertion_sort_by(&mut heads, compare);
        state.heads = heads;
    }

    /// Sort every down-list in reading order
    fn sort_ud_maps(
        state: &mut ReadingOrderState,
        mut compare: impl FnMut(&usize, &usize) -> Ordering,
    ) {
        for successors in &mut state.dn_map {
            insertion_sort_by(successors, &mut compare);
        }
    }

    /// Depth-first traversal from the heads
    ///
    /// Elements the traversal cannot reach are appended in index order.
    fn find_order(state: &ReadingOrderState) -> Vec<usize> {
        let n = state.up_map.len();
        let mut order = Vec::with_capacity(n);
        let mut visited = vec![false; n];

        for &head in &state.heads {
            if !visited[head] {
                order.push(head);
                visited[head] = true;
                Self::depth_first_search_downwards(head, state, &mut visited, &mut order);
            }
        }

        if order.len() < n {
            trace!("Appending {} unreachable elements", n - order.len());
            for (i, seen) in visited.iter().enumerate() {
                if !seen {
                    order.push(i);
                }
            }
        }

        order
    }

    /// Highest unvisited ancestor of `start` (or `start` itself)
    ///
    /// The walk is bounded by the number of elements, so it terminates even
    /// if the graph contains a cycle.
    fn depth_first_search_upwards(
        start: usize,
        state: &ReadingOrderState,
        visited: &[bool],
    ) -> usize {
        let mut k = start;
        for _ in 0..state.up_map.len() {
            match state.up_map[k].iter().find(|&&up| !visited[up]) {
                Some(&up) => k = up,
                None => break,
            }
        }
        k
    }

    /// Non-recursive depth-first search downwards
    ///
    /// The stack holds `(element, offset)` pairs: the element whose
    /// down-list is being walked and where to resume in it.
    fn depth_first_search_downwards(
        start: usize,
        state: &ReadingOrderState,
        visited: &mut [bool],
        order: &mut Vec<usize>,
    ) {
        let mut stack = vec![(start, 0usize)];

        while let Some((node, offset)) = stack.pop() {
            for (m, &successor) in state.dn_map[node].iter().enumerate().skip(offset) {
                let k = Self::depth_first_search_upwards(successor, state, visited);
                if !visited[k] {
                    order.push(k);
                    visited[k] = true;
                    stack.push((node, m + 1));
                    stack.push((k, 0));
                    break;
                }
            }
        }
    }
}
