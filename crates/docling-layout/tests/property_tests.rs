//! Property-Based Tests
//!
//! Invariants of the geometry helpers, the union-find and both layout
//! stages, checked over generated pages.

use docling_layout::{
    BoundingBox, DocItemLabel, LayoutCluster, LayoutPostprocessor, PageElement, PageGeometry,
    PostprocessOptions, ReadingOrderPredictor, TextCell, UnionFind,
};
use proptest::prelude::*;
use std::collections::HashSet;

fn bbox_strategy() -> impl Strategy<Value = BoundingBox> {
    (0.0..90.0f64, 0.0..90.0f64, 1.0..40.0f64, 1.0..40.0f64)
        .prop_map(|(l, b, w, h)| BoundingBox::new(l, b, (l + w).min(100.0), (b + h).min(100.0)))
}

fn label_strategy() -> impl Strategy<Value = DocItemLabel> {
    prop_oneof![
        Just(DocItemLabel::Text),
        Just(DocItemLabel::SectionHeader),
        Just(DocItemLabel::ListItem),
        Just(DocItemLabel::PageHeader),
        Just(DocItemLabel::PageFooter),
        Just(DocItemLabel::Picture),
        Just(DocItemLabel::Table),
    ]
}

fn group_rank(label: &DocItemLabel) -> u8 {
    match label {
        DocItemLabel::PageHeader => 0,
        DocItemLabel::PageFooter => 2,
        _ => 1,
    }
}

// ============================================================================
// Geometry Properties
// ============================================================================

/// Property: IoU is symmetric and bounded
#[test]
fn proptest_iou_symmetric() {
    proptest!(|(a in bbox_strategy(), b in bbox_strategy())| {
        let ab = a.intersection_over_union(&b);
        let ba = b.intersection_over_union(&a);
        prop_assert!((ab - ba).abs() < 1e-12);
        prop_assert!((0.0..=1.0).contains(&ab));
    });
}

/// Property: a box has IoU 1 with itself
#[test]
fn proptest_iou_identity() {
    proptest!(|(a in bbox_strategy())| {
        prop_assert!((a.intersection_over_union(&a) - 1.0).abs() < 1e-12);
    });
}

/// Property: horizontally separated boxes have IoU 0
#[test]
fn proptest_iou_disjoint() {
    proptest!(|(a in bbox_strategy(), shift in 1.0..50.0f64)| {
        let b = BoundingBox::new(a.r + shift, a.b, a.r + shift + a.width(), a.t);
        prop_assert_eq!(a.intersection_over_union(&b), 0.0);
    });
}

/// Property: width, height and area never go negative, even for inverted
/// boxes
#[test]
fn proptest_area_non_negative() {
    proptest!(|(
        l in -100.0..100.0f64,
        b in -100.0..100.0f64,
        r in -100.0..100.0f64,
        t in -100.0..100.0f64,
    )| {
        let bbox = BoundingBox::new(l, b, r, t);
        prop_assert!(bbox.width() >= 0.0);
        prop_assert!(bbox.height() >= 0.0);
        prop_assert!(bbox.area() >= 0.0);
    });
}

/// Property: intersection over self stays within [0, 1]
#[test]
fn proptest_intersection_over_self_bounded() {
    proptest!(|(a in bbox_strategy(), b in bbox_strategy())| {
        let ios = a.intersection_over_self(&b);
        prop_assert!((0.0..=1.0 + 1e-12).contains(&ios));
    });
}

// ============================================================================
// Union-Find Properties
// ============================================================================

/// Property: groups partition the element set
#[test]
fn proptest_union_find_partition() {
    proptest!(|(
        n in 1usize..50,
        pairs in prop::collection::vec((0usize..50, 0usize..50), 0..60),
    )| {
        let mut uf = UnionFind::new(0..n);
        for (x, y) in pairs {
            if x < n && y < n {
                uf.union(x, y);
            }
        }

        let mut seen = HashSet::new();
        for (root, members) in uf.groups() {
            prop_assert!(members.contains(&root));
            for member in members {
                prop_assert!(seen.insert(member), "element {} in two groups", member);
            }
        }
        prop_assert_eq!(seen.len(), n);
    });
}

// ============================================================================
// Reading Order Properties
// ============================================================================

/// Property: the predicted order is a permutation with headers first and
/// footers last
#[test]
fn proptest_reading_order_permutation() {
    proptest!(|(items in prop::collection::vec((bbox_strategy(), label_strategy()), 0..25))| {
        let elements: Vec<PageElement> = items
            .into_iter()
            .enumerate()
            .map(|(cid, (bbox, label))| PageElement {
                cid,
                bbox,
                text: String::new(),
                page_no: 0,
                label,
                page_width: 100.0,
                page_height: 100.0,
            })
            .collect();

        let ordered = ReadingOrderPredictor::default().predict_reading_order(&elements);
        prop_assert_eq!(ordered.len(), elements.len());

        let mut cids: Vec<usize> = ordered.iter().map(|e| e.cid).collect();
        let ranks: Vec<u8> = ordered.iter().map(|e| group_rank(&e.label)).collect();
        prop_assert!(ranks.windows(2).all(|w| w[0] <= w[1]));

        cids.sort_unstable();
        prop_assert_eq!(cids, (0..elements.len()).collect::<Vec<_>>());
    });
}

// ============================================================================
// Post-Processing Properties
// ============================================================================

/// Property: cells are unique and sorted, and regular clusters never overlap
/// beyond the merge threshold
#[test]
fn proptest_postprocess_invariants() {
    proptest!(ProptestConfig::with_cases(64), |(
        raw in prop::collection::vec((bbox_strategy(), label_strategy(), 0.5..1.0f64), 0..15),
        cell_boxes in prop::collection::vec(bbox_strategy(), 0..20),
    )| {
        let clusters: Vec<LayoutCluster> = raw
            .into_iter()
            .enumerate()
            .map(|(id, (bbox, label, conf))| LayoutCluster::new(id + 1, label, bbox, conf))
            .collect();
        let cells: Vec<TextCell> = cell_boxes
            .into_iter()
            .enumerate()
            .map(|(index, bbox)| TextCell::new(index, bbox, format!("cell{index}")))
            .collect();

        let postprocessor = LayoutPostprocessor::default();
        let output = postprocessor.postprocess(
            &PageGeometry::new(100.0, 100.0),
            &cells,
            clusters,
            &PostprocessOptions::default(),
        );

        for cluster in &output.clusters {
            let indices: Vec<usize> = cluster.cells.iter().map(|c| c.index).collect();
            prop_assert!(indices.windows(2).all(|w| w[0] < w[1]), "cells {:?}", indices);
        }

        let regular: Vec<&LayoutCluster> = output
            .clusters
            .iter()
            .filter(|c| !c.label.is_special())
            .collect();
        for (i, a) in regular.iter().enumerate() {
            for b in &regular[i + 1..] {
                prop_assert!(a.bbox.intersection_over_union(&b.bbox) <= 0.8);
            }
        }

        prop_assert_eq!(output.cells.len(), cells.len());
    });
}

/// Property: feeding the output back in with cell assignment skipped keeps
/// the clusters and their cells
#[test]
fn proptest_postprocess_idempotent() {
    proptest!(ProptestConfig::with_cases(64), |(
        raw in prop::collection::vec((bbox_strategy(), label_strategy(), 0.5..1.0f64), 0..15),
        cell_boxes in prop::collection::vec(bbox_strategy(), 0..20),
    )| {
        let clusters: Vec<LayoutCluster> = raw
            .into_iter()
            .enumerate()
            .map(|(id, (bbox, label, conf))| LayoutCluster::new(id + 1, label, bbox, conf))
            .collect();
        let cells: Vec<TextCell> = cell_boxes
            .into_iter()
            .enumerate()
            .map(|(index, bbox)| TextCell::new(index, bbox, format!("cell{index}")))
            .collect();
        let page = PageGeometry::new(100.0, 100.0);
        let postprocessor = LayoutPostprocessor::default();

        let first =
            postprocessor.postprocess(&page, &cells, clusters, &PostprocessOptions::default());
        let options = PostprocessOptions {
            skip_cell_assignment: true,
            ..PostprocessOptions::default()
        };
        let second = postprocessor.postprocess(&page, &cells, first.clusters.clone(), &options);

        let cell_lists = |clusters: &[LayoutCluster]| -> Vec<Vec<usize>> {
            clusters
                .iter()
                .map(|c| c.cells.iter().map(|cell| cell.index).collect())
                .collect()
        };
        prop_assert_eq!(first.clusters.len(), second.clusters.len());
        prop_assert_eq!(cell_lists(&first.clusters), cell_lists(&second.clusters));
    });
}
