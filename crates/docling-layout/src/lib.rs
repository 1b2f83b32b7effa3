//! # Docling Layout - Page Layout Post-Processing and Reading Order
//!
//! Cleans up the raw output of a document layout detector and arranges the
//! result in natural reading order.
//!
//! ## Quick Start
//!
//! ```
//! use docling_layout::{
//!     BoundingBox, DocItemLabel, LayoutCluster, LayoutConfig, LayoutPipeline, PageGeometry,
//!     PageInput, TextCell,
//! };
//!
//! let pipeline = LayoutPipeline::new(LayoutConfig::default())?;
//!
//! let page = PageInput {
//!     page_no: 0,
//!     geometry: PageGeometry::new(612.0, 792.0),
//!     cells: vec![TextCell::new(0, BoundingBox::new(72.0, 700.0, 540.0, 712.0), "Hello")],
//!     clusters: vec![LayoutCluster::new(
//!         1,
//!         DocItemLabel::Text,
//!         BoundingBox::new(70.0, 698.0, 542.0, 714.0),
//!         0.9,
//!     )],
//! };
//!
//! let layout = pipeline.process_page(page);
//! assert_eq!(layout.clusters.len(), 1);
//! assert_eq!(layout.clusters[0].text(), "Hello");
//! # Ok::<(), docling_layout::LayoutError>(())
//! ```
//!
//! ## Stages
//!
//! | Stage | Entry point |
//! |-------|-------------|
//! | **Post-processing** | [`LayoutPostprocessor::postprocess`] |
//! | **Reading order** | [`ReadingOrderPredictor::predict_reading_order`] |
//! | **Both, per page** | [`LayoutPipeline::process_page`] / [`LayoutPipeline::process_pages`] |
//!
//! All coordinates use a bottom-left origin: `b < t`, and "above" means a
//! larger `t`.

pub mod config;
pub mod error;
pub mod geometry;
pub mod layout_postprocessor;
pub mod page;
pub mod reading_order;
pub mod spatial;
pub mod types;
pub mod union_find;

pub use config::{
    LayoutConfig, OverlapParams, PostprocessOptions, PostprocessorConfig, ReadingOrderConfig,
};
pub use error::{LayoutError, Result};
pub use geometry::{BoundingBox, BoundingRectangle};
pub use layout_postprocessor::{
    sort_clusters, ClusterSortMode, LayoutPostprocessor, PostprocessOutput,
};
pub use page::{LayoutPipeline, PageInput, PageLayout};
pub use reading_order::ReadingOrderPredictor;
pub use spatial::{IntervalTree, SpatialIndex};
pub use types::{DocItemLabel, LayoutCluster, PageElement, PageGeometry, TextCell};
pub use union_find::UnionFind;
