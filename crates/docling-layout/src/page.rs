//! Page-level pipeline: post-processing followed by reading order
//!
//! Each page is handled independently, so [`LayoutPipeline::process_pages`]
//! runs pages in parallel on the rayon thread pool.

use crate::config::LayoutConfig;
use crate::error::Result;
use crate::layout_postprocessor::LayoutPostprocessor;
use crate::reading_order::ReadingOrderPredictor;
use crate::types::{LayoutCluster, PageElement, PageGeometry, TextCell};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// One page as delivered by the parser and the layout model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageInput {
    pub page_no: usize,
    pub geometry: PageGeometry,
    #[serde(default)]
    pub cells: Vec<TextCell>,
    /// Raw cluster proposals
    #[serde(default)]
    pub clusters: Vec<LayoutCluster>,
}

/// Cleaned page layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_no: usize,
    pub geometry: PageGeometry,
    /// Final clusters in reading order
    pub clusters: Vec<LayoutCluster>,
    /// All page cells in reading order
    pub cells: Vec<TextCell>,
}

/// Post-processor and reading order predictor sharing one configuration
#[derive(Debug, Clone)]
pub struct LayoutPipeline {
    config: LayoutConfig,
    postprocessor: LayoutPostprocessor,
    predictor: ReadingOrderPredictor,
}

impl LayoutPipeline {
    /// Validate the configuration and build the pipeline
    pub fn new(config: LayoutConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            postprocessor: LayoutPostprocessor::new(config.postprocessor.clone()),
            predictor: ReadingOrderPredictor::new(config.reading_order),
            config,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Run both stages on one page
    #[must_use = "returns the processed page layout"]
    pub fn process_page(&self, page: PageInput) -> PageLayout {
        let PageInput {
            page_no,
            geometry,
            cells,
            clusters,
        } = page;

        let output =
            self.postprocessor
                .postprocess(&geometry, &cells, clusters, &self.config.options);

        let cluster_elements: Vec<PageElement> = output
            .clusters
            .iter()
            .enumerate()
            .map(|(cid, cluster)| PageElement::from_cluster(cid, cluster, page_no, &geometry))
            .collect();
        let clusters = reorder(output.clusters, &self.predictor.predict(&cluster_elements));

        let cell_elements: Vec<PageElement> = output
            .cells
            .iter()
            .enumerate()
            .map(|(cid, cell)| PageElement::from_cell(cid, cell, page_no, &geometry))
            .collect();
        let cells = reorder(output.cells, &self.predictor.predict(&cell_elements));

        debug!(
            "Page {}: {} clusters, {} cells in reading order",
            page_no,
            clusters.len(),
            cells.len()
        );

        PageLayout {
            page_no,
            geometry,
            clusters,
            cells,
        }
    }

    /// Run both stages on every page in parallel, results sorted by page
    #[must_use = "returns the processed page layouts"]
    pub fn process_pages(&self, pages: Vec<PageInput>) -> Vec<PageLayout> {
        let mut layouts: Vec<PageLayout> = pages
            .into_par_iter()
            .map(|page| self.process_page(page))
            .collect();
        layouts.sort_by_key(|layout| layout.page_no);
        layouts
    }
}

/// Arrange `items` in the given permutation of their positions
fn reorder<T>(items: Vec<T>, order: &[usize]) -> Vec<T> {
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    order.iter().filter_map(|&pos| slots.get_mut(pos)?.take()).collect()
}
