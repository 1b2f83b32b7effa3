//! Page model consumed and produced by the layout stages
//!
//! Cells and raw clusters come from upstream collaborators (PDF parser, OCR,
//! layout model); clusters and page elements flow to downstream exporters.

use crate::geometry::{BoundingBox, BoundingRectangle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Layout label vocabulary
///
/// Labels outside the known vocabulary are preserved verbatim in
/// [`DocItemLabel::Other`]; they are treated as regular clusters with a
/// confidence threshold of 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DocItemLabel {
    /// Caption for figures, tables, or other elements
    Caption,
    /// Footnote or endnote text
    Footnote,
    /// Mathematical formula or equation
    Formula,
    /// Item in a bulleted or numbered list
    ListItem,
    /// Running footer at bottom of page
    PageFooter,
    /// Running header at top of page
    PageHeader,
    /// Raster image, photograph or diagram
    Picture,
    /// Section or chapter heading
    SectionHeader,
    /// Tabular data structure
    Table,
    /// Regular body text paragraph
    #[default]
    Text,
    /// Document or section title
    Title,
    /// Source code or preformatted text
    Code,
    /// Checked/selected checkbox
    CheckboxSelected,
    /// Unchecked/unselected checkbox
    CheckboxUnselected,
    /// Form field or input area
    Form,
    /// Key-value pair region (e.g., form labels)
    KeyValueRegion,
    /// Table of contents or index
    DocumentIndex,
    /// Any label the vocabulary does not know
    Other(String),
}

impl DocItemLabel {
    /// Canonical snake_case name
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Caption => "caption",
            Self::Footnote => "footnote",
            Self::Formula => "formula",
            Self::ListItem => "list_item",
            Self::PageFooter => "page_footer",
            Self::PageHeader => "page_header",
            Self::Picture => "picture",
            Self::SectionHeader => "section_header",
            Self::Table => "table",
            Self::Text => "text",
            Self::Title => "title",
            Self::Code => "code",
            Self::CheckboxSelected => "checkbox_selected",
            Self::CheckboxUnselected => "checkbox_unselected",
            Self::Form => "form",
            Self::KeyValueRegion => "key_value_region",
            Self::DocumentIndex => "document_index",
            Self::Other(name) => name,
        }
    }

    /// Wrapper labels may absorb regular clusters as children
    #[inline]
    #[must_use]
    pub const fn is_wrapper(&self) -> bool {
        matches!(
            self,
            Self::Form | Self::KeyValueRegion | Self::Table | Self::DocumentIndex
        )
    }

    /// Special labels: wrappers plus `picture`
    #[inline]
    #[must_use]
    pub const fn is_special(&self) -> bool {
        self.is_wrapper() || matches!(self, Self::Picture)
    }
}

impl From<&str> for DocItemLabel {
    /// Accepts canonical names as well as the display names emitted by
    /// layout models (`"Section-header"`, `"Key-Value Region"`, ...)
    fn from(name: &str) -> Self {
        let normalized: String = name
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        match normalized.as_str() {
            "caption" => Self::Caption,
            "footnote" => Self::Footnote,
            "formula" => Self::Formula,
            "list_item" => Self::ListItem,
            "page_footer" => Self::PageFooter,
            "page_header" => Self::PageHeader,
            "picture" => Self::Picture,
            "section_header" => Self::SectionHeader,
            "table" => Self::Table,
            "text" => Self::Text,
            "title" => Self::Title,
            "code" => Self::Code,
            "checkbox_selected" => Self::CheckboxSelected,
            "checkbox_unselected" => Self::CheckboxUnselected,
            "form" => Self::Form,
            "key_value_region" => Self::KeyValueRegion,
            "document_index" => Self::DocumentIndex,
            _ => Self::Other(name.to_string()),
        }
    }
}

impl From<String> for DocItemLabel {
    #[inline]
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<DocItemLabel> for String {
    #[inline]
    fn from(label: DocItemLabel) -> Self {
        match label {
            DocItemLabel::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for DocItemLabel {
    type Err = std::convert::Infallible;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for DocItemLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text cell produced by the PDF parser or OCR
///
/// Cells are read-only to the layout stages: they are copied into clusters
/// but never modified or deleted. `index` is unique within a page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextCell {
    /// Stable index of the cell within its page
    pub index: usize,
    /// Cell rectangle (four corners, BOTTOMLEFT origin)
    pub rect: BoundingRectangle,
    pub text: String,
    /// Recognition confidence (1.0 for programmatic text)
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub from_ocr: bool,
    #[serde(default)]
    pub font_name: String,
    #[serde(default)]
    pub font_key: String,
}

#[inline]
const fn default_confidence() -> f64 {
    1.0
}

impl TextCell {
    /// Create a programmatic (non-OCR) cell from an axis-aligned box
    #[must_use]
    pub fn new(index: usize, bbox: BoundingBox, text: impl Into<String>) -> Self {
        Self {
            index,
            rect: BoundingRectangle::from_bbox(bbox),
            text: text.into(),
            confidence: 1.0,
            ..Self::default()
        }
    }

    /// Axis-aligned envelope of the cell rectangle
    #[inline]
    #[must_use]
    pub fn bbox(&self) -> BoundingBox {
        self.rect.to_bbox()
    }

    /// Whether the cell carries no visible text
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Labeled, confidence-scored layout region
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutCluster {
    /// Caller-assigned unique id
    pub id: usize,
    pub label: DocItemLabel,
    pub bbox: BoundingBox,
    /// Model confidence in `[0, 1]`
    pub confidence: f64,
    /// Assigned cells, sorted by `index` without duplicates
    #[serde(default)]
    pub cells: Vec<TextCell>,
    /// Absorbed regular clusters (wrapper labels only, one level deep)
    #[serde(default)]
    pub children: Vec<LayoutCluster>,
}

impl LayoutCluster {
    /// Raw cluster proposal without cells or children
    #[must_use]
    pub fn new(id: usize, label: DocItemLabel, bbox: BoundingBox, confidence: f64) -> Self {
        Self {
            id,
            label,
            bbox,
            confidence,
            cells: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Smallest cell index in the cluster, `None` when it has no cells
    #[inline]
    #[must_use]
    pub fn min_cell_index(&self) -> Option<usize> {
        self.cells.iter().map(|cell| cell.index).min()
    }

    /// Text of the cells joined by single spaces
    #[must_use]
    pub fn text(&self) -> String {
        self.cells
            .iter()
            .map(|cell| cell.text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Page rectangle as reported by the parser
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PageGeometry {
    /// Rotation angle in degrees
    #[serde(default)]
    pub angle: f64,
    pub rect: BoundingRectangle,
}

impl PageGeometry {
    /// Upright page of the given size with its origin at `(0, 0)`
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self {
            angle: 0.0,
            rect: BoundingRectangle::from_bbox(BoundingBox::new(0.0, 0.0, width, height)),
        }
    }

    #[inline]
    #[must_use]
    pub fn bbox(&self) -> BoundingBox {
        self.rect.to_bbox()
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> f64 {
        self.bbox().width()
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> f64 {
        self.bbox().height()
    }

    #[inline]
    #[must_use]
    pub fn area(&self) -> f64 {
        self.bbox().area()
    }
}

/// Element handed to the reading order predictor
///
/// `cid` is the position of the element in the caller's original array; the
/// predictor reorders elements but never rewrites their geometry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageElement {
    pub cid: usize,
    pub bbox: BoundingBox,
    #[serde(default)]
    pub text: String,
    pub page_no: usize,
    pub label: DocItemLabel,
    pub page_width: f64,
    pub page_height: f64,
}

impl PageElement {
    /// Element for a post-processed cluster
    #[must_use]
    pub fn from_cluster(
        cid: usize,
        cluster: &LayoutCluster,
        page_no: usize,
        page: &PageGeometry,
    ) -> Self {
        Self {
            cid,
            bbox: cluster.bbox,
            text: cluster.text(),
            page_no,
            label: cluster.label.clone(),
            page_width: page.width(),
            page_height: page.height(),
        }
    }

    /// Element for a bare text cell, labeled `text`
    #[must_use]
    pub fn from_cell(cid: usize, cell: &TextCell, page_no: usize, page: &PageGeometry) -> Self {
        Self {
            cid,
            bbox: cell.bbox(),
            text: cell.text.clone(),
            page_no,
            label: DocItemLabel::Text,
            page_width: page.width(),
            page_height: page.height(),
        }
    }
}
