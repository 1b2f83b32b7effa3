//! Configuration for the layout stages
//!
//! Every threshold the postprocessor and reading order predictor consult
//! lives in an explicit value passed in at construction, so callers can
//! override them per call. [`LayoutConfig`] groups all of them and can be
//! loaded from TOML:
//!
//! ```toml
//! [postprocessor]
//! min_cell_overlap = 0.25
//!
//! [postprocessor.confidence_thresholds]
//! table = 0.6
//!
//! [options]
//! create_orphan_clusters = false
//!
//! [reading_order]
//! horizontal_dilation_threshold_norm = 0.1
//! ```
//!
//! Missing sections and fields keep their defaults. Entries given under
//! `confidence_thresholds` or `label_remap` are merged over the default
//! tables, so naming one label leaves the others untouched.

use crate::error::{LayoutError, Result};
use crate::types::DocItemLabel;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Survivor selection thresholds for one family of clusters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlapParams {
    /// A peer whose area is at most this multiple of the candidate's can
    /// dominate it
    pub area_threshold: f64,
    /// Confidence margin a peer needs to dominate a candidate
    pub conf_threshold: f64,
}

impl OverlapParams {
    /// Regular (text-like) clusters
    pub const REGULAR: Self = Self {
        area_threshold: 1.3,
        conf_threshold: 0.05,
    };

    pub const PICTURE: Self = Self {
        area_threshold: 2.0,
        conf_threshold: 0.3,
    };

    /// `form`, `key_value_region`, `table` and `document_index` clusters
    pub const WRAPPER: Self = Self {
        area_threshold: 2.0,
        conf_threshold: 0.2,
    };
}

/// Thresholds and label tables for [`LayoutPostprocessor`]
///
/// [`LayoutPostprocessor`]: crate::layout_postprocessor::LayoutPostprocessor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostprocessorConfig {
    /// Minimum cell coverage for cell assignment (default: 0.2)
    pub min_cell_overlap: f64,
    /// Containment needed for a regular cluster to become a child of a
    /// special cluster (default: 0.8)
    pub child_containment_threshold: f64,
    /// `IoU` above which two clusters are merged (default: 0.8)
    pub overlap_threshold: f64,
    /// Containment in either direction above which two clusters are merged
    /// (default: 0.8)
    pub containment_threshold: f64,
    /// `list_item` beats `text` when their area ratio is within this
    /// distance of 1 (default: 0.2)
    pub list_item_area_similarity: f64,
    /// `code` beats a peer covered by it beyond this ratio (default: 0.8)
    pub code_containment_threshold: f64,
    /// Coverage of a `key_value_region` by a table that triggers arbitration
    /// (default: 0.9)
    pub kvr_table_overlap_threshold: f64,
    /// The table wins arbitration unless the region is at least this much
    /// more confident (default: 0.1)
    pub kvr_table_confidence_gap: f64,
    /// Pictures covering more than this fraction of the page are dropped
    /// (default: 0.9)
    pub full_page_picture_ratio: f64,
    /// Upper bound on bbox-tightening / overlap-merge rounds (default: 3)
    pub max_refinement_iterations: usize,
    pub regular: OverlapParams,
    pub picture: OverlapParams,
    pub wrapper: OverlapParams,
    /// Minimum confidence per label; labels not listed use 0.0
    #[serde(deserialize_with = "merge_confidence_thresholds")]
    pub confidence_thresholds: BTreeMap<DocItemLabel, f64>,
    /// Label rewrites applied to regular clusters after filtering; map a
    /// label to itself to disable a default rewrite
    #[serde(deserialize_with = "merge_label_remap")]
    pub label_remap: BTreeMap<DocItemLabel, DocItemLabel>,
}

fn merge_confidence_thresholds<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<DocItemLabel, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<DocItemLabel, f64>::deserialize(deserializer)?;
    let mut merged = PostprocessorConfig::default().confidence_thresholds;
    merged.extend(overrides);
    Ok(merged)
}

fn merge_label_remap<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<DocItemLabel, DocItemLabel>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<DocItemLabel, DocItemLabel>::deserialize(deserializer)?;
    let mut merged = PostprocessorConfig::default().label_remap;
    merged.extend(overrides);
    Ok(merged)
}

impl Default for PostprocessorConfig {
    fn default() -> Self {
        use DocItemLabel as L;

        let confidence_thresholds = [
            (L::Caption, 0.5),
            (L::Footnote, 0.5),
            (L::Formula, 0.5),
            (L::ListItem, 0.5),
            (L::PageFooter, 0.5),
            (L::PageHeader, 0.5),
            (L::Picture, 0.5),
            (L::SectionHeader, 0.45),
            (L::Table, 0.5),
            (L::Text, 0.5),
            (L::Title, 0.45),
            (L::Code, 0.45),
            (L::CheckboxSelected, 0.45),
            (L::CheckboxUnselected, 0.45),
            (L::Form, 0.45),
            (L::KeyValueRegion, 0.45),
            (L::DocumentIndex, 0.45),
        ]
        .into_iter()
        .collect();

        Self {
            confidence_thresholds,
            label_remap: BTreeMap::from([(L::Title, L::SectionHeader)]),
            min_cell_overlap: 0.2,
            child_containment_threshold: 0.8,
            overlap_threshold: 0.8,
            containment_threshold: 0.8,
            regular: OverlapParams::REGULAR,
            picture: OverlapParams::PICTURE,
            wrapper: OverlapParams::WRAPPER,
            list_item_area_similarity: 0.2,
            code_containment_threshold: 0.8,
            kvr_table_overlap_threshold: 0.9,
            kvr_table_confidence_gap: 0.1,
            full_page_picture_ratio: 0.9,
            max_refinement_iterations: 3,
        }
    }
}

impl PostprocessorConfig {
    /// Confidence threshold for a label (0.0 when not configured)
    #[inline]
    #[must_use]
    pub fn threshold_for(&self, label: &DocItemLabel) -> f64 {
        self.confidence_thresholds.get(label).copied().unwrap_or(0.0)
    }

    /// Label after applying the remap table
    #[inline]
    #[must_use]
    pub fn remap(&self, label: &DocItemLabel) -> DocItemLabel {
        self.label_remap
            .get(label)
            .unwrap_or(label)
            .clone()
    }

    /// Check that every threshold is finite and in range
    pub fn validate(&self) -> Result<()> {
        for (label, &value) in &self.confidence_thresholds {
            check_unit(&format!("postprocessor.confidence_thresholds.{label}"), value)?;
        }

        let ratios = [
            ("min_cell_overlap", self.min_cell_overlap),
            ("child_containment_threshold", self.child_containment_threshold),
            ("overlap_threshold", self.overlap_threshold),
            ("containment_threshold", self.containment_threshold),
            ("list_item_area_similarity", self.list_item_area_similarity),
            ("code_containment_threshold", self.code_containment_threshold),
            ("kvr_table_overlap_threshold", self.kvr_table_overlap_threshold),
            ("kvr_table_confidence_gap", self.kvr_table_confidence_gap),
            ("full_page_picture_ratio", self.full_page_picture_ratio),
        ];
        for (name, value) in ratios {
            check_unit(&format!("postprocessor.{name}"), value)?;
        }

        for (name, params) in [
            ("regular", self.regular),
            ("picture", self.picture),
            ("wrapper", self.wrapper),
        ] {
            if !params.area_threshold.is_finite() || params.area_threshold <= 0.0 {
                return Err(LayoutError::invalid(
                    format!("postprocessor.{name}.area_threshold"),
                    format!("must be a positive number, got {}", params.area_threshold),
                ));
            }
            check_unit(&format!("postprocessor.{name}.conf_threshold"), params.conf_threshold)?;
        }

        if self.max_refinement_iterations == 0 {
            return Err(LayoutError::invalid(
                "postprocessor.max_refinement_iterations",
                "must be at least 1",
            ));
        }

        Ok(())
    }
}

fn check_unit(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(LayoutError::invalid(
            field,
            format!("must be within [0, 1], got {value}"),
        ))
    }
}

/// Per-call switches for the postprocessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostprocessOptions {
    /// Keep the cells already attached to the clusters instead of assigning
    /// page cells
    pub skip_cell_assignment: bool,
    /// Keep regular clusters that end up without cells
    pub keep_empty_clusters: bool,
    /// Wrap unclaimed cells in singleton `text` clusters
    pub create_orphan_clusters: bool,
}

impl Default for PostprocessOptions {
    #[inline]
    fn default() -> Self {
        Self {
            skip_cell_assignment: false,
            keep_empty_clusters: false,
            create_orphan_clusters: true,
        }
    }
}

/// Configuration for the reading order predictor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingOrderConfig {
    /// Enable horizontal dilation of element bboxes
    pub dilated_page_element: bool,
    /// Horizontal dilation threshold (fraction of page width)
    pub horizontal_dilation_threshold_norm: f64,
}

impl Default for ReadingOrderConfig {
    #[inline]
    fn default() -> Self {
        Self {
            dilated_page_element: true,
            horizontal_dilation_threshold_norm: 0.15,
        }
    }
}

impl ReadingOrderConfig {
    pub fn validate(&self) -> Result<()> {
        check_unit(
            "reading_order.horizontal_dilation_threshold_norm",
            self.horizontal_dilation_threshold_norm,
        )
    }
}

/// Complete configuration for a [`LayoutPipeline`](crate::page::LayoutPipeline)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub postprocessor: PostprocessorConfig,
    pub options: PostprocessOptions,
    pub reading_order: ReadingOrderConfig,
}

impl LayoutConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LayoutError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded layout config from {}", path.display());
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        self.postprocessor.validate()?;
        self.reading_order.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = PostprocessorConfig::default();
        assert_eq!(config.threshold_for(&DocItemLabel::Text), 0.5);
        assert_eq!(config.threshold_for(&DocItemLabel::SectionHeader), 0.45);
        assert_eq!(
            config.threshold_for(&DocItemLabel::Other("marginalia".into())),
            0.0
        );
        assert_eq!(config.remap(&DocItemLabel::Title), DocItemLabel::SectionHeader);
        assert_eq!(config.remap(&DocItemLabel::Text), DocItemLabel::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LayoutConfig::from_toml_str(
            r#"
            [postprocessor]
            min_cell_overlap = 0.3

            [postprocessor.confidence_thresholds]
            table = 0.7

            [options]
            create_orphan_clusters = false
            "#,
        )
        .unwrap();

        assert_eq!(config.postprocessor.min_cell_overlap, 0.3);
        assert_eq!(config.postprocessor.threshold_for(&DocItemLabel::Table), 0.7);
        assert_eq!(config.postprocessor.threshold_for(&DocItemLabel::Text), 0.5);
        assert_eq!(config.postprocessor.threshold_for(&DocItemLabel::Form), 0.45);
        assert_eq!(config.postprocessor.regular, OverlapParams::REGULAR);
        assert!(!config.options.create_orphan_clusters);
        assert!(!config.options.skip_cell_assignment);
        assert_eq!(config.reading_order, ReadingOrderConfig::default());
    }

    #[test]
    fn test_label_remap_override_merges() {
        let config = LayoutConfig::from_toml_str(
            r#"
            [postprocessor.label_remap]
            checkbox_selected = "text"
            "#,
        )
        .unwrap();

        let postprocessor = &config.postprocessor;
        assert_eq!(postprocessor.remap(&DocItemLabel::CheckboxSelected), DocItemLabel::Text);
        assert_eq!(postprocessor.remap(&DocItemLabel::Title), DocItemLabel::SectionHeader);

        let toml = "[postprocessor.label_remap]\ntitle = \"title\"\n";
        let disabled = LayoutConfig::from_toml_str(toml).unwrap();
        assert_eq!(disabled.postprocessor.remap(&DocItemLabel::Title), DocItemLabel::Title);
    }

    #[test]
    fn test_toml_roundtrip_of_defaults() {
        let text = toml::to_string(&LayoutConfig::default()).unwrap();
        let parsed = LayoutConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, LayoutConfig::default());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = LayoutConfig::default();
        config.postprocessor.regular.area_threshold = 0.0;
        assert!(matches!(
            config.validate(),
            Err(LayoutError::InvalidConfig { field, .. })
                if field == "postprocessor.regular.area_threshold"
        ));

        let mut config = LayoutConfig::default();
        config.reading_order.horizontal_dilation_threshold_norm = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = LayoutConfig::default();
        config.postprocessor.max_refinement_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let err = LayoutConfig::from_toml_str("[postprocessor\n").unwrap_err();
        assert!(matches!(err, LayoutError::TomlError(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = LayoutConfig::from_file("/nonexistent/layout.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/layout.toml"));
    }
}
