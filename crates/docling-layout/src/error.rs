//! Error types for layout configuration
//!
//! The layout algorithms themselves are total: malformed geometry, unknown
//! labels and empty inputs never fail. Errors only arise while building or
//! loading a [`LayoutConfig`](crate::config::LayoutConfig).
//!
//! # Examples
//!
//! ```
//! use docling_layout::{LayoutConfig, LayoutError};
//!
//! match LayoutConfig::from_toml_str("[postprocessor]\nmin_cell_overlap = 1.5\n") {
//!     Err(LayoutError::InvalidConfig { field, .. }) => {
//!         assert_eq!(field, "postprocessor.min_cell_overlap");
//!     }
//!     other => panic!("unexpected result: {other:?}"),
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building or loading a layout configuration
#[derive(Error, Debug)]
pub enum LayoutError {
    /// A configuration value is out of its valid range
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        /// Dotted path of the offending field (e.g. `postprocessor.min_cell_overlap`)
        field: String,
        reason: String,
    },

    /// The configuration text is not valid TOML for [`LayoutConfig`]
    ///
    /// [`LayoutConfig`]: crate::config::LayoutConfig
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Reading a configuration file failed
    #[error("IO error reading {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LayoutError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for layout operations
pub type Result<T> = std::result::Result<T, LayoutError>;
