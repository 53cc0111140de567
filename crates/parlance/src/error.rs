//! Error types for the rendering core.
//!
//! Segmentation and chart detection never fail; these errors cover the
//! parts of the crate that touch the outside world: configuration files,
//! collaborating renderers and the approval workflow.

use thiserror::Error;

use crate::render::ExportFormat;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Unreadable or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by a chart renderer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RenderError {
    /// The renderer could not draw the spec.
    #[error("Chart rendering failed: {0}")]
    Chart(String),

    /// The renderer cannot produce this export format.
    #[error("Export format {0} is not supported by this renderer")]
    ExportUnsupported(ExportFormat),

    /// Export was requested before anything was rendered.
    #[error("Nothing has been rendered yet")]
    NothingRendered,

    /// I/O error while writing rendered output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejections from the approval workflow.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApprovalError {
    /// A decision for this call was already submitted.
    #[error("A decision was already submitted for tool call {0}")]
    AlreadyDecided(String),

    /// The tool call identifier was empty.
    #[error("Tool call id must not be empty")]
    EmptyId,
}
