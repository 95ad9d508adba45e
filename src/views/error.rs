//! View engine error types

use thiserror::Error;

/// Template loading and rendering errors
#[derive(Debug, Error)]
pub enum ViewError {
    /// Template is not embedded in the binary
    #[error("Template not found: {0}")]
    NotFound(String),

    /// Embedded template is not valid UTF-8
    #[error("Invalid template encoding: {0}")]
    InvalidEncoding(String),

    #[error("Template error: {0}")]
    TemplateError(String),
}
