//! Formula error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors raised by the formula API itself
///
/// Problems inside a formula are never reported this way: those are
/// [`tabula_core::CellError`] values or parse diagnostics.
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Formula text could not be parsed cleanly
    #[error("Parse error: {0}")]
    Parse(String),

    /// A reference handed to the API was not valid A1 text
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Error from core types
    #[error(transparent)]
    Core(#[from] tabula_core::Error),
}
