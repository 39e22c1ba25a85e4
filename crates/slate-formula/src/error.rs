//! Formula error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula parsing or evaluation
///
/// These stay internal to the engine until the display boundary, where they
/// all collapse into the `#ERROR` sentinel string. Reference faults do not
/// appear here: an unresolved cell coerces to `0` during resolution.
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Formula evaluation error
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Name outside the allow-list (not a function, constant, or reference)
    #[error("Unknown name: {0}")]
    UnknownName(String),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Circular reference through the named cell
    #[error("Circular reference involving {0}")]
    CircularReference(String),
}
