//! Shared parse error for the domain enums.

use thiserror::Error;

/// Error returned when a stored or user-supplied string does not name a
/// known variant of a domain enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {what}: '{value}'")]
pub struct ParseError {
    /// Which vocabulary the value failed to parse into.
    pub what: &'static str,
    /// The offending value.
    pub value: String,
}

impl ParseError {
    /// Creates a parse error for the given vocabulary and value.
    #[must_use]
    pub fn new(what: &'static str, value: impl Into<String>) -> Self {
        Self {
            what,
            value: value.into(),
        }
    }
}
