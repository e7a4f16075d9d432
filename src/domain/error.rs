//! Domain validation errors.
//!
//! Returned when text from an external source (storage, exchange payloads)
//! does not map onto a domain value.

use thiserror::Error;

/// Errors that occur when domain invariants are violated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A string did not name any variant of the expected enum.
    #[error("unknown {kind}: '{value}'")]
    UnknownVariant {
        /// Name of the enum being parsed.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },
}
