//! # Error Hierarchy
//!
//! Structured error types for the digest engine and the block model, built
//! with `thiserror`. No `Box<dyn Error>`, no `.unwrap()` outside tests.

use thiserror::Error;

/// Top-level error type for `medchain-core`.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Canonicalization failure during digest computation.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// A payload or identifier failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A digest string could not be parsed.
    #[error("digest error: {0}")]
    Digest(#[from] DigestParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations; use string or integer: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed during canonicalization.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Validation errors for append input.
///
/// These are raised before any digest is computed or any write attempted,
/// and carry the offending field name so the caller can report it verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required payload field is missing or blank.
    #[error("required field \"{field}\" is missing or empty")]
    MissingField {
        /// The camelCase field name as it appears on the wire.
        field: &'static str,
    },

    /// A label or tag collection contains an empty entry.
    #[error("field \"{field}\" contains an empty entry")]
    EmptyEntry {
        /// The camelCase collection name.
        field: &'static str,
    },

    /// A timestamp is outside the representable range.
    #[error("invalid timestamp: {value} ({reason})")]
    InvalidTimestamp {
        /// The offending value, rendered for diagnostics.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Errors when parsing a hex-encoded SHA-256 digest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestParseError {
    /// The string is not exactly 64 characters long.
    #[error("expected 64 hex characters, got {0}")]
    InvalidLength(usize),

    /// The string contains a non-hex character.
    #[error("invalid hex character {ch:?} at position {position}")]
    InvalidCharacter {
        /// The offending character.
        ch: char,
        /// Its byte offset in the input.
        position: usize,
    },
}
