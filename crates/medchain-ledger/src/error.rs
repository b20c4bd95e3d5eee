//! # Ledger Error Types
//!
//! Not-found is never an error here: lookups return `Option`/empty `Vec`.
//! Integrity violations are never errors either; they are reported as data
//! by [`crate::verify::verify_chain`]. What remains are failures of the
//! persistence or content-store contracts and rejected append input.

use medchain_core::{CanonicalizationError, ValidationError};
use thiserror::Error;

/// Errors from the ledger store and its persistence backends.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The persistence layer is not reachable or not ready.
    #[error("ledger persistence unavailable: {0}")]
    Unavailable(String),

    /// Append input failed validation; nothing was digested or written.
    #[error("invalid append input: {0}")]
    InvalidPayload(#[from] ValidationError),

    /// Compare-and-append lost: the persisted tip is not the one the block
    /// was built against.
    #[error("chain tip moved: expected {expected:?}, found {actual:?}")]
    TipMoved {
        /// Index the writer observed as the tip (`None` = empty chain).
        expected: Option<u64>,
        /// Index actually persisted as the tip.
        actual: Option<u64>,
    },

    /// The block handed to the backend does not directly follow its tip.
    #[error("block index {actual} does not follow the chain tip (expected {expected_next})")]
    NonContiguous {
        /// The only index the backend would accept.
        expected_next: u64,
        /// The index that was offered.
        actual: u64,
    },

    /// A persisted record could not be decoded.
    #[error("corrupt ledger record at line {line}: {reason}")]
    Corrupt {
        /// 1-based line number in the ledger file.
        line: usize,
        /// Decoder message.
        reason: String,
    },

    /// Canonicalization failure while computing a block digest.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// I/O error from a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LedgerError {
    /// Whether the failure means the store could not be reached at all,
    /// as opposed to a rejected or conflicting request.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}

/// Errors from the content store contract.
#[derive(Error, Debug)]
pub enum ContentError {
    /// No object with this identifier or name.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The identifier is not one this store could have issued.
    #[error("invalid object id: {0:?}")]
    InvalidId(String),

    /// The content store is not reachable or not ready.
    #[error("content store unavailable: {0}")]
    Unavailable(String),

    /// I/O error from a filesystem-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Object metadata could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the record/verify flows that span both stores.
#[derive(Error, Debug)]
pub enum IntegrityError {
    /// Ledger store failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Content store failure.
    #[error(transparent)]
    Content(#[from] ContentError),

    /// Request rejected before touching either store.
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
}

/// Errors while loading configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable holds an unusable value.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}
