#![deny(missing_docs)]

//! # medchain-core — Digest Engine and Block Model
//!
//! This crate is the leaf of the medchain workspace. It defines the types
//! every ledger component shares and the pure digest functions that make
//! the chain tamper-evident. It depends on nothing internal and performs no
//! I/O.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` is the sole path to block digests.** Block digests
//!    are computed over RFC 8785 canonical JSON, never over an ad-hoc
//!    serialization, so a block written by one implementation verifies in
//!    any other.
//!
//! 2. **Raw object bytes are hashed as-is.** [`content_digest()`] and
//!    [`Sha256Accumulator`] agree for every chunking of the same input.
//!
//! 3. **Floats are unrepresentable in payloads.** [`MetadataValue`] admits
//!    null, bool, integer and text only.
//!
//! 4. **Millisecond integer timestamps.** [`Timestamp`] serializes as a bare
//!    integer; there is one wire form per instant.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `medchain-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod block;
pub mod canonical;
pub mod digest;
pub mod error;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use block::{
    Block, BlockPayload, MetadataValue, PayloadDraft, GENESIS_PREV_DIGEST, RECORD_TYPE_KEY,
};
pub use canonical::CanonicalBytes;
pub use digest::{
    block_digest, block_digest_input, content_digest, sha256_digest, ContentDigest,
    Sha256Accumulator,
};
pub use error::{CanonicalizationError, CoreError, DigestParseError, ValidationError};
pub use temporal::Timestamp;
