#![deny(missing_docs)]

//! # medchain-ledger — Integrity Ledger Store
//!
//! An append-only, hash-linked sequence of blocks, each vouching for the
//! SHA-256 digest of one stored medical record. A client can later prove a
//! stored object has not changed since it was recorded, and an
//! administrator can prove no block has been edited, removed or reordered.
//!
//! ## Architecture
//!
//! ```text
//!  IntegrityService ──► ContentStore (MemoryContentStore | FsContentStore)
//!        │
//!        ▼
//!   LedgerStore ──► LedgerBackend (MemoryBackend | FileBackend)
//!        │
//!        ▼
//!   verify_chain / verify_block (pure, over any block sequence)
//! ```
//!
//! ## Key Design Principles
//!
//! 1. **Linearized appends.** The store serializes read-tip / seal / write
//!    within a process. The backend's compare-and-append rejects a block
//!    built on a stale tip; [`FileBackend`] runs that check under an
//!    exclusive OS lock on the ledger file against the tip on disk, so
//!    stores in separate processes sharing a directory cannot fork the chain.
//!
//! 2. **Integrity problems are data.** Verification returns a
//!    [`ChainReport`] listing every fault; it does not stop at the first
//!    and does not fail.
//!
//! 3. **Not found is not an error.** Lookups return `Option` or an empty
//!    `Vec`; a [`LedgerError`] always means the request could not be served.
//!
//! 4. **No repair.** Nothing in this crate rewrites or deletes a persisted
//!    block.
//!
//! ## Crate Policy
//!
//! - Depends only on `medchain-core` internally.
//! - `parking_lot` guards are never held across an `.await`.
//! - No `.unwrap()` or `.expect()` outside tests.

pub mod backend;
pub mod clock;
pub mod config;
pub mod content;
pub mod error;
pub mod integrity;
pub mod query;
pub mod store;
pub mod verify;

pub use backend::{FileBackend, LedgerBackend, MemoryBackend, LEDGER_FILE};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LedgerConfig;
pub use content::{ContentStore, FsContentStore, MemoryContentStore, ObjectId, ObjectInfo};
pub use error::{ConfigError, ContentError, IntegrityError, LedgerError};
pub use integrity::{IntegrityService, ObjectVerification, RecordReceipt, RecordRequest};
pub use query::{BlockQuery, SearchFilters};
pub use store::LedgerStore;
pub use verify::{verify_block, verify_chain, ChainFault, ChainReport};
