//! # Ledger Persistence Contract
//!
//! A [`LedgerBackend`] stores sealed blocks and answers lookups over them.
//! The store above it owns chain construction; backends own durability.
//!
//! ## Contracts
//!
//! - `append` is compare-and-append: it succeeds only if the persisted tip
//!   is still `expected_tip` and the block's index is exactly one past it.
//!   A lost race surfaces as [`LedgerError::TipMoved`], never as a fork.
//! - Once `append` returns `Ok`, the block is visible to every subsequent
//!   read on the same backend.
//! - `all` and `find` return blocks in ascending index order.
//! - Backends never modify or delete a persisted block.

use std::future::Future;

use medchain_core::Block;

use crate::error::LedgerError;
use crate::query::BlockQuery;

mod file;
mod memory;

pub use file::{FileBackend, LEDGER_FILE};
pub use memory::MemoryBackend;

/// Durable storage for an append-only sequence of sealed blocks.
pub trait LedgerBackend: Send + Sync + 'static {
    /// The highest-index persisted block, or `None` for an empty chain.
    fn tip(&self) -> impl Future<Output = Result<Option<Block>, LedgerError>> + Send;

    /// Every persisted block, ascending by index.
    fn all(&self) -> impl Future<Output = Result<Vec<Block>, LedgerError>> + Send;

    /// The block at `index`, if any.
    fn get(&self, index: u64) -> impl Future<Output = Result<Option<Block>, LedgerError>> + Send;

    /// Blocks matching `query`, ascending by index.
    fn find(
        &self,
        query: &BlockQuery,
    ) -> impl Future<Output = Result<Vec<Block>, LedgerError>> + Send;

    /// Persist `block` iff the current tip index equals `expected_tip`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::TipMoved`] if another writer extended the chain.
    /// - [`LedgerError::NonContiguous`] if `block.index` is not
    ///   `expected_tip + 1` (or `1` for an empty chain).
    /// - [`LedgerError::Unavailable`] / [`LedgerError::Io`] if the write
    ///   could not be made durable. The block is then not persisted.
    fn append(
        &self,
        expected_tip: Option<u64>,
        block: Block,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send;
}

/// Shared compare-and-append precondition check.
pub(crate) fn check_append(
    expected_tip: Option<u64>,
    actual_tip: Option<u64>,
    block: &Block,
) -> Result<(), LedgerError> {
    if expected_tip != actual_tip {
        return Err(LedgerError::TipMoved {
            expected: expected_tip,
            actual: actual_tip,
        });
    }
    let expected_next = actual_tip.map_or(1, |i| i + 1);
    if block.index != expected_next {
        return Err(LedgerError::NonContiguous {
            expected_next,
            actual: block.index,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use medchain_core::{PayloadDraft, Timestamp};

    fn block(index: u64) -> Block {
        let ts = Timestamp::from_millis(index as i64);
        Block::seal(index, "0", ts, PayloadDraft::new("o", "n", "d").into_payload(ts)).unwrap()
    }

    #[test]
    fn first_block_must_be_index_one() {
        assert!(check_append(None, None, &block(1)).is_ok());
        assert!(matches!(
            check_append(None, None, &block(2)),
            Err(LedgerError::NonContiguous { expected_next: 1, actual: 2 })
        ));
    }

    #[test]
    fn stale_tip_is_rejected_before_index_check() {
        assert!(matches!(
            check_append(Some(1), Some(2), &block(2)),
            Err(LedgerError::TipMoved { expected: Some(1), actual: Some(2) })
        ));
    }

    #[test]
    fn gap_is_rejected() {
        assert!(matches!(
            check_append(Some(3), Some(3), &block(5)),
            Err(LedgerError::NonContiguous { expected_next: 4, actual: 5 })
        ));
    }
}
