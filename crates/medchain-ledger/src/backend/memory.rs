//! In-memory ledger backend.
//!
//! Blocks live in a `parking_lot::RwLock<Vec<Block>>`. Lock guards are never
//! held across an await point. Used by tests and ephemeral tooling; nothing
//! survives the process.

use std::sync::atomic::{AtomicBool, Ordering};

use medchain_core::Block;
use parking_lot::RwLock;

use super::{check_append, LedgerBackend};
use crate::error::LedgerError;
use crate::query::BlockQuery;

/// Volatile backend holding the chain in a vector.
#[derive(Debug)]
pub struct MemoryBackend {
    blocks: RwLock<Vec<Block>>,
    available: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// An empty chain.
    pub fn new() -> Self {
        Self::with_blocks(Vec::new())
    }

    /// Start from an existing block sequence, e.g. an export loaded for
    /// offline verification. The blocks are stored as given, unchecked.
    pub fn with_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks: RwLock::new(blocks),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the persistence layer going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Overwrite a stored block in place, bypassing every check. Only for
    /// exercising tamper detection.
    pub fn tamper<F: FnOnce(&mut Block)>(&self, index: u64, f: F) -> bool {
        let mut blocks = self.blocks.write();
        match blocks.iter_mut().find(|b| b.index == index) {
            Some(block) => {
                f(block);
                true
            }
            None => false,
        }
    }

    fn ensure_available(&self) -> Result<(), LedgerError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LedgerError::Unavailable("memory backend offline".into()))
        }
    }
}

impl LedgerBackend for MemoryBackend {
    async fn tip(&self) -> Result<Option<Block>, LedgerError> {
        self.ensure_available()?;
        Ok(self.blocks.read().iter().max_by_key(|b| b.index).cloned())
    }

    async fn all(&self) -> Result<Vec<Block>, LedgerError> {
        self.ensure_available()?;
        let mut blocks = self.blocks.read().clone();
        blocks.sort_by_key(|b| b.index);
        Ok(blocks)
    }

    async fn get(&self, index: u64) -> Result<Option<Block>, LedgerError> {
        self.ensure_available()?;
        Ok(self.blocks.read().iter().find(|b| b.index == index).cloned())
    }

    async fn find(&self, query: &BlockQuery) -> Result<Vec<Block>, LedgerError> {
        self.ensure_available()?;
        let mut found: Vec<Block> = self
            .blocks
            .read()
            .iter()
            .filter(|b| query.matches(b))
            .cloned()
            .collect();
        found.sort_by_key(|b| b.index);
        Ok(found)
    }

    async fn append(&self, expected_tip: Option<u64>, block: Block) -> Result<(), LedgerError> {
        self.ensure_available()?;
        let mut blocks = self.blocks.write();
        let actual_tip = blocks.iter().map(|b| b.index).max();
        check_append(expected_tip, actual_tip, &block)?;
        blocks.push(block);
        Ok(())
    }
}
