//! # Ledger Store
//!
//! Owns chain construction on top of a [`LedgerBackend`]: appends with
//! correct index and linkage, the query surface, and verification of the
//! persisted chain.
//!
//! ## Append ordering
//!
//! Appends are linearized twice. An in-process writer lock serializes the
//! read-tip / seal / write sequence for every clone of a store. The
//! backend's compare-and-append then rejects a block built against a stale
//! tip with [`LedgerError::TipMoved`]. Stores opened separately on one
//! directory (another process, or a second [`LedgerStore::open`]) share no
//! writer lock; [`FileBackend`] covers them by checking against the tip
//! persisted on disk while holding an exclusive lock on the ledger file.
//! The store never retries a rejected append.
//!
//! ## Cancellation
//!
//! Once the writer lock is acquired, the rest of the append runs on a
//! spawned task that owns the lock guard. Dropping the caller's future after
//! that point does not cancel the write; callers that time out must re-read
//! [`LedgerStore::last_block`] to learn whether the block landed.

use std::sync::Arc;

use medchain_core::{Block, PayloadDraft, Timestamp, GENESIS_PREV_DIGEST};
use tokio::sync::Mutex;

use crate::backend::{FileBackend, LedgerBackend};
use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::query::{BlockQuery, SearchFilters};
use crate::verify::{self, ChainReport};

/// The append-only, hash-linked block sequence.
#[derive(Debug)]
pub struct LedgerStore<B: LedgerBackend> {
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    append_lock: Arc<Mutex<()>>,
}

impl<B: LedgerBackend> Clone for LedgerStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            clock: Arc::clone(&self.clock),
            append_lock: Arc::clone(&self.append_lock),
        }
    }
}

impl LedgerStore<FileBackend> {
    /// Open the file-backed ledger described by `config`.
    pub async fn open(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let backend = FileBackend::open_with(config.ledger_dir(), config.sync_writes).await?;
        Ok(Self::new(backend))
    }
}

impl<B: LedgerBackend> LedgerStore<B> {
    /// A store over `backend` stamping blocks with the system clock.
    pub fn new(backend: B) -> Self {
        Self::with_clock(backend, Arc::new(SystemClock))
    }

    /// A store over `backend` stamping blocks with `clock`.
    pub fn with_clock(backend: B, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend: Arc::new(backend),
            clock,
            append_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The underlying persistence backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Current time according to the store's clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    // -- reads --------------------------------------------------------------

    /// The block with the highest index, or `None` for an empty chain.
    pub async fn last_block(&self) -> Result<Option<Block>, LedgerError> {
        self.backend.tip().await
    }

    /// Every block, ascending by index.
    pub async fn all_blocks(&self) -> Result<Vec<Block>, LedgerError> {
        self.backend.all().await
    }

    /// The block at `index`.
    pub async fn block_by_index(&self, index: u64) -> Result<Option<Block>, LedgerError> {
        self.backend.get(index).await
    }

    /// Index of the tip; the block count of a contiguous chain.
    pub async fn len(&self) -> Result<u64, LedgerError> {
        Ok(self.backend.tip().await?.map_or(0, |b| b.index))
    }

    /// Whether the chain has no blocks.
    pub async fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.backend.tip().await?.is_none())
    }

    /// First block recorded for `object_id`.
    pub async fn find_by_object_id(&self, object_id: &str) -> Result<Option<Block>, LedgerError> {
        self.first(BlockQuery::ObjectId(object_id.to_string())).await
    }

    /// First block recording `digest` as its content digest.
    pub async fn find_by_content_digest(&self, digest: &str) -> Result<Option<Block>, LedgerError> {
        self.first(BlockQuery::ContentDigest(digest.to_string())).await
    }

    /// Blocks for one subject, ascending by index.
    pub async fn find_by_subject(&self, subject_id: &str) -> Result<Vec<Block>, LedgerError> {
        self.backend.find(&BlockQuery::Subject(subject_id.to_string())).await
    }

    /// Blocks carrying `label`, ascending by index.
    pub async fn find_by_label(&self, label: &str) -> Result<Vec<Block>, LedgerError> {
        self.backend.find(&BlockQuery::Label(label.to_string())).await
    }

    /// Blocks carrying `tag`, ascending by index.
    pub async fn find_by_tag(&self, tag: &str) -> Result<Vec<Block>, LedgerError> {
        self.backend.find(&BlockQuery::Tag(tag.to_string())).await
    }

    /// Blocks matching every provided filter, ascending by index.
    pub async fn search(&self, filters: &SearchFilters) -> Result<Vec<Block>, LedgerError> {
        self.backend.find(&BlockQuery::Search(filters.clone())).await
    }

    async fn first(&self, query: BlockQuery) -> Result<Option<Block>, LedgerError> {
        Ok(self.backend.find(&query).await?.into_iter().next())
    }

    // -- append -------------------------------------------------------------

    /// Seal `draft` into the next block and persist it.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidPayload`] if the draft is malformed; nothing
    ///   is digested or written.
    /// - [`LedgerError::TipMoved`] if another writer extended the chain
    ///   between the tip read and the write.
    /// - Backend failures, propagated unchanged.
    pub async fn append(&self, draft: PayloadDraft) -> Result<Block, LedgerError> {
        draft.validate()?;

        let guard = Arc::clone(&self.append_lock).lock_owned().await;
        let backend = Arc::clone(&self.backend);
        let clock = Arc::clone(&self.clock);

        let task = tokio::spawn(async move {
            let _guard = guard;
            let tip = backend.tip().await?;
            let (index, prev_digest) = match &tip {
                Some(last) => (last.index + 1, last.digest.clone()),
                None => (1, GENESIS_PREV_DIGEST.to_string()),
            };
            let timestamp = clock.now();
            let block = Block::seal(index, prev_digest, timestamp, draft.into_payload(timestamp))?;
            backend.append(tip.map(|b| b.index), block.clone()).await?;
            Ok::<_, LedgerError>(block)
        });

        let block = task
            .await
            .map_err(|e| LedgerError::Unavailable(format!("append task aborted: {e}")))??;

        tracing::info!(
            index = block.index,
            digest = %block.digest,
            object_id = %block.payload.object_id,
            "block appended"
        );
        Ok(block)
    }

    // -- verification -------------------------------------------------------

    /// Recompute a block's own digest. Pure.
    pub fn verify_block(&self, block: &Block) -> bool {
        verify::verify_block(block)
    }

    /// Verify an arbitrary ordered block sequence. Pure.
    pub fn verify_chain(&self, blocks: &[Block]) -> ChainReport {
        verify::verify_chain(blocks)
    }

    /// Verify the persisted chain end to end.
    pub async fn verify(&self) -> Result<ChainReport, LedgerError> {
        let blocks = self.all_blocks().await?;
        let report = verify::verify_chain(&blocks);
        tracing::info!(
            blocks = blocks.len(),
            valid = report.valid,
            faults = report.errors.len(),
            "chain verified"
        );
        Ok(report)
    }
}
