//! # Integrity Service
//!
//! The two flows that tie the content store to the ledger.
//!
//! **Record.** Digest the uploaded bytes in memory, store them under an
//! upload-time-prefixed name, then append a block carrying the digest. The
//! digest is always taken from the bytes the caller handed over, never from
//! a read-back, so an eventually consistent store cannot substitute another
//! object.
//!
//! **Verify.** Re-read the stored bytes, recompute their digest and compare
//! it with the digest recorded in the ledger. The recorded block is itself
//! checked first: a block whose own digest fails cannot vouch for the
//! content digest it carries.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use medchain_core::{
    content_digest, Block, ContentDigest, MetadataValue, PayloadDraft, ValidationError,
};
use serde::Serialize;

use crate::backend::LedgerBackend;
use crate::content::{ContentStore, ObjectId};
use crate::error::{ContentError, IntegrityError};
use crate::store::LedgerStore;
use crate::verify;

/// Content type used when the caller supplies none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// An object to store and record.
#[derive(Debug, Clone, Default)]
pub struct RecordRequest {
    /// Original object name; the stored name gets a time prefix.
    pub name: String,
    /// Raw object bytes.
    pub bytes: Vec<u8>,
    /// MIME type.
    pub content_type: String,
    /// Owner / patient identifier.
    pub subject_id: Option<String>,
    /// Free-form labels.
    pub labels: BTreeSet<String>,
    /// Free-form tags.
    pub tags: BTreeSet<String>,
    /// Classification metadata.
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl RecordRequest {
    /// Request to record `bytes` under `name`.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            ..Self::default()
        }
    }

    /// Set the MIME type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Set the subject.
    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    /// Add a label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Set a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Result of a successful record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordReceipt {
    /// Identifier assigned by the content store.
    pub object_id: ObjectId,
    /// Name the object was stored under.
    pub stored_name: String,
    /// Byte count.
    pub size: u64,
    /// Digest of the uploaded bytes.
    pub content_digest: ContentDigest,
    /// The appended block.
    pub block: Block,
}

/// Outcome of checking a stored object against the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ObjectVerification {
    /// Current bytes match the recorded digest.
    Verified {
        /// The block vouching for the object.
        block: Block,
    },
    /// Current bytes differ from what was recorded.
    Modified {
        /// The block recorded for the object.
        block: Block,
        /// Digest of the current bytes.
        computed: ContentDigest,
    },
    /// The block recorded for the object fails its own digest check.
    BlockTampered {
        /// The self-inconsistent block.
        block: Block,
        /// Digest of the current bytes.
        computed: ContentDigest,
    },
    /// No block vouches for the current bytes.
    Unrecorded {
        /// Digest of the current bytes.
        computed: ContentDigest,
    },
}

impl ObjectVerification {
    /// Whether the object is intact and vouched for.
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }

    /// The block involved, if any.
    pub fn block(&self) -> Option<&Block> {
        match self {
            Self::Verified { block }
            | Self::Modified { block, .. }
            | Self::BlockTampered { block, .. } => Some(block),
            Self::Unrecorded { .. } => None,
        }
    }
}

/// Record and verify flows over one ledger and one content store.
#[derive(Debug)]
pub struct IntegrityService<B: LedgerBackend, C: ContentStore> {
    ledger: LedgerStore<B>,
    content: Arc<C>,
}

impl<B: LedgerBackend, C: ContentStore> Clone for IntegrityService<B, C> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            content: Arc::clone(&self.content),
        }
    }
}

impl<B: LedgerBackend, C: ContentStore> IntegrityService<B, C> {
    /// Combine a ledger with a content store.
    pub fn new(ledger: LedgerStore<B>, content: C) -> Self {
        Self {
            ledger,
            content: Arc::new(content),
        }
    }

    /// The ledger.
    pub fn ledger(&self) -> &LedgerStore<B> {
        &self.ledger
    }

    /// The content store.
    pub fn content(&self) -> &C {
        &self.content
    }

    /// Store an object and append a block vouching for its bytes.
    ///
    /// # Errors
    ///
    /// - [`IntegrityError::Validation`] for an empty name or malformed
    ///   annotations; nothing is stored.
    /// - Content store or ledger failures, propagated unchanged. If the
    ///   append fails after the bytes were stored, the object remains in the
    ///   content store unrecorded.
    pub async fn record_object(&self, request: RecordRequest) -> Result<RecordReceipt, IntegrityError> {
        let RecordRequest {
            name,
            bytes,
            content_type,
            subject_id,
            labels,
            tags,
            metadata,
        } = request;
        if name.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "objectName" }.into());
        }

        let digest = content_digest(&bytes);
        let stored_name = format!("{}-{}", self.ledger.now().as_millis(), name);

        let mut draft = PayloadDraft::new("pending", stored_name.clone(), digest.to_hex());
        draft.subject_id = subject_id;
        draft.labels = labels;
        draft.tags = tags;
        draft.metadata = metadata;
        draft.validate()?;

        let object_id = self
            .content
            .write_bytes(&stored_name, &bytes, &content_type)
            .await?;
        draft.object_id = object_id.to_string();

        let block = match self.ledger.append(draft).await {
            Ok(block) => block,
            Err(e) => {
                tracing::warn!(object_id = %object_id, error = %e, "object stored but not recorded");
                return Err(e.into());
            }
        };

        tracing::info!(
            object_id = %object_id,
            name = %stored_name,
            digest = %digest,
            index = block.index,
            "object recorded"
        );
        Ok(RecordReceipt {
            object_id,
            stored_name,
            size: bytes.len() as u64,
            content_digest: digest,
            block,
        })
    }

    /// Check a stored object against the block recorded for its id.
    pub async fn verify_object(&self, id: &ObjectId) -> Result<ObjectVerification, IntegrityError> {
        let computed = self.content.digest_object(id).await?;
        let outcome = match self.ledger.find_by_object_id(id.as_str()).await? {
            None => ObjectVerification::Unrecorded { computed },
            Some(block) => judge(block, computed),
        };
        log_outcome(id, &outcome);
        Ok(outcome)
    }

    /// Resolve `name` through the content store, then check the object's
    /// bytes against the block recording that object. Only an object with
    /// no block of its own is matched by content digest.
    ///
    /// # Errors
    ///
    /// [`ContentError::NotFound`] if no object has this name.
    pub async fn verify_object_by_name(&self, name: &str) -> Result<ObjectVerification, IntegrityError> {
        let info = self
            .content
            .find_by_name(name)
            .await?
            .ok_or_else(|| ContentError::NotFound(name.to_string()))?;
        let computed = self.content.digest_object(&info.id).await?;

        let outcome = match self.ledger.find_by_object_id(info.id.as_str()).await? {
            Some(block) => judge(block, computed),
            None => match self.ledger.find_by_content_digest(&computed.to_hex()).await? {
                Some(block) => judge(block, computed),
                None => ObjectVerification::Unrecorded { computed },
            },
        };
        log_outcome(&info.id, &outcome);
        Ok(outcome)
    }

    /// The first block recording exactly these bytes.
    pub async fn locate_by_bytes(&self, bytes: &[u8]) -> Result<Option<Block>, IntegrityError> {
        let digest = content_digest(bytes);
        Ok(self.ledger.find_by_content_digest(&digest.to_hex()).await?)
    }
}

fn judge(block: Block, computed: ContentDigest) -> ObjectVerification {
    if !verify::verify_block(&block) {
        ObjectVerification::BlockTampered { block, computed }
    } else if computed.matches_hex(&block.payload.content_digest) {
        ObjectVerification::Verified { block }
    } else {
        ObjectVerification::Modified { block, computed }
    }
}

fn log_outcome(id: &ObjectId, outcome: &ObjectVerification) {
    match outcome {
        ObjectVerification::Verified { block } => {
            tracing::info!(object_id = %id, index = block.index, "object verified");
        }
        ObjectVerification::Modified { block, computed } => {
            tracing::warn!(
                object_id = %id,
                index = block.index,
                recorded = %block.payload.content_digest,
                computed = %computed,
                "object modified since recording"
            );
        }
        ObjectVerification::BlockTampered { block, .. } => {
            tracing::warn!(object_id = %id, index = block.index, "recorded block fails its digest check");
        }
        ObjectVerification::Unrecorded { computed } => {
            tracing::warn!(object_id = %id, computed = %computed, "no block vouches for object");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::clock::ManualClock;
    use crate::content::MemoryContentStore;

    fn service() -> IntegrityService<MemoryBackend, MemoryContentStore> {
        let ledger =
            LedgerStore::with_clock(MemoryBackend::new(), Arc::new(ManualClock::new(1000, 1)));
        IntegrityService::new(ledger, MemoryContentStore::new())
    }

    #[tokio::test]
    async fn record_prefixes_name_and_digests_upload() {
        let svc = service();
        let receipt = svc
            .record_object(RecordRequest::new("a.txt", b"hello".to_vec()).with_subject("p1"))
            .await
            .unwrap();
        assert_eq!(receipt.stored_name, "1000-a.txt");
        assert_eq!(receipt.size, 5);
        assert_eq!(receipt.content_digest, content_digest(b"hello"));
        assert_eq!(receipt.block.payload.object_id, receipt.object_id.as_str());
        assert_eq!(receipt.block.payload.content_digest, receipt.content_digest.to_hex());
        assert_eq!(receipt.block.payload.subject_id.as_deref(), Some("p1"));
    }

    #[tokio::test]
    async fn empty_name_stores_nothing() {
        let svc = service();
        let err = svc.record_object(RecordRequest::new(" ", b"x".to_vec())).await.unwrap_err();
        assert!(matches!(err, IntegrityError::Validation(_)));
        assert!(svc.content().is_empty());
    }

    #[tokio::test]
    async fn empty_label_stores_nothing() {
        let svc = service();
        let err = svc
            .record_object(RecordRequest::new("a", b"x".to_vec()).with_label(""))
            .await
            .unwrap_err();
        assert!(matches!(err, IntegrityError::Validation(ValidationError::EmptyEntry { .. })));
        assert!(svc.content().is_empty());
    }

    #[tokio::test]
    async fn verify_detects_rewritten_bytes() {
        let svc = service();
        let receipt = svc.record_object(RecordRequest::new("a", b"one".to_vec())).await.unwrap();
        assert!(svc.verify_object(&receipt.object_id).await.unwrap().is_verified());

        svc.content().overwrite(&receipt.object_id, b"two".to_vec());
        match svc.verify_object(&receipt.object_id).await.unwrap() {
            ObjectVerification::Modified { block, computed } => {
                assert_eq!(block.index, 1);
                assert_eq!(computed, content_digest(b"two"));
            }
            other => panic!("expected Modified, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn verify_reports_tampered_block() {
        let svc = service();
        let receipt = svc.record_object(RecordRequest::new("a", b"one".to_vec())).await.unwrap();
        svc.ledger()
            .backend()
            .tamper(1, |b| b.payload.content_digest = content_digest(b"two").to_hex());
        svc.content().overwrite(&receipt.object_id, b"two".to_vec());
        let outcome = svc.verify_object(&receipt.object_id).await.unwrap();
        assert!(matches!(outcome, ObjectVerification::BlockTampered { .. }));
    }

    #[tokio::test]
    async fn unrecorded_object_is_reported() {
        let svc = service();
        let id = svc.content().write_bytes("stray", b"x", "text/plain").await.unwrap();
        let outcome = svc.verify_object(&id).await.unwrap();
        assert_eq!(outcome, ObjectVerification::Unrecorded { computed: content_digest(b"x") });
        assert!(outcome.block().is_none());
    }

    #[tokio::test]
    async fn verify_by_name_uses_stored_name() {
        let svc = service();
        let receipt = svc.record_object(RecordRequest::new("scan.png", b"img".to_vec())).await.unwrap();
        let outcome = svc.verify_object_by_name(&receipt.stored_name).await.unwrap();
        assert!(outcome.is_verified());

        svc.content().overwrite(&receipt.object_id, b"forged".to_vec());
        let outcome = svc.verify_object_by_name(&receipt.stored_name).await.unwrap();
        assert!(matches!(outcome, ObjectVerification::Modified { .. }));

        let err = svc.verify_object_by_name("scan.png").await.unwrap_err();
        assert!(matches!(err, IntegrityError::Content(ContentError::NotFound(_))));
    }

    #[tokio::test]
    async fn verify_by_name_judges_against_the_objects_own_block() {
        let svc = service();
        svc.record_object(RecordRequest::new("a.txt", b"AAAA".to_vec())).await.unwrap();
        let b = svc.record_object(RecordRequest::new("b.txt", b"BBBB".to_vec())).await.unwrap();

        // b now holds a's bytes, which another block vouches for.
        svc.content().overwrite(&b.object_id, b"AAAA".to_vec());
        match svc.verify_object_by_name(&b.stored_name).await.unwrap() {
            ObjectVerification::Modified { block, computed } => {
                assert_eq!(block.index, 2);
                assert_eq!(computed, content_digest(b"AAAA"));
            }
            other => panic!("expected Modified, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn locate_by_bytes_finds_recording_block() {
        let svc = service();
        svc.record_object(RecordRequest::new("a", b"alpha".to_vec())).await.unwrap();
        let found = svc.locate_by_bytes(b"alpha").await.unwrap().unwrap();
        assert_eq!(found.index, 1);
        assert!(svc.locate_by_bytes(b"beta").await.unwrap().is_none());
    }
}
