//! # Block Data Model
//!
//! A [`Block`] is one immutable ledger entry binding a stored object's
//! content digest to its position in the hash-linked chain. The
//! [`BlockPayload`] is the descriptive record for that object.
//!
//! ## Wire Shape
//!
//! Field names are camelCase. Optional `subjectId` is omitted when absent;
//! `labels`, `tags` and `metadata` are always present. Labels and tags are
//! ordered sets and metadata is a sorted map, so two logically equal
//! payloads always serialize, and therefore digest, identically.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::digest::{block_digest, ContentDigest};
use crate::error::{CanonicalizationError, ValidationError};
use crate::temporal::Timestamp;

/// The `prevDigest` value carried by the genesis block.
pub const GENESIS_PREV_DIGEST: &str = "0";

/// Metadata key holding the record classification used by search.
pub const RECORD_TYPE_KEY: &str = "recordType";

/// A primitive value in the open metadata map.
///
/// Floats are deliberately unrepresentable: they have no single canonical
/// text form, and a float in the digest input would make blocks
/// unverifiable by another implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// JSON `null`.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Integer(i64),
    /// UTF-8 text.
    Text(String),
}

impl MetadataValue {
    /// The text content, if this is a `Text` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Descriptive record bound to one stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPayload {
    /// Identifier resolvable by the content store.
    pub object_id: String,
    /// Human-readable stored name (typically upload-time prefixed).
    pub object_name: String,
    /// Hex SHA-256 of the object's raw bytes at append time.
    pub content_digest: String,
    /// Time of append.
    pub created_at: Timestamp,
    /// Owner / patient the record belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    /// Free-form labels.
    #[serde(default)]
    pub labels: BTreeSet<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Open classification map (record type, clinician, clinic, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl BlockPayload {
    /// The `recordType` metadata entry, when it is text.
    pub fn record_type(&self) -> Option<&str> {
        self.metadata.get(RECORD_TYPE_KEY).and_then(MetadataValue::as_str)
    }

    /// Whether the payload carries the given label.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    /// Whether the payload carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Append input: a payload without its created-at time.
///
/// `created_at` may be pinned by the caller; when left `None` the ledger
/// fills it with the block timestamp at append.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadDraft {
    /// Identifier resolvable by the content store.
    pub object_id: String,
    /// Human-readable stored name.
    pub object_name: String,
    /// Hex SHA-256 of the object's raw bytes.
    pub content_digest: String,
    /// Explicit creation time; defaults to the block timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    /// Owner / patient the record belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    /// Free-form labels.
    #[serde(default)]
    pub labels: BTreeSet<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Open classification map.
    #[serde(default)]
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl PayloadDraft {
    /// Start a draft with the three required fields.
    pub fn new(
        object_id: impl Into<String>,
        object_name: impl Into<String>,
        content_digest: impl Into<String>,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            object_name: object_name.into(),
            content_digest: content_digest.into(),
            ..Self::default()
        }
    }

    /// Set the subject (patient) identifier.
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

    /// Pin the payload's created-at time.
    pub fn with_created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Check that the required fields are present and collections hold no
    /// empty entries.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found, in field order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("objectId", &self.object_id),
            ("objectName", &self.object_name),
            ("contentDigest", &self.content_digest),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField { field });
            }
        }
        if let Some(subject) = &self.subject_id {
            if subject.trim().is_empty() {
                return Err(ValidationError::MissingField { field: "subjectId" });
            }
        }
        if self.labels.iter().any(|l| l.trim().is_empty()) {
            return Err(ValidationError::EmptyEntry { field: "labels" });
        }
        if self.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(ValidationError::EmptyEntry { field: "tags" });
        }
        Ok(())
    }

    /// Seal the draft into a payload, using `fallback_created_at` when no
    /// explicit creation time was pinned.
    pub fn into_payload(self, fallback_created_at: Timestamp) -> BlockPayload {
        BlockPayload {
            object_id: self.object_id,
            object_name: self.object_name,
            content_digest: self.content_digest,
            created_at: self.created_at.unwrap_or(fallback_created_at),
            subject_id: self.subject_id,
            labels: self.labels,
            tags: self.tags,
            metadata: self.metadata,
        }
    }
}

/// One immutable, ordered ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// 1-based position in the chain.
    pub index: u64,
    /// When the block was appended.
    pub timestamp: Timestamp,
    /// The object record.
    pub payload: BlockPayload,
    /// Digest of the preceding block, or `"0"` for genesis.
    pub prev_digest: String,
    /// This block's own digest.
    pub digest: String,
}

impl Block {
    /// Build a block and compute its digest.
    ///
    /// # Errors
    ///
    /// Propagates `CanonicalizationError` from the digest engine.
    pub fn seal(
        index: u64,
        prev_digest: impl Into<String>,
        timestamp: Timestamp,
        payload: BlockPayload,
    ) -> Result<Self, CanonicalizationError> {
        let prev_digest = prev_digest.into();
        let digest = block_digest(index, &prev_digest, timestamp, &payload)?.to_hex();
        Ok(Self {
            index,
            timestamp,
            payload,
            prev_digest,
            digest,
        })
    }

    /// Recompute the digest from this block's own fields.
    pub fn recompute_digest(&self) -> Result<ContentDigest, CanonicalizationError> {
        block_digest(self.index, &self.prev_digest, self.timestamp, &self.payload)
    }

    /// Whether `prev_digest` is the genesis sentinel.
    pub fn links_to_genesis(&self) -> bool {
        self.prev_digest == GENESIS_PREV_DIGEST
    }
}
