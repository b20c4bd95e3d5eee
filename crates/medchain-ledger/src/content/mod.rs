//! # Content Store Contract
//!
//! The ledger's view of the object store that holds the records themselves.
//! The ledger writes an object once at record time and afterwards only reads
//! bytes back to recompute their digest. Object names are not unique; a
//! store-assigned [`ObjectId`] is the only stable handle.

use std::future::Future;

use medchain_core::{content_digest, ContentDigest, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::ContentError;

mod fs;
mod memory;

pub use fs::FsContentStore;
pub use memory::MemoryContentStore;

/// Store-assigned object identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Wrap an identifier issued by a store.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// What a store knows about one object besides its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    /// Store-assigned identifier.
    pub id: ObjectId,
    /// Name given at write time.
    pub name: String,
    /// MIME type given at write time.
    pub content_type: String,
    /// Size in bytes.
    pub size: u64,
    /// When the store accepted the object.
    pub uploaded_at: Timestamp,
}

/// Object storage addressed by store-assigned identifier.
pub trait ContentStore: Send + Sync + 'static {
    /// The full, exact contents of an object.
    ///
    /// # Errors
    ///
    /// [`ContentError::NotFound`] for an unknown id.
    fn read_bytes(&self, id: &ObjectId)
        -> impl Future<Output = Result<Vec<u8>, ContentError>> + Send;

    /// Store `bytes` under `name` and return the new object's identifier.
    fn write_bytes(
        &self,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> impl Future<Output = Result<ObjectId, ContentError>> + Send;

    /// The most recently written object with exactly this name.
    fn find_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<ObjectInfo>, ContentError>> + Send;

    /// Metadata for one object, if it exists.
    fn info(
        &self,
        id: &ObjectId,
    ) -> impl Future<Output = Result<Option<ObjectInfo>, ContentError>> + Send;

    /// SHA-256 of an object's current bytes.
    fn digest_object(
        &self,
        id: &ObjectId,
    ) -> impl Future<Output = Result<ContentDigest, ContentError>> + Send {
        async move {
            let bytes = self.read_bytes(id).await?;
            Ok(content_digest(&bytes))
        }
    }
}
