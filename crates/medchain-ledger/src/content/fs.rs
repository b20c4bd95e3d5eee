//! # Filesystem Content Store
//!
//! Each object is two files under the store root: `{id}` holding the raw
//! bytes and `{id}.meta.json` holding its [`ObjectInfo`]. Identifiers are
//! UUID v4 strings; anything else is rejected before it reaches a path, so
//! an id can never escape the root.
//!
//! The sidecar also carries a `writeSeq`: wall-clock nanoseconds, forced
//! strictly increasing within one store. Name lookups order candidates by
//! `(uploadedAt, writeSeq)`, so two uploads of one name in the same
//! millisecond still resolve to the later one.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use medchain_core::{ContentDigest, Sha256Accumulator, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use super::{ContentStore, ObjectId, ObjectInfo};
use crate::error::ContentError;

const META_SUFFIX: &str = ".meta.json";
const READ_CHUNK: usize = 64 * 1024;

/// Object store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
    last_write_seq: Arc<AtomicI64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    #[serde(flatten)]
    info: ObjectInfo,
    #[serde(default, rename = "writeSeq")]
    write_seq: i64,
}

impl FsContentStore {
    /// Open (or create) a store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, ContentError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            last_write_seq: Arc::new(AtomicI64::new(0)),
        })
    }

    /// The store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of an object's bytes.
    pub fn object_path(&self, id: &ObjectId) -> Result<PathBuf, ContentError> {
        let uuid = parse_id(id)?;
        Ok(self.root.join(uuid.to_string()))
    }

    fn meta_path(&self, id: &ObjectId) -> Result<PathBuf, ContentError> {
        let uuid = parse_id(id)?;
        Ok(self.root.join(format!("{uuid}{META_SUFFIX}")))
    }

    fn next_write_seq(&self) -> i64 {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        let prev = self
            .last_write_seq
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        now.max(prev.saturating_add(1))
    }
}

fn parse_id(id: &ObjectId) -> Result<Uuid, ContentError> {
    Uuid::parse_str(id.as_str()).map_err(|_| ContentError::InvalidId(id.to_string()))
}

fn not_found_as(id: &ObjectId) -> impl FnOnce(std::io::Error) -> ContentError + '_ {
    move |e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ContentError::NotFound(id.to_string())
        } else {
            ContentError::Io(e)
        }
    }
}

impl ContentStore for FsContentStore {
    async fn read_bytes(&self, id: &ObjectId) -> Result<Vec<u8>, ContentError> {
        let path = self.object_path(id)?;
        tokio::fs::read(&path).await.map_err(not_found_as(id))
    }

    async fn write_bytes(
        &self,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<ObjectId, ContentError> {
        let id = ObjectId::new(Uuid::new_v4().to_string());
        let sidecar = Sidecar {
            info: ObjectInfo {
                id: id.clone(),
                name: name.to_string(),
                content_type: content_type.to_string(),
                size: bytes.len() as u64,
                uploaded_at: Timestamp::now(),
            },
            write_seq: self.next_write_seq(),
        };
        // Bytes first: a sidecar without its object would make the name
        // resolvable to nothing.
        tokio::fs::write(self.object_path(&id)?, bytes).await?;
        tokio::fs::write(self.meta_path(&id)?, serde_json::to_vec_pretty(&sidecar)?).await?;
        tracing::debug!(object_id = %id, name, size = sidecar.info.size, "object stored");
        Ok(id)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<ObjectInfo>, ContentError> {
        let mut latest: Option<Sidecar> = None;
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if !file_name.ends_with(META_SUFFIX) {
                continue;
            }
            let raw = tokio::fs::read(entry.path()).await?;
            let sidecar: Sidecar = match serde_json::from_slice(&raw) {
                Ok(sidecar) => sidecar,
                Err(e) => {
                    tracing::warn!(file = file_name, error = %e, "skipping unreadable object sidecar");
                    continue;
                }
            };
            if sidecar.info.name != name {
                continue;
            }
            let newer = latest.as_ref().map_or(true, |cur| {
                (sidecar.info.uploaded_at, sidecar.write_seq) >= (cur.info.uploaded_at, cur.write_seq)
            });
            if newer {
                latest = Some(sidecar);
            }
        }
        Ok(latest.map(|sidecar| sidecar.info))
    }

    async fn info(&self, id: &ObjectId) -> Result<Option<ObjectInfo>, ContentError> {
        let path = self.meta_path(id)?;
        match tokio::fs::read(&path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice::<Sidecar>(&raw)?.info)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn digest_object(&self, id: &ObjectId) -> Result<ContentDigest, ContentError> {
        let path = self.object_path(id)?;
        let mut file = tokio::fs::File::open(&path).await.map_err(not_found_as(id))?;
        let mut acc = Sha256Accumulator::new();
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            acc.update(&buf[..n]);
        }
        tracing::debug!(object_id = %id, bytes = acc.len(), "object digested");
        Ok(acc.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medchain_core::content_digest;

    #[tokio::test]
    async fn objects_persist_as_file_plus_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).await.unwrap();
        let id = store.write_bytes("1000-a.txt", b"abc", "text/plain").await.unwrap();
        assert!(store.object_path(&id).unwrap().is_file());
        assert!(dir.path().join(format!("{id}.meta.json")).is_file());

        let reopened = FsContentStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.read_bytes(&id).await.unwrap(), b"abc");
        let info = reopened.info(&id).await.unwrap().unwrap();
        assert_eq!(info.content_type, "text/plain");
        assert_eq!(info.size, 3);
    }

    #[tokio::test]
    async fn streamed_digest_matches_one_shot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).await.unwrap();
        let bytes: Vec<u8> = (0..(READ_CHUNK * 2 + 17)).map(|i| (i % 251) as u8).collect();
        let id = store.write_bytes("big.bin", &bytes, "application/octet-stream").await.unwrap();
        assert_eq!(store.digest_object(&id).await.unwrap(), content_digest(&bytes));
    }

    #[tokio::test]
    async fn empty_object_digests_to_hash_of_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).await.unwrap();
        let id = store.write_bytes("empty", b"", "text/plain").await.unwrap();
        assert_eq!(store.digest_object(&id).await.unwrap(), content_digest(b""));
    }

    #[tokio::test]
    async fn path_traversal_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).await.unwrap();
        let err = store.read_bytes(&ObjectId::new("../etc/passwd")).await.unwrap_err();
        assert!(matches!(err, ContentError::InvalidId(_)));
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).await.unwrap();
        let id = ObjectId::new(Uuid::new_v4().to_string());
        assert!(matches!(store.read_bytes(&id).await, Err(ContentError::NotFound(_))));
        assert!(matches!(store.digest_object(&id).await, Err(ContentError::NotFound(_))));
        assert!(store.info(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_by_name_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).await.unwrap();
        let id = store.write_bytes("1000-scan.png", b"x", "image/png").await.unwrap();
        store.write_bytes("2000-scan.png", b"y", "image/png").await.unwrap();
        let found = store.find_by_name("1000-scan.png").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert!(store.find_by_name("scan.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn back_to_back_uploads_of_one_name_resolve_to_the_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).await.unwrap();
        for i in 0..50u32 {
            let id = store
                .write_bytes("report.pdf", &i.to_be_bytes(), "application/pdf")
                .await
                .unwrap();
            let found = store.find_by_name("report.pdf").await.unwrap().unwrap();
            assert_eq!(found.id, id, "upload {i}");
        }
    }

    #[tokio::test]
    async fn sidecar_without_write_seq_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).await.unwrap();
        let id = ObjectId::new(Uuid::new_v4().to_string());
        std::fs::write(store.object_path(&id).unwrap(), b"old").unwrap();
        let legacy = serde_json::json!({
            "id": id.as_str(),
            "name": "old.txt",
            "contentType": "text/plain",
            "size": 3,
            "uploadedAt": 5,
        });
        std::fs::write(dir.path().join(format!("{id}.meta.json")), legacy.to_string()).unwrap();

        let found = store.find_by_name("old.txt").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(store.info(&id).await.unwrap().unwrap().size, 3);
    }
}
