//! In-memory content store.

use std::collections::HashMap;

use medchain_core::Timestamp;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{ContentStore, ObjectId, ObjectInfo};
use crate::error::ContentError;

#[derive(Debug)]
struct StoredObject {
    info: ObjectInfo,
    bytes: Vec<u8>,
    seq: u64,
}

#[derive(Debug, Default)]
struct Objects {
    by_id: HashMap<ObjectId, StoredObject>,
    next_seq: u64,
}

/// Volatile object store keyed by UUID.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    objects: RwLock<Objects>,
}

impl MemoryContentStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace an object's bytes in place, out of band. Returns `false` for
    /// an unknown id.
    pub fn overwrite(&self, id: &ObjectId, bytes: Vec<u8>) -> bool {
        let mut objects = self.objects.write();
        match objects.by_id.get_mut(id) {
            Some(obj) => {
                obj.info.size = bytes.len() as u64;
                obj.bytes = bytes;
                true
            }
            None => false,
        }
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().by_id.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ContentStore for MemoryContentStore {
    async fn read_bytes(&self, id: &ObjectId) -> Result<Vec<u8>, ContentError> {
        self.objects
            .read()
            .by_id
            .get(id)
            .map(|obj| obj.bytes.clone())
            .ok_or_else(|| ContentError::NotFound(id.to_string()))
    }

    async fn write_bytes(
        &self,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<ObjectId, ContentError> {
        let id = ObjectId::new(Uuid::new_v4().to_string());
        let info = ObjectInfo {
            id: id.clone(),
            name: name.to_string(),
            content_type: content_type.to_string(),
            size: bytes.len() as u64,
            uploaded_at: Timestamp::now(),
        };
        let mut objects = self.objects.write();
        let seq = objects.next_seq;
        objects.next_seq += 1;
        objects.by_id.insert(
            id.clone(),
            StoredObject {
                info,
                bytes: bytes.to_vec(),
                seq,
            },
        );
        Ok(id)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<ObjectInfo>, ContentError> {
        Ok(self
            .objects
            .read()
            .by_id
            .values()
            .filter(|obj| obj.info.name == name)
            .max_by_key(|obj| obj.seq)
            .map(|obj| obj.info.clone()))
    }

    async fn info(&self, id: &ObjectId) -> Result<Option<ObjectInfo>, ContentError> {
        Ok(self.objects.read().by_id.get(id).map(|obj| obj.info.clone()))
    }
}
