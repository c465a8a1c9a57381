//! Content storage for signature images
//!
//! Blobs are addressed by an opaque [`BlobRef`]. A stored blob is never
//! deleted: bindings keep pointing at the image they were made with even
//! after the owner replaces or deletes their signature.

use dashmap::DashMap;
use signoff_types::{BlobRef, SignoffResult};
use std::sync::Arc;

/// Storage backend for signature image bytes
pub trait BlobStore: Send + Sync {
    /// Store bytes under a fresh reference.
    fn put(&self, bytes: &[u8]) -> SignoffResult<BlobRef>;

    /// Fetch bytes, `None` if the blob is missing.
    fn get(&self, blob: &BlobRef) -> SignoffResult<Option<Vec<u8>>>;

    /// Number of stored blobs
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory blob store
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: DashMap<BlobRef, Arc<Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a blob's bytes in place, bypassing every engine check.
    ///
    /// Models out-of-band modification of the underlying storage. Returns
    /// false when the blob does not exist.
    pub fn overwrite(&self, blob: &BlobRef, bytes: Vec<u8>) -> bool {
        match self.blobs.get_mut(blob) {
            Some(mut entry) => {
                *entry = Arc::new(bytes);
                tracing::warn!(blob = %blob, "Blob overwritten out of band");
                true
            }
            None => false,
        }
    }

    /// Drop a blob, bypassing every engine check.
    pub fn purge(&self, blob: &BlobRef) -> bool {
        self.blobs.remove(blob).is_some()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put(&self, bytes: &[u8]) -> SignoffResult<BlobRef> {
        let blob = BlobRef::generate();
        self.blobs.insert(blob.clone(), Arc::new(bytes.to_vec()));
        tracing::debug!(blob = %blob, size = bytes.len(), "Blob stored");
        Ok(blob)
    }

    fn get(&self, blob: &BlobRef) -> SignoffResult<Option<Vec<u8>>> {
        Ok(self.blobs.get(blob).map(|entry| entry.as_ref().clone()))
    }

    fn len(&self) -> usize {
        self.blobs.len()
    }
}
