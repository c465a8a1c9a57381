//! Signature store: one active signature image per user
//!
//! Image bytes go to the [`BlobStore`]; the record keeps the blob reference
//! and the content hash taken at upload. Replacing or deleting a record
//! leaves the old blob in place for bindings that still point at it.

use crate::{AuditTrail, BlobStore, EngineConfig};
use chrono::Utc;
use dashmap::DashMap;
use signoff_types::{
    BlobRef, ContentHash, ImageFormat, SignatureRecord, SignoffError, SignoffResult, UserId,
};
use std::sync::Arc;

/// Upload limits for signature images
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureLimits {
    pub max_bytes: usize,
    pub allowed_formats: Vec<ImageFormat>,
}

impl SignatureLimits {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_bytes: config.max_signature_bytes,
            allowed_formats: config.allowed_formats.clone(),
        }
    }

    /// Detect the image format and check it against the limits.
    pub fn check(&self, bytes: &[u8]) -> SignoffResult<ImageFormat> {
        if bytes.is_empty() {
            return Err(SignoffError::InvalidFormat("empty image".into()));
        }
        let format = ImageFormat::detect(bytes)
            .ok_or_else(|| SignoffError::InvalidFormat("unrecognized image data".into()))?;
        if !self.allowed_formats.contains(&format) {
            return Err(SignoffError::InvalidFormat(format!(
                "{} is not an accepted signature format",
                format
            )));
        }
        if bytes.len() > self.max_bytes {
            return Err(SignoffError::TooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }
        Ok(format)
    }
}

impl Default for SignatureLimits {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Registered signatures, keyed by owner
pub struct SignatureStore {
    records: DashMap<UserId, SignatureRecord>,
    blobs: Arc<dyn BlobStore>,
    limits: SignatureLimits,
    audit: Arc<AuditTrail>,
}

impl std::fmt::Debug for SignatureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureStore")
            .field("records", &self.records.len())
            .field("blobs", &self.blobs.len())
            .field("limits", &self.limits)
            .finish()
    }
}

impl SignatureStore {
    pub fn new(blobs: Arc<dyn BlobStore>, limits: SignatureLimits, audit: Arc<AuditTrail>) -> Self {
        Self {
            records: DashMap::new(),
            blobs,
            limits,
            audit,
        }
    }

    /// Store a user's signature image, replacing any earlier one.
    pub fn register(&self, owner: &UserId, bytes: &[u8]) -> SignoffResult<SignatureRecord> {
        let format = self.limits.check(bytes).map_err(|e| {
            tracing::debug!(owner = %owner, kind = ?e.kind(), error = %e, "Signature rejected");
            e
        })?;

        let image_ref = self.blobs.put(bytes)?;
        let record = SignatureRecord {
            owner: owner.clone(),
            image_ref,
            format,
            content_hash: ContentHash::hash(bytes),
            size_bytes: bytes.len(),
            uploaded_at: Utc::now(),
        };

        let replaced = self.records.insert(owner.clone(), record.clone()).is_some();
        self.audit
            .record_signature_registered(owner, record.content_hash)?;

        tracing::info!(
            owner = %owner,
            format = %format,
            size = record.size_bytes,
            hash = %record.content_hash,
            replaced,
            "Signature registered"
        );
        Ok(record)
    }

    /// Remove a user's active signature. Existing bindings are unaffected.
    pub fn delete(&self, owner: &UserId) -> SignoffResult<SignatureRecord> {
        let (_, record) = self
            .records
            .remove(owner)
            .ok_or_else(|| SignoffError::SignatureNotFound(owner.clone()))?;
        self.audit.record_signature_deleted(owner)?;
        tracing::info!(owner = %owner, "Signature deleted");
        Ok(record)
    }

    pub fn get(&self, owner: &UserId) -> Option<SignatureRecord> {
        self.records.get(owner).map(|r| r.value().clone())
    }

    pub fn has_signature(&self, owner: &UserId) -> bool {
        self.records.contains_key(owner)
    }

    pub fn load_image(&self, image_ref: &BlobRef) -> SignoffResult<Option<Vec<u8>>> {
        self.blobs.get(image_ref)
    }

    /// The stored image of `record`, provided it still matches its hash.
    pub fn verified_image(&self, record: &SignatureRecord) -> SignoffResult<Vec<u8>> {
        match self.blobs.get(&record.image_ref)? {
            Some(bytes) if ContentHash::hash(&bytes) == record.content_hash => Ok(bytes),
            _ => {
                tracing::warn!(
                    owner = %record.owner,
                    blob = %record.image_ref,
                    "Stored signature failed integrity check"
                );
                Err(SignoffError::SignatureCorrupted(record.owner.clone()))
            }
        }
    }

    /// Whether the user's stored image still matches its recorded hash.
    pub fn verify_integrity(&self, owner: &UserId) -> SignoffResult<bool> {
        let record = self
            .get(owner)
            .ok_or_else(|| SignoffError::SignatureNotFound(owner.clone()))?;
        match self.verified_image(&record) {
            Ok(_) => Ok(true),
            Err(SignoffError::SignatureCorrupted(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn limits(&self) -> &SignatureLimits {
        &self.limits
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
