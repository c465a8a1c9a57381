//! Signature records and bindings
//!
//! A [`SignatureRecord`] is a user's registered signature image. A
//! [`SignatureBinding`] is the durable association of that image with one
//! field of one case at one instant. Bindings copy the image reference and
//! hash at signing time, so replacing the record later does not change them.

use crate::{BindingId, CaseId, ContentHash, FieldPath, RoleId, StepNumber, UserId};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// ── Image Formats ────────────────────────────────────────────────────

/// Raster formats recognized from magic bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

impl ImageFormat {
    /// Detect the format from the leading bytes of an image.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(PNG_MAGIC) {
            Some(Self::Png)
        } else if bytes.starts_with(JPEG_MAGIC) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mime_type())
    }
}

// ── Blob References ──────────────────────────────────────────────────

/// Opaque handle to image bytes held by a blob store
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(pub String);

impl BlobRef {
    pub fn generate() -> Self {
        Self(format!("blob-{}", uuid::Uuid::new_v4()))
    }
}

impl std::fmt::Display for BlobRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Signature Record ─────────────────────────────────────────────────

/// A user's active signature image
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub owner: UserId,
    pub image_ref: BlobRef,
    pub format: ImageFormat,
    /// Hash of the raw image bytes at upload time
    pub content_hash: ContentHash,
    pub size_bytes: usize,
    pub uploaded_at: DateTime<Utc>,
}

// ── Signature Binding ────────────────────────────────────────────────

/// A signature applied to one field of one case
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBinding {
    pub binding_id: BindingId,
    pub case_id: CaseId,
    pub field_path: FieldPath,
    /// Step whose signature field this is
    pub step_number: StepNumber,
    /// Attempt of that step the binding was made for
    pub attempt: u32,
    pub signer: UserId,
    pub signer_role: RoleId,
    /// Image reference copied from the signer's record at signing time
    pub image_ref: BlobRef,
    /// Content hash copied from the signer's record at signing time
    pub image_hash: ContentHash,
    pub signed_at: DateTime<Utc>,
    pub binding_hash: ContentHash,
}

impl SignatureBinding {
    /// Hash of image bytes ‖ case id ‖ field path ‖ signing instant.
    pub fn compute_hash(
        image_bytes: &[u8],
        case_id: &CaseId,
        field_path: &FieldPath,
        signed_at: &DateTime<Utc>,
    ) -> ContentHash {
        let path = field_path.to_string();
        let instant = signed_at.to_rfc3339_opts(SecondsFormat::Nanos, true);
        ContentHash::hash_framed([
            image_bytes,
            case_id.0.as_bytes(),
            path.as_bytes(),
            instant.as_bytes(),
        ])
    }

    /// Whether `image_bytes` still produce the stored binding hash.
    pub fn matches(&self, image_bytes: &[u8]) -> bool {
        Self::compute_hash(image_bytes, &self.case_id, &self.field_path, &self.signed_at)
            == self.binding_hash
    }

    /// The stamp written into the case document when the step completes.
    pub fn stamp(&self) -> SignatureStamp {
        SignatureStamp {
            binding_id: self.binding_id.clone(),
            signed_by: self.signer.clone(),
            signer_role: self.signer_role.clone(),
            signed_at: self.signed_at,
            binding_hash: self.binding_hash,
            image_hash: self.image_hash,
        }
    }
}

/// Signature metadata embedded in section data at the signature field
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStamp {
    pub binding_id: BindingId,
    pub signed_by: UserId,
    pub signer_role: RoleId,
    pub signed_at: DateTime<Utc>,
    pub binding_hash: ContentHash,
    pub image_hash: ContentHash,
}
