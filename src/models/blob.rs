//! Blob data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Blob types an upload stream can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlobType {
    BlockBlob,
    PageBlob,
}

impl BlobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobType::BlockBlob => "BlockBlob",
            BlobType::PageBlob => "PageBlob",
        }
    }
}

/// Entity tag returned by the service for a staged block or written blob.
pub type ETag = String;

/// Blob properties sent along with the final commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobProperties {
    pub blob_type: BlobType,
    pub content_length: u64,
    pub content_type: Option<String>,
    /// Base64 MD5 of the whole blob content.
    pub content_md5: Option<String>,
    pub etag: Option<ETag>,
    pub last_modified: DateTime<Utc>,
}

impl BlobProperties {
    pub fn new(blob_type: BlobType, content_length: u64) -> Self {
        Self {
            blob_type,
            content_length,
            content_type: None,
            content_md5: None,
            etag: None,
            last_modified: Utc::now(),
        }
    }

    /// Assigns a fresh ETag and bumps the last-modified time.
    pub fn update_etag(&mut self) {
        self.etag = Some(format!("\"0x{}\"", uuid::Uuid::new_v4().simple()));
        self.last_modified = Utc::now();
    }
}
