//! Transport seams between the upload streams and the blob service.
//!
//! Implementations own request construction, signing, retries and
//! timeouts. The streams only call these methods and react to the result.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageResult;
use crate::models::{BlobProperties, BlockId, BlockList, ETag};

/// Block blob operations used by the upload stream.
#[async_trait]
pub trait BlockBlobTransport: Send + Sync {
    /// Stages one block. `content_md5` is the base64 MD5 of `data` when
    /// transactional checksums are enabled.
    async fn put_block(
        &self,
        block_id: &BlockId,
        data: Bytes,
        content_md5: Option<String>,
    ) -> StorageResult<ETag>;

    /// Commits the ordered block list and the final blob properties.
    async fn put_block_list(
        &self,
        block_list: &BlockList,
        properties: &BlobProperties,
    ) -> StorageResult<()>;
}

/// Page blob operations used by the upload stream.
#[async_trait]
pub trait PageBlobTransport: Send + Sync {
    /// Creates (or overwrites) a zero-filled page blob of `length` bytes.
    async fn create(&self, length: u64) -> StorageResult<()>;

    /// Writes `data` at `offset`. Both are page aligned.
    async fn put_pages(
        &self,
        offset: u64,
        data: Bytes,
        content_md5: Option<String>,
    ) -> StorageResult<()>;

    /// Clears `length` bytes starting at `offset`.
    async fn clear_pages(&self, offset: u64, length: u64) -> StorageResult<()>;

    /// Finalizes the blob after the last page write. `new_length` resizes
    /// the blob when set.
    async fn finalize(
        &self,
        new_length: Option<u64>,
        properties: &BlobProperties,
    ) -> StorageResult<()>;
}
