//! Block and page blob clients.

use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::config::UploadOptions;
use crate::error::{ErrorCode, StorageError, StorageResult};
use crate::models::{
    validate_page_range, BlobProperties, BlobType, BlockId, BlockList, ETag, MAX_BLOCK_SIZE,
    PAGE_SIZE,
};
use crate::transport::{BlockBlobTransport, PageBlobTransport};
use crate::upload::BlobOutputStream;

/// Client for a single block blob.
#[derive(Clone)]
pub struct BlockBlobClient {
    transport: Arc<dyn BlockBlobTransport>,
}

impl BlockBlobClient {
    pub fn new(transport: Arc<dyn BlockBlobTransport>) -> Self {
        Self { transport }
    }

    /// Opens an upload stream that commits the blob on close.
    pub fn open_write(&self, options: UploadOptions) -> StorageResult<BlobOutputStream> {
        BlobOutputStream::block_blob(Arc::clone(&self.transport), options)
    }

    /// Streams `reader` to the blob and commits it.
    pub async fn upload_from_reader<R>(
        &self,
        reader: R,
        options: UploadOptions,
    ) -> StorageResult<BlobProperties>
    where
        R: AsyncRead + Unpin,
    {
        let stream = self.open_write(options)?;
        copy_and_close(reader, stream).await
    }

    /// Stages a single block with a caller-chosen ID.
    pub async fn upload_block(
        &self,
        block_id: &str,
        data: Bytes,
        content_md5: Option<String>,
    ) -> StorageResult<ETag> {
        let block_id = BlockId::from_base64(block_id)?;
        if data.len() as u64 > MAX_BLOCK_SIZE {
            return Err(StorageError::with_message(
                ErrorCode::RequestBodyTooLarge,
                format!("Block size {} exceeds {} bytes", data.len(), MAX_BLOCK_SIZE),
            ));
        }
        self.transport.put_block(&block_id, data, content_md5).await
    }

    /// Commits a caller-built block list.
    pub async fn commit_block_list(
        &self,
        block_list: &BlockList,
        properties: &BlobProperties,
    ) -> StorageResult<()> {
        if properties.blob_type != BlobType::BlockBlob {
            return Err(StorageError::new(ErrorCode::InvalidBlobType));
        }
        self.transport.put_block_list(block_list, properties).await
    }
}

/// Client for a single page blob.
#[derive(Clone)]
pub struct PageBlobClient {
    transport: Arc<dyn PageBlobTransport>,
}

impl PageBlobClient {
    pub fn new(transport: Arc<dyn PageBlobTransport>) -> Self {
        Self { transport }
    }

    /// Creates the page blob with `length` bytes and opens a stream over it.
    pub async fn open_write(
        &self,
        length: u64,
        options: UploadOptions,
    ) -> StorageResult<BlobOutputStream> {
        if length % PAGE_SIZE != 0 {
            return Err(StorageError::with_message(
                ErrorCode::InvalidPageRange,
                "Page blob size must be aligned to 512 bytes",
            ));
        }
        options.validate(BlobType::PageBlob)?;
        self.transport.create(length).await?;
        BlobOutputStream::page_blob(Arc::clone(&self.transport), length, options)
    }

    /// Creates the page blob and streams `reader` into it.
    pub async fn upload_from_reader<R>(
        &self,
        reader: R,
        length: u64,
        options: UploadOptions,
    ) -> StorageResult<BlobProperties>
    where
        R: AsyncRead + Unpin,
    {
        let stream = self.open_write(length, options).await?;
        copy_and_close(reader, stream).await
    }

    /// Writes `data` at `offset`. Offset and length must be page aligned and
    /// the range no larger than 4 MiB.
    pub async fn upload_pages(&self, offset: u64, data: Bytes) -> StorageResult<()> {
        validate_page_range(offset, data.len() as u64)?;
        self.transport.put_pages(offset, data, None).await
    }

    /// Clears `length` bytes starting at `offset`, with the same alignment
    /// rules as `upload_pages`.
    pub async fn clear_pages(&self, offset: u64, length: u64) -> StorageResult<()> {
        validate_page_range(offset, length)?;
        self.transport.clear_pages(offset, length).await
    }
}

async fn copy_and_close<R>(mut reader: R, mut stream: BlobOutputStream) -> StorageResult<BlobProperties>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; stream.options().stream_write_size_in_bytes];
    loop {
        let n = reader.read(&mut buf).await.map_err(|e| {
            StorageError::with_message(ErrorCode::InvalidInput, format!("Failed to read source: {}", e))
        })?;
        if n == 0 {
            break;
        }
        stream.write(&buf[..n]).await?;
    }
    debug!(bytes = stream.bytes_written(), "Source exhausted, closing stream");
    stream.close().await
}
