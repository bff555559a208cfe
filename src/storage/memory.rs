//! In-memory blob service emulator.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use dashmap::DashMap;
use md5::{Digest, Md5};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{ErrorCode, StorageError, StorageResult};
use crate::models::{
    validate_page_range, BlobProperties, BlobType, BlockId, BlockList, BlockSearchMode, ETag,
    PAGE_SIZE,
};
use crate::transport::{BlockBlobTransport, PageBlobTransport};
use crate::xml::{parse_block_list, serialize_block_list};

/// A committed blob.
#[derive(Debug)]
struct StoredBlob {
    properties: BlobProperties,
    content: Vec<u8>,
    /// Committed blocks in list order (block blobs only).
    committed_blocks: Vec<(BlockId, Bytes)>,
}

/// Emulates the service side of block and page blob uploads.
///
/// Blocks are staged per blob name and resolved on commit according to
/// each entry's search mode. Page blobs are zero-filled buffers of a fixed
/// size.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<Arc<str>, Arc<Mutex<StoredBlob>>>,
    staged: DashMap<Arc<str>, HashMap<BlockId, Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a transport handle for the blob called `name`.
    pub fn blob(self: &Arc<Self>, name: &str) -> MemoryBlob {
        MemoryBlob {
            store: Arc::clone(self),
            name: Arc::from(name),
        }
    }

    fn stored(&self, name: &str) -> StorageResult<Arc<Mutex<StoredBlob>>> {
        self.blobs
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StorageError::new(ErrorCode::BlobNotFound))
    }

    /// Returns the committed properties and content of a blob.
    pub fn get_blob(&self, name: &str) -> StorageResult<(BlobProperties, Bytes)> {
        let blob = self.stored(name)?;
        let blob = blob.lock();
        Ok((blob.properties.clone(), Bytes::from(blob.content.clone())))
    }

    /// Returns the committed block list of a block blob.
    pub fn committed_block_list(&self, name: &str) -> StorageResult<Vec<BlockId>> {
        let blob = self.stored(name)?;
        let blob = blob.lock();
        Ok(blob.committed_blocks.iter().map(|(id, _)| id.clone()).collect())
    }

    /// Number of staged, uncommitted blocks for a blob.
    pub fn staged_block_count(&self, name: &str) -> usize {
        self.staged.get(name).map(|blocks| blocks.len()).unwrap_or(0)
    }

    /// Writes the committed content of a blob to a local file.
    pub async fn save_to(&self, name: &str, path: impl AsRef<Path>) -> StorageResult<()> {
        let (_, content) = self.get_blob(name)?;
        tokio::fs::write(path, &content).await?;
        Ok(())
    }
}

fn check_content_md5(data: &[u8], content_md5: Option<&str>) -> StorageResult<()> {
    if let Some(expected) = content_md5 {
        let computed = BASE64.encode(Md5::digest(data));
        if computed != expected {
            return Err(StorageError::new(ErrorCode::Md5Mismatch));
        }
    }
    Ok(())
}

/// Transport handle bound to one blob in a [`MemoryBlobStore`].
#[derive(Clone)]
pub struct MemoryBlob {
    store: Arc<MemoryBlobStore>,
    name: Arc<str>,
}

impl MemoryBlob {
    fn page_blob(&self) -> StorageResult<Arc<Mutex<StoredBlob>>> {
        let blob = self.store.stored(&self.name)?;
        if blob.lock().properties.blob_type != BlobType::PageBlob {
            return Err(StorageError::new(ErrorCode::InvalidBlobType));
        }
        Ok(blob)
    }
}

#[async_trait]
impl BlockBlobTransport for MemoryBlob {
    async fn put_block(
        &self,
        block_id: &BlockId,
        data: Bytes,
        content_md5: Option<String>,
    ) -> StorageResult<ETag> {
        check_content_md5(&data, content_md5.as_deref())?;
        self.store
            .staged
            .entry(Arc::clone(&self.name))
            .or_default()
            .insert(block_id.clone(), data);
        Ok(format!("\"0x{}\"", uuid::Uuid::new_v4().simple()))
    }

    async fn put_block_list(
        &self,
        block_list: &BlockList,
        properties: &BlobProperties,
    ) -> StorageResult<()> {
        // Go through the request body exactly as the service receives it.
        let block_list = parse_block_list(&serialize_block_list(block_list))?;

        let previous: Vec<(BlockId, Bytes)> = self
            .store
            .stored(&self.name)
            .map(|blob| blob.lock().committed_blocks.clone())
            .unwrap_or_default();
        let staged = self
            .store
            .staged
            .get(&self.name)
            .map(|blocks| blocks.clone())
            .unwrap_or_default();

        let find_committed = |id: &BlockId| {
            previous
                .iter()
                .find(|(committed_id, _)| committed_id == id)
                .map(|(_, data)| data.clone())
        };

        let mut committed_blocks = Vec::with_capacity(block_list.len());
        let mut content = Vec::new();
        for entry in &block_list.entries {
            let data = match entry.mode {
                BlockSearchMode::Uncommitted => staged.get(&entry.id).cloned(),
                BlockSearchMode::Committed => find_committed(&entry.id),
                BlockSearchMode::Latest => staged
                    .get(&entry.id)
                    .cloned()
                    .or_else(|| find_committed(&entry.id)),
            };
            let data = data.ok_or_else(|| {
                StorageError::with_message(
                    ErrorCode::InvalidBlockList,
                    format!("Block {} not found", entry.id),
                )
            })?;
            content.extend_from_slice(&data);
            committed_blocks.push((entry.id.clone(), data));
        }

        let mut properties = properties.clone();
        properties.blob_type = BlobType::BlockBlob;
        properties.content_length = content.len() as u64;
        properties.update_etag();

        self.store.blobs.insert(
            Arc::clone(&self.name),
            Arc::new(Mutex::new(StoredBlob {
                properties,
                content,
                committed_blocks,
            })),
        );
        self.store.staged.remove(&self.name);
        Ok(())
    }
}

#[async_trait]
impl PageBlobTransport for MemoryBlob {
    async fn create(&self, length: u64) -> StorageResult<()> {
        if length % PAGE_SIZE != 0 {
            return Err(StorageError::with_message(
                ErrorCode::InvalidPageRange,
                "Page blob size must be aligned to 512 bytes",
            ));
        }
        let mut properties = BlobProperties::new(BlobType::PageBlob, length);
        properties.update_etag();
        self.store.blobs.insert(
            Arc::clone(&self.name),
            Arc::new(Mutex::new(StoredBlob {
                properties,
                content: vec![0u8; length as usize],
                committed_blocks: Vec::new(),
            })),
        );
        Ok(())
    }

    async fn put_pages(
        &self,
        offset: u64,
        data: Bytes,
        content_md5: Option<String>,
    ) -> StorageResult<()> {
        let range = validate_page_range(offset, data.len() as u64)?;
        check_content_md5(&data, content_md5.as_deref())?;

        let blob = self.page_blob()?;
        let mut blob = blob.lock();
        if range.end >= blob.properties.content_length {
            return Err(StorageError::new(ErrorCode::InvalidPageRange));
        }
        let start = range.start as usize;
        blob.content[start..start + data.len()].copy_from_slice(&data);
        blob.properties.update_etag();
        Ok(())
    }

    async fn clear_pages(&self, offset: u64, length: u64) -> StorageResult<()> {
        let range = validate_page_range(offset, length)?;

        let blob = self.page_blob()?;
        let mut blob = blob.lock();
        if range.end >= blob.properties.content_length {
            return Err(StorageError::new(ErrorCode::InvalidPageRange));
        }
        blob.content[range.start as usize..=range.end as usize].fill(0);
        blob.properties.update_etag();
        Ok(())
    }

    async fn finalize(
        &self,
        new_length: Option<u64>,
        properties: &BlobProperties,
    ) -> StorageResult<()> {
        let blob = self.page_blob()?;
        let mut blob = blob.lock();
        if let Some(length) = new_length {
            if length % PAGE_SIZE != 0 {
                return Err(StorageError::with_message(
                    ErrorCode::InvalidPageRange,
                    "Page blob size must be aligned to 512 bytes",
                ));
            }
            blob.content.resize(length as usize, 0);
            blob.properties.content_length = length;
        }
        blob.properties.content_type = properties.content_type.clone();
        blob.properties.content_md5 = properties.content_md5.clone();
        blob.properties.update_etag();
        Ok(())
    }
}
