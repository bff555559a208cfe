//! Sequential write stream over a block or page blob.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::buffer::{ChunkBuffer, PageWindow};
use super::dispatch::DispatchTracker;
use super::fault::FaultCell;
use super::worker::{ChunkOperation, UploadWorker};
use crate::config::UploadOptions;
use crate::error::{ErrorCode, StorageError, StorageResult};
use crate::models::{
    BlobProperties, BlobType, BlockIdSequence, BlockList, BlockListEntry, PAGE_SIZE,
};
use crate::transport::{BlockBlobTransport, PageBlobTransport};

/// Lifecycle of an upload stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Closing,
    Committing,
    Closed,
    Faulted,
}

enum StreamTarget {
    Block {
        transport: Arc<dyn BlockBlobTransport>,
        block_ids: BlockIdSequence,
        block_list: BlockList,
    },
    Page {
        transport: Arc<dyn PageBlobTransport>,
        /// Offset of the next window to dispatch.
        offset: u64,
        /// Size the page blob was created with.
        length: u64,
    },
}

/// Buffers sequential writes into fixed-size chunks and uploads them
/// concurrently.
///
/// Block blobs are committed with an ordered block list on [`close`]. Page
/// blob writes are durable once their transmission completes, so `close`
/// only finalizes properties.
///
/// Nothing is durable until `close` returns `Ok`. A failed transmission
/// faults the stream: every later call returns that first error.
///
/// [`close`]: BlobOutputStream::close
pub struct BlobOutputStream {
    target: StreamTarget,
    buffer: ChunkBuffer,
    tracker: DispatchTracker,
    fault: Arc<FaultCell>,
    state: StreamState,
    options: UploadOptions,
    bytes_written: u64,
}

impl BlobOutputStream {
    /// Opens a stream that stages blocks and commits them on close.
    pub fn block_blob(
        transport: Arc<dyn BlockBlobTransport>,
        options: UploadOptions,
    ) -> StorageResult<Self> {
        Self::block_blob_with_ids(transport, options, BlockIdSequence::new())
    }

    /// Opens a block blob stream drawing block IDs from `block_ids`.
    pub fn block_blob_with_ids(
        transport: Arc<dyn BlockBlobTransport>,
        options: UploadOptions,
        block_ids: BlockIdSequence,
    ) -> StorageResult<Self> {
        options.validate(BlobType::BlockBlob)?;
        let target = StreamTarget::Block {
            transport,
            block_ids,
            block_list: BlockList::new(),
        };
        Ok(Self::with_target(target, options))
    }

    /// Opens a stream over an existing page blob of `length` bytes.
    pub fn page_blob(
        transport: Arc<dyn PageBlobTransport>,
        length: u64,
        options: UploadOptions,
    ) -> StorageResult<Self> {
        options.validate(BlobType::PageBlob)?;
        if length % PAGE_SIZE != 0 {
            return Err(StorageError::with_message(
                ErrorCode::InvalidPageRange,
                "Page blob size must be aligned to 512 bytes",
            ));
        }
        let target = StreamTarget::Page {
            transport,
            offset: 0,
            length,
        };
        Ok(Self::with_target(target, options))
    }

    fn with_target(target: StreamTarget, options: UploadOptions) -> Self {
        let fault = Arc::new(FaultCell::new());
        let compute_md5 = options.store_blob_content_md5;
        let track_sparse = options.sparse_page_write;
        Self {
            target,
            buffer: ChunkBuffer::new(options.stream_write_size_in_bytes, compute_md5, track_sparse),
            tracker: DispatchTracker::new(options.concurrent_request_count, Arc::clone(&fault)),
            fault,
            state: StreamState::Open,
            options,
            bytes_written: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn blob_type(&self) -> BlobType {
        match self.target {
            StreamTarget::Block { .. } => BlobType::BlockBlob,
            StreamTarget::Page { .. } => BlobType::PageBlob,
        }
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Bytes accepted by `write` but not yet dispatched.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Dispatched transmissions not yet awaited.
    pub fn outstanding(&self) -> usize {
        self.tracker.outstanding()
    }

    /// Total bytes accepted by `write`.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// The manifest built so far, in write order. `None` for page blobs.
    pub fn block_list(&self) -> Option<&BlockList> {
        match &self.target {
            StreamTarget::Block { block_list, .. } => Some(block_list),
            StreamTarget::Page { .. } => None,
        }
    }

    /// Buffers `data`, dispatching a chunk each time the write threshold is
    /// reached.
    pub async fn write(&mut self, mut data: &[u8]) -> StorageResult<()> {
        self.check_open()?;

        if let StreamTarget::Page { offset, length, .. } = &self.target {
            let end = *offset + self.buffer.len() as u64 + data.len() as u64;
            if end > *length {
                return Err(StorageError::with_message(
                    ErrorCode::OutOfRangeInput,
                    format!(
                        "Write would end at byte {} past the page blob size of {} bytes",
                        end, length
                    ),
                ));
            }
        }

        while !data.is_empty() {
            let accepted = self.buffer.append(data);
            data = &data[accepted..];
            self.bytes_written += accepted as u64;

            if self.buffer.is_full() {
                self.dispatch().await?;
            }
        }
        Ok(())
    }

    /// Dispatches buffered bytes and waits for every outstanding
    /// transmission.
    ///
    /// For page blobs the buffered byte count must be a multiple of 512;
    /// otherwise this fails and the remainder stays buffered.
    pub async fn flush(&mut self) -> StorageResult<()> {
        self.check_open()?;
        self.check_page_alignment()?;
        self.dispatch().await?;
        self.drain().await
    }

    /// Flushes, waits for all transmissions and commits the blob.
    ///
    /// After a successful close the stream rejects further use with
    /// `StreamClosed`. After a fault, close drains outstanding work and
    /// re-raises the first fault without committing.
    pub async fn close(&mut self) -> StorageResult<BlobProperties> {
        if let Err(err) = self.check_open() {
            // Results are discarded; the stream already has its answer.
            let _ = self.tracker.drain().await;
            return Err(err);
        }
        self.check_page_alignment()?;

        self.state = StreamState::Closing;
        if let Err(err) = self.dispatch().await {
            let _ = self.tracker.drain().await;
            return Err(err);
        }
        self.drain().await?;
        self.check_open()?;

        self.state = StreamState::Committing;
        match self.commit().await {
            Ok(properties) => {
                self.fault.mark_closed();
                self.state = StreamState::Closed;
                info!(
                    blob_type = self.blob_type().as_str(),
                    length = properties.content_length,
                    "Upload stream committed"
                );
                Ok(properties)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn check_open(&mut self) -> StorageResult<()> {
        if let Err(err) = self.fault.check() {
            if self.state != StreamState::Closed {
                self.state = StreamState::Faulted;
            }
            return Err(err);
        }
        Ok(())
    }

    fn check_page_alignment(&self) -> StorageResult<()> {
        if matches!(self.target, StreamTarget::Page { .. })
            && self.buffer.len() as u64 % PAGE_SIZE != 0
        {
            return Err(StorageError::with_message(
                ErrorCode::InvalidPageRange,
                format!(
                    "{} buffered bytes do not fill whole 512 byte pages",
                    self.buffer.len()
                ),
            ));
        }
        Ok(())
    }

    /// Records `err` as the session fault and returns the fault the
    /// session settled on.
    fn fail(&mut self, err: StorageError) -> StorageError {
        self.state = StreamState::Faulted;
        self.fault.record(err.clone());
        self.fault.get().cloned().unwrap_or(err)
    }

    async fn drain(&mut self) -> StorageResult<()> {
        match self.tracker.drain().await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Hands the buffer to a worker. The manifest entry or page offset is
    /// recorded here, at submission time.
    async fn dispatch(&mut self) -> StorageResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.check_open()?;

        let chunk = self.buffer.take();
        let operation = match &mut self.target {
            StreamTarget::Block {
                transport,
                block_ids,
                block_list,
            } => {
                let block_id = block_ids.next_id();
                block_list.push(BlockListEntry::latest(block_id.clone()));
                debug!(block_id = %block_id, len = chunk.data.len(), "Dispatching block");
                ChunkOperation::PutBlock {
                    transport: Arc::clone(transport),
                    block_id,
                    data: chunk.data,
                }
            }
            StreamTarget::Page {
                transport, offset, ..
            } => {
                let window_offset = *offset;
                *offset += chunk.data.len() as u64;
                match chunk.window {
                    PageWindow::Skip => {
                        debug!(
                            offset = window_offset,
                            len = chunk.data.len(),
                            "Skipping all-zero page window"
                        );
                        return Ok(());
                    }
                    PageWindow::Transmit { start, end } => {
                        debug!(
                            offset = window_offset + start as u64,
                            len = end - start,
                            "Dispatching pages"
                        );
                        ChunkOperation::PutPages {
                            transport: Arc::clone(transport),
                            offset: window_offset + start as u64,
                            data: chunk.data.slice(start..end),
                        }
                    }
                }
            }
        };

        let worker = UploadWorker::new(
            operation,
            self.options.use_transactional_content_md5,
            Arc::clone(&self.fault),
        );
        if let Err(err) = self.tracker.submit(worker.run()).await {
            return Err(self.fail(err));
        }
        Ok(())
    }

    async fn commit(&mut self) -> StorageResult<BlobProperties> {
        let content_md5 = self.buffer.finish_digest();
        match &self.target {
            StreamTarget::Block {
                transport,
                block_list,
                ..
            } => {
                let mut properties = BlobProperties::new(BlobType::BlockBlob, self.bytes_written);
                properties.content_md5 = content_md5;
                debug!(blocks = block_list.len(), "Committing block list");
                transport.put_block_list(block_list, &properties).await?;
                Ok(properties)
            }
            StreamTarget::Page {
                transport, length, ..
            } => {
                let properties = BlobProperties::new(BlobType::PageBlob, *length);
                transport.finalize(None, &properties).await?;
                Ok(properties)
            }
        }
    }
}

impl Drop for BlobOutputStream {
    fn drop(&mut self) {
        if matches!(self.state, StreamState::Open | StreamState::Closing)
            && (!self.buffer.is_empty() || self.tracker.outstanding() > 0)
        {
            warn!(
                buffered = self.buffer.len(),
                outstanding = self.tracker.outstanding(),
                "Upload stream dropped without close; pending data was discarded"
            );
        }
    }
}
