//! Common test utilities.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use blobstream::models::{BlobProperties, BlockId, BlockList, ETag};
use blobstream::{BlockBlobTransport, ErrorCode, PageBlobTransport, StorageError, StorageResult};

/// One transport invocation, recorded when the call starts.
#[derive(Debug, Clone)]
pub enum Call {
    PutBlock {
        block_id: BlockId,
        data: Bytes,
        content_md5: Option<String>,
    },
    PutBlockList {
        block_ids: Vec<BlockId>,
        properties: BlobProperties,
    },
    Create(u64),
    PutPages {
        offset: u64,
        data: Bytes,
    },
    ClearPages {
        offset: u64,
        length: u64,
    },
    Finalize(Option<u64>),
}

/// Transport stub that records calls, optionally sleeps a random time per
/// data transmission, and can fail chosen calls.
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    latency_ms: Option<(u64, u64)>,
    fail_transmission: Option<usize>,
    fail_commit: bool,
    transmissions: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps between `min` and `max` milliseconds in every data transmission.
    pub fn with_latency(mut self, min: u64, max: u64) -> Self {
        self.latency_ms = Some((min, max));
        self
    }

    /// Fails the `n`th (zero based) block or page transmission.
    pub fn failing_transmission(mut self, n: usize) -> Self {
        self.fail_transmission = Some(n);
        self
    }

    /// Fails the final commit or finalize call.
    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Staged blocks in the order the transmissions started.
    pub fn put_blocks(&self) -> Vec<(BlockId, Bytes)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::PutBlock { block_id, data, .. } => Some((block_id.clone(), data.clone())),
                _ => None,
            })
            .collect()
    }

    /// Page writes, sorted by offset.
    pub fn put_pages(&self) -> Vec<(u64, Bytes)> {
        let mut pages: Vec<(u64, Bytes)> = self
            .calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::PutPages { offset, data } => Some((*offset, data.clone())),
                _ => None,
            })
            .collect();
        pages.sort_by_key(|(offset, _)| *offset);
        pages
    }

    /// Block IDs and properties of the last commit, if any.
    pub fn committed(&self) -> Option<(Vec<BlockId>, BlobProperties)> {
        self.calls.lock().iter().rev().find_map(|call| match call {
            Call::PutBlockList {
                block_ids,
                properties,
            } => Some((block_ids.clone(), properties.clone())),
            _ => None,
        })
    }

    pub fn finalize_calls(&self) -> Vec<Option<u64>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Finalize(length) => Some(*length),
                _ => None,
            })
            .collect()
    }

    /// Highest number of transmissions observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn transmit(&self) -> StorageResult<()> {
        let index = self.transmissions.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some((min, max)) = self.latency_ms {
            let delay = rand::thread_rng().gen_range(min..=max);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.fail_transmission == Some(index) {
            return Err(StorageError::with_message(
                ErrorCode::TransportFailure,
                format!("injected failure on transmission {}", index),
            ));
        }
        Ok(())
    }

    fn commit_result(&self) -> StorageResult<()> {
        if self.fail_commit {
            return Err(StorageError::with_message(
                ErrorCode::InvalidBlockList,
                "injected commit failure",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl BlockBlobTransport for RecordingTransport {
    async fn put_block(
        &self,
        block_id: &BlockId,
        data: Bytes,
        content_md5: Option<String>,
    ) -> StorageResult<ETag> {
        self.calls.lock().push(Call::PutBlock {
            block_id: block_id.clone(),
            data,
            content_md5,
        });
        self.transmit().await?;
        Ok("\"0x1\"".to_string())
    }

    async fn put_block_list(
        &self,
        block_list: &BlockList,
        properties: &BlobProperties,
    ) -> StorageResult<()> {
        self.calls.lock().push(Call::PutBlockList {
            block_ids: block_list.ids().into_iter().cloned().collect(),
            properties: properties.clone(),
        });
        self.commit_result()
    }
}

#[async_trait]
impl PageBlobTransport for RecordingTransport {
    async fn create(&self, length: u64) -> StorageResult<()> {
        self.calls.lock().push(Call::Create(length));
        Ok(())
    }

    async fn put_pages(
        &self,
        offset: u64,
        data: Bytes,
        _content_md5: Option<String>,
    ) -> StorageResult<()> {
        self.calls.lock().push(Call::PutPages { offset, data });
        self.transmit().await
    }

    async fn clear_pages(&self, offset: u64, length: u64) -> StorageResult<()> {
        self.calls.lock().push(Call::ClearPages { offset, length });
        Ok(())
    }

    async fn finalize(
        &self,
        new_length: Option<u64>,
        _properties: &BlobProperties,
    ) -> StorageResult<()> {
        self.calls.lock().push(Call::Finalize(new_length));
        self.commit_result()
    }
}

/// Deterministic test payload of `len` bytes.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8 + 1).collect()
}
