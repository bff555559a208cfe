//! A single chunk transmission.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use md5::{Digest, Md5};
use std::sync::Arc;
use tracing::{debug, trace};

use super::fault::FaultCell;
use crate::error::StorageResult;
use crate::models::BlockId;
use crate::transport::{BlockBlobTransport, PageBlobTransport};

/// The network operation a worker performs.
pub enum ChunkOperation {
    PutBlock {
        transport: Arc<dyn BlockBlobTransport>,
        block_id: BlockId,
        data: Bytes,
    },
    PutPages {
        transport: Arc<dyn PageBlobTransport>,
        offset: u64,
        data: Bytes,
    },
}

impl ChunkOperation {
    fn data(&self) -> &Bytes {
        match self {
            ChunkOperation::PutBlock { data, .. } | ChunkOperation::PutPages { data, .. } => data,
        }
    }
}

/// Transmits one chunk and records a failure in the session fault cell.
///
/// Never retries; the transport decides whether a request is retried.
pub struct UploadWorker {
    operation: ChunkOperation,
    transactional_md5: bool,
    fault: Arc<FaultCell>,
}

impl UploadWorker {
    pub fn new(operation: ChunkOperation, transactional_md5: bool, fault: Arc<FaultCell>) -> Self {
        Self {
            operation,
            transactional_md5,
            fault,
        }
    }

    pub async fn run(self) -> StorageResult<()> {
        let content_md5 = self
            .transactional_md5
            .then(|| BASE64.encode(Md5::digest(self.operation.data())));

        let result = match self.operation {
            ChunkOperation::PutBlock {
                transport,
                block_id,
                data,
            } => {
                let len = data.len();
                transport
                    .put_block(&block_id, data, content_md5)
                    .await
                    .map(|etag| {
                        trace!(block_id = %block_id, len, etag = %etag, "Block staged");
                    })
            }
            ChunkOperation::PutPages {
                transport,
                offset,
                data,
            } => {
                let len = data.len();
                transport
                    .put_pages(offset, data, content_md5)
                    .await
                    .map(|()| {
                        trace!(offset, len, "Pages written");
                    })
            }
        };

        if let Err(ref err) = result {
            debug!("Chunk transmission failed: {}", err);
            self.fault.record(err.clone());
        }
        result
    }
}
