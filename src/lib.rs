//! blobstream: chunked, concurrent upload streams for Azure block and page blobs.
//!
//! A [`BlobOutputStream`] buffers sequential writes into fixed-size chunks,
//! uploads them on a bounded pool of tasks, and commits the blob on close.
//! The network side is supplied through the [`BlockBlobTransport`] and
//! [`PageBlobTransport`] traits; [`MemoryBlobStore`] implements both in
//! process.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use blobstream::{BlockBlobClient, MemoryBlobStore, UploadOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(MemoryBlobStore::new());
//!     let client = BlockBlobClient::new(Arc::new(store.blob("greeting.txt")));
//!
//!     let mut stream = client.open_write(UploadOptions::default()).unwrap();
//!     stream.write(b"hello world").await.unwrap();
//!     stream.close().await.unwrap();
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod transport;
pub mod upload;
pub mod xml;

// Re-exports for convenience
pub use client::{BlockBlobClient, PageBlobClient};
pub use config::{Args, UploadOptions, DEFAULT_CONCURRENT_REQUEST_COUNT, DEFAULT_STREAM_WRITE_SIZE};
pub use error::{ErrorCode, StorageError, StorageResult};
pub use storage::{MemoryBlob, MemoryBlobStore};
pub use transport::{BlockBlobTransport, PageBlobTransport};
pub use upload::{BlobOutputStream, StreamState};
