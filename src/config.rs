//! Upload configuration.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ErrorCode, StorageError, StorageResult};
use crate::models::{BlobType, MAX_BLOCK_SIZE, MAX_PAGE_RANGE_SIZE, PAGE_SIZE};

/// Default number of concurrent transmissions per stream.
pub const DEFAULT_CONCURRENT_REQUEST_COUNT: usize = 1;

/// Default bytes buffered before a chunk is dispatched.
pub const DEFAULT_STREAM_WRITE_SIZE: usize = 4 * 1024 * 1024;

/// Options controlling a single upload stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadOptions {
    /// Maximum number of chunk transmissions executing at once.
    pub concurrent_request_count: usize,
    /// Bytes buffered before a chunk is dispatched.
    pub stream_write_size_in_bytes: usize,
    /// Compute an MD5 over the whole stream and store it with the blob.
    pub store_blob_content_md5: bool,
    /// Send an MD5 of each chunk with its transmission.
    pub use_transactional_content_md5: bool,
    /// Skip transmission of all-zero page windows.
    pub sparse_page_write: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            concurrent_request_count: DEFAULT_CONCURRENT_REQUEST_COUNT,
            stream_write_size_in_bytes: DEFAULT_STREAM_WRITE_SIZE,
            store_blob_content_md5: true,
            use_transactional_content_md5: false,
            sparse_page_write: false,
        }
    }
}

impl UploadOptions {
    /// Defaults for page blob streams, which cannot store a whole-blob MD5.
    pub fn for_page_blob() -> Self {
        Self {
            store_blob_content_md5: false,
            ..Self::default()
        }
    }

    pub fn with_concurrency(mut self, count: usize) -> Self {
        self.concurrent_request_count = count;
        self
    }

    pub fn with_write_size(mut self, bytes: usize) -> Self {
        self.stream_write_size_in_bytes = bytes;
        self
    }

    pub fn with_content_md5(mut self, enabled: bool) -> Self {
        self.store_blob_content_md5 = enabled;
        self
    }

    pub fn with_transactional_md5(mut self, enabled: bool) -> Self {
        self.use_transactional_content_md5 = enabled;
        self
    }

    pub fn with_sparse_page_write(mut self, enabled: bool) -> Self {
        self.sparse_page_write = enabled;
        self
    }

    /// Checks the options against the blob type a stream will target.
    pub fn validate(&self, blob_type: BlobType) -> StorageResult<()> {
        if self.concurrent_request_count == 0 {
            return Err(StorageError::with_message(
                ErrorCode::OutOfRangeInput,
                "Concurrent request count must be at least 1",
            ));
        }

        let write_size = self.stream_write_size_in_bytes as u64;
        match blob_type {
            BlobType::BlockBlob => {
                if write_size == 0 || write_size > MAX_BLOCK_SIZE {
                    return Err(StorageError::with_message(
                        ErrorCode::OutOfRangeInput,
                        format!(
                            "Block write size must be between 1 and {} bytes",
                            MAX_BLOCK_SIZE
                        ),
                    ));
                }
                if self.sparse_page_write {
                    return Err(StorageError::with_message(
                        ErrorCode::InvalidInput,
                        "Sparse page writes only apply to page blobs",
                    ));
                }
            }
            BlobType::PageBlob => {
                if write_size == 0 || write_size % PAGE_SIZE != 0 || write_size > MAX_PAGE_RANGE_SIZE
                {
                    return Err(StorageError::with_message(
                        ErrorCode::OutOfRangeInput,
                        format!(
                            "Page write size must be a multiple of 512 bytes no larger than {} bytes",
                            MAX_PAGE_RANGE_SIZE
                        ),
                    ));
                }
                if self.store_blob_content_md5 {
                    return Err(StorageError::with_message(
                        ErrorCode::InvalidInput,
                        "Storing a whole-blob MD5 is not supported for page blobs",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Command-line arguments for the upload tool.
#[derive(Parser, Debug, Clone)]
#[command(name = "blobstream")]
#[command(about = "Stream a local file through a chunked blob upload")]
#[command(version)]
pub struct Args {
    /// File to upload.
    pub file: PathBuf,

    /// Upload as a page blob instead of a block blob.
    #[arg(long)]
    pub page_blob: bool,

    /// Bytes per dispatched chunk.
    #[arg(long, default_value_t = DEFAULT_STREAM_WRITE_SIZE)]
    pub block_size: usize,

    /// Maximum concurrent chunk transmissions.
    #[arg(long, short = 'c', default_value_t = DEFAULT_CONCURRENT_REQUEST_COUNT)]
    pub concurrency: usize,

    /// Do not compute a whole-blob MD5.
    #[arg(long)]
    pub no_md5: bool,

    /// Send an MD5 with every chunk.
    #[arg(long)]
    pub transactional_md5: bool,

    /// Skip all-zero page windows (page blobs only).
    #[arg(long)]
    pub sparse: bool,

    /// Write the committed blob content to this path.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Print the committed blob properties as JSON.
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging.
    #[arg(long, short = 'd')]
    pub debug: bool,

    /// Enable silent mode (minimal logging).
    #[arg(long, short = 's')]
    pub silent: bool,
}

impl From<&Args> for UploadOptions {
    fn from(args: &Args) -> Self {
        Self {
            concurrent_request_count: args.concurrency,
            stream_write_size_in_bytes: args.block_size,
            store_blob_content_md5: !args.no_md5 && !args.page_blob,
            use_transactional_content_md5: args.transactional_md5,
            sparse_page_write: args.sparse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_block_options_are_valid() {
        assert!(UploadOptions::default().validate(BlobType::BlockBlob).is_ok());
        assert!(UploadOptions::for_page_blob().validate(BlobType::PageBlob).is_ok());
    }

    #[test]
    fn test_page_blob_rejects_content_md5() {
        let err = UploadOptions::default()
            .validate(BlobType::PageBlob)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let err = UploadOptions::default()
            .with_concurrency(0)
            .validate(BlobType::BlockBlob)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OutOfRangeInput);
    }

    #[test]
    fn test_page_write_size_must_be_page_multiple() {
        let err = UploadOptions::for_page_blob()
            .with_write_size(1000)
            .validate(BlobType::PageBlob)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OutOfRangeInput);

        assert!(UploadOptions::for_page_blob()
            .with_write_size(1024)
            .validate(BlobType::PageBlob)
            .is_ok());
    }

    #[test]
    fn test_block_write_size_bounds() {
        assert!(UploadOptions::default()
            .with_write_size(4)
            .validate(BlobType::BlockBlob)
            .is_ok());
        assert!(UploadOptions::default()
            .with_write_size(MAX_BLOCK_SIZE as usize + 1)
            .validate(BlobType::BlockBlob)
            .is_err());
    }

    #[test]
    fn test_options_from_json() {
        let options: UploadOptions =
            serde_json::from_str(r#"{"concurrent_request_count": 8, "sparse_page_write": true}"#)
                .unwrap();
        assert_eq!(options.concurrent_request_count, 8);
        assert!(options.sparse_page_write);
        assert_eq!(options.stream_write_size_in_bytes, DEFAULT_STREAM_WRITE_SIZE);
    }

    #[test]
    fn test_args_to_options() {
        let args = Args::parse_from(["blobstream", "data.bin", "--page-blob", "-c", "4", "--sparse"]);
        let options = UploadOptions::from(&args);
        assert_eq!(options.concurrent_request_count, 4);
        assert!(!options.store_blob_content_md5);
        assert!(options.sparse_page_write);
    }
}
