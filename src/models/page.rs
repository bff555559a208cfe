//! Page blob data models.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, StorageError, StorageResult};

/// Page blob constants.
pub const PAGE_SIZE: u64 = 512;
pub const MAX_PAGE_RANGE_SIZE: u64 = 4 * 1024 * 1024; // 4 MiB per write operation

/// A range of pages in a page blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    /// Start byte offset (inclusive).
    pub start: u64,
    /// End byte offset (inclusive).
    pub end: u64,
}

impl PageRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Builds the inclusive range covering `length` bytes from `offset`.
    /// `length` must be non-zero.
    pub fn from_offset(offset: u64, length: u64) -> Self {
        Self {
            start: offset,
            end: offset + length - 1,
        }
    }

    /// Returns the length of this page range.
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Validates a page write or clear request before it reaches the transport.
///
/// The offset and length must both be multiples of [`PAGE_SIZE`], the
/// length must be non-zero and no larger than [`MAX_PAGE_RANGE_SIZE`], and
/// the range must end within the addressable offset space.
pub fn validate_page_range(offset: u64, length: u64) -> StorageResult<PageRange> {
    if offset % PAGE_SIZE != 0 {
        return Err(StorageError::with_message(
            ErrorCode::InvalidPageRange,
            format!("Page offset {} must be aligned to 512 bytes", offset),
        ));
    }
    if length == 0 || length % PAGE_SIZE != 0 {
        return Err(StorageError::with_message(
            ErrorCode::InvalidPageRange,
            format!("Page range length {} must be a non-zero multiple of 512 bytes", length),
        ));
    }
    if length > MAX_PAGE_RANGE_SIZE {
        return Err(StorageError::with_message(
            ErrorCode::RequestBodyTooLarge,
            format!(
                "Page range length {} exceeds the maximum of {} bytes",
                length, MAX_PAGE_RANGE_SIZE
            ),
        ));
    }
    if offset.checked_add(length).is_none() {
        return Err(StorageError::with_message(
            ErrorCode::OutOfRangeInput,
            format!("Page range at offset {} with length {} overflows", offset, length),
        ));
    }
    Ok(PageRange::from_offset(offset, length))
}

/// Rounds `value` down to a page boundary.
pub fn align_down(value: u64) -> u64 {
    value - value % PAGE_SIZE
}

/// Rounds `value` up to a page boundary.
pub fn align_up(value: u64) -> u64 {
    match value % PAGE_SIZE {
        0 => value,
        rem => value + (PAGE_SIZE - rem),
    }
}
