//! Block data models for block blobs.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ErrorCode, StorageError, StorageResult};

/// Maximum size of a single staged block.
pub const MAX_BLOCK_SIZE: u64 = 4 * 1024 * 1024;

/// Maximum decoded length of a block ID.
pub const MAX_BLOCK_ID_LENGTH: usize = 64;

/// Base64 encoded block identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(String);

impl BlockId {
    /// Validates an already encoded block ID: it must be base64 and decode
    /// to at most 64 bytes.
    pub fn from_base64(encoded: impl Into<String>) -> StorageResult<Self> {
        let encoded = encoded.into();
        let decoded = BASE64.decode(&encoded).map_err(|_| {
            StorageError::with_message(ErrorCode::InvalidBlockId, "Block ID must be base64 encoded")
        })?;
        if decoded.is_empty() || decoded.len() > MAX_BLOCK_ID_LENGTH {
            return Err(StorageError::with_message(
                ErrorCode::InvalidBlockId,
                "Block ID must be between 1 and 64 bytes when decoded",
            ));
        }
        Ok(Self(encoded))
    }

    /// Encodes raw bytes as a block ID.
    pub fn from_raw(raw: impl AsRef<[u8]>) -> StorageResult<Self> {
        Self::from_base64(BASE64.encode(raw.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-stream block ID generator.
///
/// Starts at a random sequence number and increments per block. IDs are
/// unique within one stream and all have the same encoded length.
#[derive(Debug, Clone)]
pub struct BlockIdSequence {
    next: u64,
}

impl BlockIdSequence {
    pub fn new() -> Self {
        Self::starting_at(rand::thread_rng().gen_range(0..u64::from(u32::MAX)))
    }

    pub fn starting_at(start: u64) -> Self {
        Self { next: start }
    }

    /// Returns the next block ID in the sequence.
    pub fn next_id(&mut self) -> BlockId {
        let id = BlockId(BASE64.encode(format!("Block_{:020}", self.next)));
        self.next = self.next.wrapping_add(1);
        id
    }
}

impl Default for BlockIdSequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Which block version the service picks when committing a block ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockSearchMode {
    /// Only the committed block list is searched.
    Committed,
    /// Only staged, uncommitted blocks are searched.
    Uncommitted,
    /// Uncommitted blocks are searched first, then committed ones.
    Latest,
}

impl BlockSearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockSearchMode::Committed => "Committed",
            BlockSearchMode::Uncommitted => "Uncommitted",
            BlockSearchMode::Latest => "Latest",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Committed" => Some(BlockSearchMode::Committed),
            "Uncommitted" => Some(BlockSearchMode::Uncommitted),
            "Latest" => Some(BlockSearchMode::Latest),
            _ => None,
        }
    }
}

/// One entry in a block list manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockListEntry {
    pub id: BlockId,
    pub mode: BlockSearchMode,
}

impl BlockListEntry {
    pub fn latest(id: BlockId) -> Self {
        Self {
            id,
            mode: BlockSearchMode::Latest,
        }
    }
}

/// Ordered block list committed to finalize a block blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockList {
    pub entries: Vec<BlockListEntry>,
}

impl BlockList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: BlockListEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the block IDs in list order.
    pub fn ids(&self) -> Vec<&BlockId> {
        self.entries.iter().map(|e| &e.id).collect()
    }
}

impl FromIterator<BlockListEntry> for BlockList {
    fn from_iter<I: IntoIterator<Item = BlockListEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
