//! Write buffer that accumulates caller bytes into fixed-size chunks.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::{Bytes, BytesMut};
use md5::{Digest, Md5};

use crate::models::{align_down, align_up};

/// Part of a page window that has to be transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageWindow {
    /// Every byte in the window is zero; nothing needs to be sent.
    Skip,
    /// Send `start..end` of the chunk. Both bounds are page aligned
    /// relative to the chunk start, except `end` may equal the chunk length.
    Transmit { start: usize, end: usize },
}

/// A buffer handed off for transmission.
#[derive(Debug, Clone)]
pub struct BufferedChunk {
    pub data: Bytes,
    pub window: PageWindow,
}

/// Accumulates written bytes up to a threshold.
///
/// Optionally keeps a running MD5 over everything appended and, for
/// sparse page writes, the first and last non-zero byte since the last
/// hand-off.
#[derive(Debug)]
pub struct ChunkBuffer {
    data: BytesMut,
    threshold: usize,
    digest: Option<Md5>,
    track_sparse: bool,
    first_nonzero: Option<usize>,
    last_nonzero: Option<usize>,
}

impl ChunkBuffer {
    pub fn new(threshold: usize, compute_md5: bool, track_sparse: bool) -> Self {
        Self {
            data: BytesMut::with_capacity(threshold),
            threshold,
            digest: compute_md5.then(Md5::new),
            track_sparse,
            first_nonzero: None,
            last_nonzero: None,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.data.len() >= self.threshold
    }

    pub fn remaining(&self) -> usize {
        self.threshold - self.data.len()
    }

    /// Appends as much of `bytes` as fits below the threshold and returns
    /// the number of bytes accepted.
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let accepted = bytes.len().min(self.remaining());
        let bytes = &bytes[..accepted];
        if bytes.is_empty() {
            return 0;
        }

        if let Some(digest) = self.digest.as_mut() {
            digest.update(bytes);
        }

        if self.track_sparse {
            let base = self.data.len();
            if let Some(first) = bytes.iter().position(|&b| b != 0) {
                self.first_nonzero.get_or_insert(base + first);
                if let Some(last) = bytes.iter().rposition(|&b| b != 0) {
                    self.last_nonzero = Some(base + last);
                }
            }
        }

        self.data.extend_from_slice(bytes);
        accepted
    }

    /// Hands off the buffered bytes and starts a fresh buffer.
    pub fn take(&mut self) -> BufferedChunk {
        let fresh = BytesMut::with_capacity(self.threshold);
        let data = std::mem::replace(&mut self.data, fresh).freeze();
        let window = self.window_for(data.len());
        self.first_nonzero = None;
        self.last_nonzero = None;
        BufferedChunk { data, window }
    }

    fn window_for(&self, len: usize) -> PageWindow {
        if !self.track_sparse {
            return PageWindow::Transmit { start: 0, end: len };
        }
        match (self.first_nonzero, self.last_nonzero) {
            (Some(first), Some(last)) => {
                let start = align_down(first as u64) as usize;
                let end = (align_up(last as u64 + 1) as usize).min(len);
                PageWindow::Transmit { start, end }
            }
            _ => PageWindow::Skip,
        }
    }

    /// Finishes the whole-stream digest, returning it base64 encoded.
    /// Returns `None` when checksumming is disabled or already finished.
    pub fn finish_digest(&mut self) -> Option<String> {
        self.digest
            .take()
            .map(|digest| BASE64.encode(digest.finalize()))
    }
}
