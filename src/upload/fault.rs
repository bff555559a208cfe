//! Sticky first-fault cell shared between a stream and its workers.

use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::error::{ErrorCode, StorageError, StorageResult};

/// Holds the first error observed by a stream session.
///
/// Setting is first-writer-wins: later faults are logged and dropped.
#[derive(Debug, Default)]
pub struct FaultCell {
    fault: OnceLock<StorageError>,
}

impl FaultCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `err` if no fault is set yet. Returns true when `err` became
    /// the session fault.
    pub fn record(&self, err: StorageError) -> bool {
        let code = err.code;
        match self.fault.set(err) {
            Ok(()) => {
                if code != ErrorCode::StreamClosed {
                    warn!(code = code.as_str(), "Upload stream faulted");
                }
                true
            }
            Err(dropped) => {
                debug!("Discarding secondary fault: {}", dropped);
                false
            }
        }
    }

    /// Marks the session closed so later calls observe a closed stream.
    pub fn mark_closed(&self) {
        self.record(StorageError::new(ErrorCode::StreamClosed));
    }

    pub fn get(&self) -> Option<&StorageError> {
        self.fault.get()
    }

    pub fn is_faulted(&self) -> bool {
        self.fault.get().is_some()
    }

    /// Re-raises the stored fault, if any.
    pub fn check(&self) -> StorageResult<()> {
        match self.fault.get() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
