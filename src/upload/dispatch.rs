//! Bounded dispatch of chunk transmissions.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, trace};

use super::fault::FaultCell;
use crate::error::{ErrorCode, StorageError, StorageResult};

/// Tracks in-flight transmissions for one stream.
///
/// At most `max_concurrency` tasks execute at once (one semaphore permit
/// each). Up to `2 * max_concurrency` may be queued before `submit` waits
/// for a completion.
#[derive(Debug)]
pub struct DispatchTracker {
    tasks: JoinSet<StorageResult<()>>,
    slots: Arc<Semaphore>,
    max_concurrency: usize,
    fault: Arc<FaultCell>,
}

impl DispatchTracker {
    pub fn new(max_concurrency: usize, fault: Arc<FaultCell>) -> Self {
        Self {
            tasks: JoinSet::new(),
            slots: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            fault,
        }
    }

    /// Number of submitted tasks not yet observed through `await_one`/`drain`.
    pub fn outstanding(&self) -> usize {
        self.tasks.len()
    }

    /// Queues `task`, first waiting for one completion if the queue is over
    /// its soft limit. A failure observed while waiting is returned and the
    /// task is not queued.
    pub async fn submit<F>(&mut self, task: F) -> StorageResult<()>
    where
        F: Future<Output = StorageResult<()>> + Send + 'static,
    {
        if self.tasks.len() > self.max_concurrency * 2 {
            trace!(outstanding = self.tasks.len(), "Dispatch queue full, waiting");
            self.await_one().await?;
        }

        let slots = Arc::clone(&self.slots);
        let fault = Arc::clone(&self.fault);
        self.tasks.spawn(async move {
            let _permit = match slots.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    let err = StorageError::with_message(
                        ErrorCode::InternalError,
                        "Dispatch slots were closed before the transmission started",
                    );
                    fault.record(err.clone());
                    return Err(err);
                }
            };
            task.await
        });
        Ok(())
    }

    /// Waits for one outstanding task and returns its outcome. Returns
    /// immediately when nothing is outstanding.
    pub async fn await_one(&mut self) -> StorageResult<()> {
        match self.tasks.join_next().await {
            Some(joined) => self.flatten(joined),
            None => Ok(()),
        }
    }

    /// Waits for every outstanding task. All tasks are awaited even after a
    /// failure; the first failure seen is returned.
    pub async fn drain(&mut self) -> StorageResult<()> {
        let pending = self.tasks.len();
        if pending > 0 {
            debug!(pending, "Draining outstanding transmissions");
        }

        let mut first_err = None;
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(err) = self.flatten(joined) {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn flatten(&self, joined: Result<StorageResult<()>, JoinError>) -> StorageResult<()> {
        match joined {
            Ok(result) => result,
            Err(join_err) => {
                let err = StorageError::with_message(
                    ErrorCode::InternalError,
                    format!("Transmission task did not complete: {}", join_err),
                );
                self.fault.record(err.clone());
                Err(err)
            }
        }
    }
}
