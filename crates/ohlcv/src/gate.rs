//! Admission gate bounding concurrent fetch sequences.

use std::sync::Arc;

use ohlcv_core::{DataError, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting gate shared by the tasks of one download run.
///
/// Waiters are admitted in FIFO order. A holder keeps its slot until the
/// returned permit is dropped.
#[derive(Clone, Debug)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionGate {
    /// Create a gate with `capacity` slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Number of slots.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Waits for a free slot.
    pub async fn admit(&self) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|e| DataError::Other(format!("admission gate closed: {e}")))
    }
}
