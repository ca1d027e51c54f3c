//! Background execution of a whole batch.
//!
//! A job runs to completion on the rayon pool and reports exactly one
//! outcome. There is no progress streaming and no cancellation.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, TryRecvError};

use log::{debug, error};

use crate::error::{Error, Result};

/// Handle to a running batch.
pub struct BatchHandle<T> {
    rx: Receiver<Result<T>>,
}

impl<T> BatchHandle<T> {
    /// Blocks until the job reports.
    pub fn wait(self) -> Result<T> {
        self.rx.recv().unwrap_or(Err(Error::WorkerLost))
    }

    /// Non-blocking poll: `None` while the job is still running.
    pub fn try_outcome(&self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(Error::WorkerLost)),
        }
    }
}

/// Runs `job` in the background. A panicking job is reported as
/// [`Error::WorkerLost`].
pub fn spawn_batch<T, F>(job: F) -> BatchHandle<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    rayon::spawn(move || {
        let outcome = panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|_| {
            error!("worker: batch job panicked");
            Err(Error::WorkerLost)
        });
        if tx.send(outcome).is_err() {
            debug!("worker: caller dropped the handle before the result arrived");
        }
    });
    BatchHandle { rx }
}
