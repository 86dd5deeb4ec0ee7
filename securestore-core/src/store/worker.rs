//! Dedicated thread that owns the engine.
//!
//! Keystore operations block and the key generation path mutates the process
//! locale, so every engine call is queued onto one named thread and its result
//! handed back over a oneshot channel. Callers never block the thread they
//! submit from.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use tokio::sync::oneshot;

use super::engine::SecureStoreEngine;
use crate::error::{SecureStoreError, SecureStoreResult};

/// Name of the worker thread, visible in thread dumps.
pub const WORKER_THREAD_NAME: &str = "securestore.worker";

type Job = Box<dyn FnOnce(&mut SecureStoreEngine) + Send>;

/// Serial executor for [`SecureStoreEngine`] calls.
pub struct CryptoWorker {
    queue: Option<mpsc::Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl CryptoWorker {
    /// Moves `engine` onto a new worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`SecureStoreError::Worker`] if the thread cannot be spawned.
    pub fn spawn(mut engine: SecureStoreEngine) -> SecureStoreResult<Self> {
        let (queue, jobs) = mpsc::channel::<Job>();
        let thread = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                for job in jobs {
                    if catch_unwind(AssertUnwindSafe(|| job(&mut engine))).is_err() {
                        log::error!("secure store job panicked");
                    }
                }
                log::debug!("secure store worker stopped");
            })
            .map_err(|err| SecureStoreError::Worker(err.to_string()))?;
        Ok(Self {
            queue: Some(queue),
            thread: Some(thread),
        })
    }

    fn enqueue<T, F>(&self, job: F) -> SecureStoreResult<oneshot::Receiver<SecureStoreResult<T>>>
    where
        T: Send + 'static,
        F: FnOnce(&mut SecureStoreEngine) -> SecureStoreResult<T> + Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        let job: Job = Box::new(move |engine| {
            // The caller may have stopped waiting.
            let _ = reply.send(job(engine));
        });
        self.queue
            .as_ref()
            .ok_or_else(|| SecureStoreError::Worker("worker is shut down".to_string()))?
            .send(job)
            .map_err(|_| SecureStoreError::Worker("worker thread has exited".to_string()))?;
        Ok(result)
    }

    /// Runs `job` on the worker and awaits its result.
    ///
    /// # Errors
    ///
    /// Returns the job's own error, or [`SecureStoreError::Worker`] if the job
    /// could not run to completion.
    pub async fn submit<T, F>(&self, job: F) -> SecureStoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SecureStoreEngine) -> SecureStoreResult<T> + Send + 'static,
    {
        let result = self.enqueue(job)?;
        result
            .await
            .map_err(|_| SecureStoreError::Worker("job was dropped before completing".to_string()))?
    }

    /// Runs `job` on the worker and blocks the calling thread until it finishes.
    ///
    /// Must not be called from within an async runtime.
    #[cfg(test)]
    fn submit_blocking<T, F>(&self, job: F) -> SecureStoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SecureStoreEngine) -> SecureStoreResult<T> + Send + 'static,
    {
        self.enqueue(job)?
            .blocking_recv()
            .map_err(|_| SecureStoreError::Worker("job was dropped before completing".to_string()))?
    }
}

impl Drop for CryptoWorker {
    fn drop(&mut self) {
        // Closing the queue ends the worker loop once pending jobs drain.
        drop(self.queue.take());
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                log::error!("secure store worker panicked during shutdown");
            }
        }
    }
}
