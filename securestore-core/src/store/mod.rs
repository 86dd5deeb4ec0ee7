//! Secure store facade: engine, worker thread and the host object.

mod engine;
mod result;
mod storage;
mod worker;

pub use engine::SecureStoreEngine;
pub use result::{CallData, CallResult, CallStatus, DEGRADED_MESSAGE};
pub use storage::SecureStorage;
pub use worker::{CryptoWorker, WORKER_THREAD_NAME};
