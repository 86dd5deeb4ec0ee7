//! Host-facing secure storage object.

use std::sync::Arc;

use super::engine::SecureStoreEngine;
use super::result::{CallData, CallResult};
use super::worker::CryptoWorker;
use crate::config::StoreConfig;
use crate::data_key::DataKeyState;
use crate::error::SecureStoreResult;
use crate::platform::Platform;

/// Encrypted key/value storage for the embedding app.
///
/// Every method is queued onto a single worker thread and resolves to a
/// [`CallResult`]; none of them throws across the boundary. The first call
/// migrates the legacy key record and resolves the data key, generating the
/// master key pair if needed.
#[derive(uniffi::Object)]
pub struct SecureStorage {
    worker: CryptoWorker,
}

#[uniffi::export(async_runtime = "tokio")]
impl SecureStorage {
    /// Creates the store on top of the host `platform`.
    ///
    /// `config_json` overrides individual [`StoreConfig`] fields; `None` keeps the
    /// defaults, which read data written by earlier releases.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SecureStoreError::InvalidConfig`] for malformed configuration
    /// and [`crate::SecureStoreError::Worker`] if the worker thread cannot start.
    #[uniffi::constructor]
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(
        platform: Arc<dyn Platform>,
        config_json: Option<String>,
    ) -> SecureStoreResult<Self> {
        let config = match config_json {
            Some(json) => StoreConfig::from_json(&json)?,
            None => StoreConfig::default(),
        };
        Self::with_config(platform.as_ref(), config)
    }

    /// Encrypts `value` and stores it under `key`, replacing any previous value.
    pub async fn write(&self, key: String, value: String) -> CallResult {
        self.call("write", move |engine| engine.write(&key, &value), |()| None).await
    }

    /// Reads the value under `key`. A missing key succeeds with no data.
    pub async fn read(&self, key: String) -> CallResult {
        self.call(
            "read",
            move |engine| engine.read(&key),
            |value| value.map(|value| CallData::Text { value }),
        )
        .await
    }

    /// Reads every stored value.
    pub async fn read_all(&self) -> CallResult {
        self.call("readAll", SecureStoreEngine::read_all, |entries| {
            Some(CallData::Entries { entries })
        })
        .await
    }

    /// Removes the value under `key`.
    pub async fn delete(&self, key: String) -> CallResult {
        self.call("delete", move |engine| engine.delete(&key), |()| None).await
    }

    /// Removes every stored value. The data key is kept.
    pub async fn delete_all(&self) -> CallResult {
        self.call("deleteAll", SecureStoreEngine::delete_all, |()| None).await
    }

    /// Reports the OS version, e.g. `"Android 14"`.
    pub async fn platform_version(&self) -> CallResult {
        self.call(
            "getPlatformVersion",
            |engine| Ok(engine.platform_version()),
            |value| Some(CallData::Text { value }),
        )
        .await
    }

    /// Current data key state, for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SecureStoreError::Worker`] if the worker has stopped.
    pub async fn key_state(&self) -> SecureStoreResult<DataKeyState> {
        self.worker.submit(|engine| engine.key_state()).await
    }
}

impl SecureStorage {
    /// Creates the store from an already parsed configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SecureStoreError::Worker`] if the worker thread cannot start.
    pub fn with_config(platform: &dyn Platform, config: StoreConfig) -> SecureStoreResult<Self> {
        log::debug!(
            "opening secure storage at api level {} for {}",
            platform.api_level(),
            platform.package_identity()
        );
        let engine = SecureStoreEngine::new(platform, config);
        Ok(Self {
            worker: CryptoWorker::spawn(engine)?,
        })
    }

    /// Runs `job` on the worker and folds its outcome into a reply. A success
    /// served by an in-memory data key reports [`crate::DEGRADED_MESSAGE`].
    async fn call<T, F, D>(&self, method: &str, job: F, data: D) -> CallResult
    where
        T: Send + 'static,
        F: FnOnce(&mut SecureStoreEngine) -> SecureStoreResult<T> + Send + 'static,
        D: FnOnce(T) -> Option<CallData>,
    {
        let outcome = self
            .worker
            .submit(move |engine| {
                let value = job(engine)?;
                Ok((value, engine.key_state()? == DataKeyState::Degraded))
            })
            .await;
        let degraded = matches!(outcome, Ok((_, true)));
        CallResult::from_outcome(method, outcome.map(|(value, _)| data(value)))
            .with_degraded_key(degraded)
    }
}
