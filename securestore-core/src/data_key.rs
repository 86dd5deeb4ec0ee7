//! Data key resolution.
//!
//! The data key is a per-install AES-128 key. Its raw form only ever lives in
//! process memory; at rest it is wrapped by the master key and stored base64
//! encoded under a fixed record name. Resolution happens once per process:
//!
//! ```text
//! Uninitialized ──(legacy record moved)──► Migrated ──► Resolved
//! Uninitialized ─────────────────────────────────────► Resolved
//!                                     (unwrap fails) └► Degraded
//! ```
//!
//! `Resolved` and `Degraded` are terminal. A resolution that fails before
//! reaching them (keystore unavailable, store write error) leaves the manager
//! where it was so the next call retries.

use std::sync::{Arc, Mutex};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::config::UnwrapFailurePolicy;
use crate::envelope::decode_base64;
use crate::error::{SecureStoreError, SecureStoreResult};
use crate::keystore::{KeyAlgorithm, MasterKeyProvider, SecretKey};
use crate::platform::KeyValueStore;

/// Length of the data key in bytes.
pub const DATA_KEY_SIZE: usize = 16;

/// In-memory AES-128 data key. Zeroized on drop.
pub struct DataKey(Zeroizing<[u8; DATA_KEY_SIZE]>);

impl DataKey {
    /// Draws a fresh key from the OS CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; DATA_KEY_SIZE]);
        OsRng.fill_bytes(&mut key[..]);
        Self(key)
    }

    /// Builds a key from unwrapped material.
    ///
    /// # Errors
    ///
    /// Returns [`SecureStoreError::UnwrapFailure`] if the material is not an AES-128 key.
    pub fn from_secret(secret: &SecretKey) -> SecureStoreResult<Self> {
        if secret.algorithm() != KeyAlgorithm::Aes {
            return Err(SecureStoreError::UnwrapFailure(format!(
                "unexpected key algorithm {}",
                secret.algorithm().name()
            )));
        }
        let bytes: [u8; DATA_KEY_SIZE] = secret.material().try_into().map_err(|_| {
            SecureStoreError::UnwrapFailure(format!(
                "data key length mismatch: expected {DATA_KEY_SIZE}, got {}",
                secret.material().len()
            ))
        })?;
        Ok(Self(Zeroizing::new(bytes)))
    }

    /// Raw key bytes. Treat as sensitive material.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; DATA_KEY_SIZE] {
        &self.0
    }

    /// First 8 bytes of `SHA-256(key)`, hex encoded. Safe to log.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.0[..]);
        hex::encode(&digest[..8])
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DataKey").field(&self.fingerprint()).finish()
    }
}

/// Where the active data key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum KeyOrigin {
    /// Generated in this process and persisted wrapped.
    Generated,
    /// Unwrapped from the persisted record.
    Unwrapped,
    /// Unpersisted random key used after an unwrap failure.
    Ephemeral,
}

/// Per-process resolution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum DataKeyState {
    /// Nothing resolved yet.
    Uninitialized,
    /// A legacy key record was moved into place; not resolved yet.
    Migrated,
    /// A durable key is active.
    Resolved,
    /// An ephemeral key is active; previously stored values are unreadable.
    Degraded,
}

/// The active data key and its origin.
#[derive(Debug)]
pub struct ResolvedDataKey {
    key: DataKey,
    origin: KeyOrigin,
}

impl ResolvedDataKey {
    /// The key.
    #[must_use]
    pub const fn key(&self) -> &DataKey {
        &self.key
    }

    /// Where the key came from.
    #[must_use]
    pub const fn origin(&self) -> KeyOrigin {
        self.origin
    }
}

struct ManagerState {
    state: DataKeyState,
    ephemeral: Option<DataKey>,
    resolved: Option<Arc<ResolvedDataKey>>,
}

/// Resolves the per-install data key exactly once per process.
pub struct DataKeyManager {
    master: MasterKeyProvider,
    store: Arc<dyn KeyValueStore>,
    record: String,
    policy: UnwrapFailurePolicy,
    inner: Mutex<ManagerState>,
}

impl DataKeyManager {
    /// Creates a manager reading and writing the wrapped key at `record` in `store`.
    ///
    /// The ephemeral fallback key is drawn here, before any keystore call.
    #[must_use]
    pub fn new(
        master: MasterKeyProvider,
        store: Arc<dyn KeyValueStore>,
        record: String,
        policy: UnwrapFailurePolicy,
    ) -> Self {
        Self {
            master,
            store,
            record,
            policy,
            inner: Mutex::new(ManagerState {
                state: DataKeyState::Uninitialized,
                ephemeral: Some(DataKey::generate()),
                resolved: None,
            }),
        }
    }

    /// Current resolution state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state mutex is poisoned.
    pub fn state(&self) -> SecureStoreResult<DataKeyState> {
        Ok(self.lock()?.state)
    }

    /// Records that a legacy key record was moved into place before resolution.
    ///
    /// # Errors
    ///
    /// Returns an error if the state mutex is poisoned.
    pub fn mark_migrated(&self) -> SecureStoreResult<()> {
        let mut inner = self.lock()?;
        if inner.state == DataKeyState::Uninitialized {
            inner.state = DataKeyState::Migrated;
        }
        drop(inner);
        Ok(())
    }

    /// Returns the active data key, resolving it on first use.
    ///
    /// If a wrapped key is stored it is unwrapped; otherwise a new key is generated,
    /// wrapped and persisted. When unwrapping fails the configured
    /// [`UnwrapFailurePolicy`] decides between the ephemeral key and an error.
    ///
    /// # Errors
    ///
    /// Returns keystore and store errors raised while generating or persisting a key,
    /// and [`SecureStoreError::UnwrapFailure`] under [`UnwrapFailurePolicy::FailClosed`].
    pub fn resolve_data_key(&self) -> SecureStoreResult<Arc<ResolvedDataKey>> {
        // The guard is held for the whole resolution so concurrent callers wait for it.
        self.resolve_locked(&mut *self.lock()?)
    }

    fn resolve_locked(
        &self,
        inner: &mut ManagerState,
    ) -> SecureStoreResult<Arc<ResolvedDataKey>> {
        if let Some(resolved) = &inner.resolved {
            return Ok(resolved.clone());
        }

        self.master.ensure_key_pair()?;

        let resolved = if let Some(stored) = self.store.get(self.record.clone())? {
            match self.unwrap_stored(&stored) {
                Ok(key) => {
                    log::debug!("unwrapped data key {}", key.fingerprint());
                    ResolvedDataKey {
                        key,
                        origin: KeyOrigin::Unwrapped,
                    }
                }
                Err(err) => match self.policy {
                    UnwrapFailurePolicy::Degrade => {
                        log::error!(
                            "unwrap data key failed ({err}); continuing with an ephemeral key, \
                             previously stored values are unreadable for this process"
                        );
                        let key = inner.ephemeral.take().unwrap_or_else(DataKey::generate);
                        ResolvedDataKey {
                            key,
                            origin: KeyOrigin::Ephemeral,
                        }
                    }
                    UnwrapFailurePolicy::FailClosed => {
                        log::error!("unwrap data key failed ({err}); refusing to continue");
                        return Err(err);
                    }
                },
            }
        } else {
            let key = self.generate_and_persist()?;
            log::info!("generated data key {}", key.fingerprint());
            ResolvedDataKey {
                key,
                origin: KeyOrigin::Generated,
            }
        };

        inner.state = match resolved.origin {
            KeyOrigin::Ephemeral => DataKeyState::Degraded,
            KeyOrigin::Generated | KeyOrigin::Unwrapped => DataKeyState::Resolved,
        };
        inner.ephemeral = None;
        let resolved = Arc::new(resolved);
        inner.resolved = Some(resolved.clone());
        Ok(resolved)
    }

    fn unwrap_stored(&self, stored: &str) -> SecureStoreResult<DataKey> {
        let wrapped = decode_base64(stored).map_err(|err| {
            SecureStoreError::UnwrapFailure(format!("wrapped key is not base64: {err}"))
        })?;
        let secret = self
            .master
            .unwrap(&wrapped, KeyAlgorithm::Aes)
            .map_err(|err| match err {
                SecureStoreError::UnwrapFailure(_) => err,
                other => SecureStoreError::UnwrapFailure(other.to_string()),
            })?;
        DataKey::from_secret(&secret)
    }

    fn generate_and_persist(&self) -> SecureStoreResult<DataKey> {
        let key = DataKey::generate();
        let wrapped = self.master.wrap(key.as_bytes())?;
        self.store.put(self.record.clone(), STANDARD.encode(wrapped))?;
        Ok(key)
    }

    fn lock(&self) -> SecureStoreResult<std::sync::MutexGuard<'_, ManagerState>> {
        self.inner
            .lock()
            .map_err(|_| SecureStoreError::Store("data key mutex poisoned".to_string()))
    }
}
