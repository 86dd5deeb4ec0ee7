//! In-memory implementations of platform traits for testing.
//!
//! These implementations are NOT secure for production use. The keystore keeps
//! its "private" keys in process memory and uses a symmetric AEAD in place of
//! RSA; it only mirrors the observable contract of the OS keystore (aliases,
//! provider selection, HSM availability, wipe on reset).

#![allow(clippy::missing_panics_doc)]
#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    Key, XChaCha20Poly1305, XNonce,
};
use rand::{rngs::OsRng, RngCore};

use super::{HardwareKeystore, KeyValueStore, LocaleControl, Platform};
use crate::error::{SecureStoreError, SecureStoreResult};
use crate::keystore::{CipherTransform, KeyPairSpec};

const NONCE_SIZE: usize = 24;
const SUPPORTED_TRANSFORMATION: &str = "RSA/ECB/PKCS1Padding";

fn poisoned<T>(_: PoisonError<T>) -> SecureStoreError {
    SecureStoreError::Store("mutex poisoned".to_string())
}

// =============================================================================
// Memory Keystore
// =============================================================================

struct MemoryKeyEntry {
    key: [u8; 32],
    strongbox_backed: bool,
}

/// In-memory hardware keystore stand-in.
pub struct MemoryKeystore {
    entries: Mutex<HashMap<String, MemoryKeyEntry>>,
    supported_providers: Option<Vec<String>>,
    strongbox_available: bool,
    generated: Mutex<Vec<KeyPairSpec>>,
    observed_locale: Option<Arc<dyn LocaleControl>>,
    locales_at_generation: Mutex<Vec<String>>,
    fail_generation: Mutex<Option<String>>,
}

impl MemoryKeystore {
    /// Creates a keystore accepting every provider, with `StrongBox` available.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            supported_providers: None,
            strongbox_available: true,
            generated: Mutex::new(Vec::new()),
            observed_locale: None,
            locales_at_generation: Mutex::new(Vec::new()),
            fail_generation: Mutex::new(None),
        }
    }

    /// Restricts the cipher providers this keystore can hand out.
    #[must_use]
    pub fn with_providers(mut self, providers: &[&str]) -> Self {
        self.supported_providers = Some(providers.iter().map(ToString::to_string).collect());
        self
    }

    /// Makes every StrongBox-backed generation fail with `StrongBoxUnavailable`.
    #[must_use]
    pub const fn without_strongbox(mut self) -> Self {
        self.strongbox_available = false;
        self
    }

    /// Records the value of `locale` each time a key pair is generated.
    #[must_use]
    pub fn observing_locale(mut self, locale: Arc<dyn LocaleControl>) -> Self {
        self.observed_locale = Some(locale);
        self
    }

    /// Makes the next generation attempt fail with `KeystoreUnavailable`.
    pub fn fail_next_generation(&self, reason: &str) {
        *self
            .fail_generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(reason.to_string());
    }

    /// Wipes every key pair, as a factory reset or keystore corruption would.
    pub fn reset(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Specs of every successful generation, in order.
    #[must_use]
    pub fn generated_specs(&self) -> Vec<KeyPairSpec> {
        self.generated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Locale observed at each generation attempt.
    #[must_use]
    pub fn locales_at_generation(&self) -> Vec<String> {
        self.locales_at_generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the key pair under `alias` ended up HSM-backed.
    #[must_use]
    pub fn is_strongbox_backed(&self, alias: &str) -> Option<bool> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(alias)
            .map(|entry| entry.strongbox_backed)
    }

    fn check_transform(&self, transform: &CipherTransform) -> SecureStoreResult<()> {
        if transform.transformation != SUPPORTED_TRANSFORMATION {
            return Err(SecureStoreError::CipherMismatch(format!(
                "transformation not available: {}",
                transform.transformation
            )));
        }
        if let Some(providers) = &self.supported_providers {
            if !providers.contains(&transform.provider) {
                return Err(SecureStoreError::CipherMismatch(format!(
                    "provider not available: {}",
                    transform.provider
                )));
            }
        }
        Ok(())
    }

    fn cipher_for(&self, alias: &str) -> SecureStoreResult<XChaCha20Poly1305> {
        let key = self
            .entries
            .lock()
            .map_err(poisoned)?
            .get(alias)
            .map(|entry| entry.key)
            .ok_or_else(|| {
                SecureStoreError::KeystoreUnavailable(format!("no key found under alias: {alias}"))
            })?;
        Ok(XChaCha20Poly1305::new(Key::from_slice(&key)))
    }
}

impl Default for MemoryKeystore {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareKeystore for MemoryKeystore {
    fn contains_alias(&self, alias: String) -> SecureStoreResult<bool> {
        Ok(self.entries.lock().map_err(poisoned)?.contains_key(&alias))
    }

    fn generate_key_pair(&self, spec: KeyPairSpec) -> SecureStoreResult<()> {
        if let Some(locale) = &self.observed_locale {
            self.locales_at_generation
                .lock()
                .map_err(poisoned)?
                .push(locale.current_locale());
        }
        let injected_failure = self.fail_generation.lock().map_err(poisoned)?.take();
        if let Some(reason) = injected_failure {
            return Err(SecureStoreError::KeystoreUnavailable(reason));
        }
        if spec.strongbox_backed && !self.strongbox_available {
            return Err(SecureStoreError::StrongBoxUnavailable(
                "no StrongBox on this device".to_string(),
            ));
        }
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        self.entries.lock().map_err(poisoned)?.insert(
            spec.alias.clone(),
            MemoryKeyEntry {
                key,
                strongbox_backed: spec.strongbox_backed,
            },
        );
        self.generated.lock().map_err(poisoned)?.push(spec);
        Ok(())
    }

    fn public_encrypt(
        &self,
        alias: String,
        transform: CipherTransform,
        data: Vec<u8>,
    ) -> SecureStoreResult<Vec<u8>> {
        self.check_transform(&transform)?;
        let cipher = self.cipher_for(&alias)?;
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: &data,
                    aad: alias.as_bytes(),
                },
            )
            .map_err(|err| SecureStoreError::KeystoreUnavailable(err.to_string()))?;
        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn private_decrypt(
        &self,
        alias: String,
        transform: CipherTransform,
        data: Vec<u8>,
    ) -> SecureStoreResult<Vec<u8>> {
        self.check_transform(&transform)?;
        let cipher = self.cipher_for(&alias)?;
        if data.len() < NONCE_SIZE {
            return Err(SecureStoreError::UnwrapFailure(
                "keystore ciphertext too short".to_string(),
            ));
        }
        let (nonce, payload) = data.split_at(NONCE_SIZE);
        cipher
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: payload,
                    aad: alias.as_bytes(),
                },
            )
            .map_err(|err| SecureStoreError::UnwrapFailure(err.to_string()))
    }

    fn delete_entry(&self, alias: String) -> SecureStoreResult<()> {
        self.entries.lock().map_err(poisoned)?.remove(&alias);
        Ok(())
    }
}

// =============================================================================
// Memory Key/Value Store
// =============================================================================

/// In-memory record namespace backed by a `HashMap`.
pub struct MemoryKeyValueStore {
    records: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    /// Creates an empty namespace.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of records, including ones not written by the secure store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the namespace holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: String) -> SecureStoreResult<Option<String>> {
        Ok(self.records.read().map_err(poisoned)?.get(&key).cloned())
    }

    fn put(&self, key: String, value: String) -> SecureStoreResult<()> {
        self.records.write().map_err(poisoned)?.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: String) -> SecureStoreResult<()> {
        self.records.write().map_err(poisoned)?.remove(&key);
        Ok(())
    }

    fn entries(&self) -> SecureStoreResult<HashMap<String, String>> {
        Ok(self.records.read().map_err(poisoned)?.clone())
    }

    fn clear(&self) -> SecureStoreResult<()> {
        self.records.write().map_err(poisoned)?.clear();
        Ok(())
    }
}

// =============================================================================
// Memory Locale
// =============================================================================

/// Process locale stand-in.
pub struct MemoryLocale {
    tag: Mutex<String>,
}

impl MemoryLocale {
    /// Starts with `tag` as the default locale.
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            tag: Mutex::new(tag.to_string()),
        }
    }
}

impl LocaleControl for MemoryLocale {
    fn current_locale(&self) -> String {
        self.tag
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_locale(&self, tag: String) {
        *self.tag.lock().unwrap_or_else(PoisonError::into_inner) = tag;
    }
}

// =============================================================================
// Memory Platform
// =============================================================================

/// Platform bundle wiring the memory implementations together.
pub struct MemoryPlatform {
    keystore: Arc<MemoryKeystore>,
    locale: Arc<MemoryLocale>,
    namespaces: Mutex<HashMap<String, Arc<MemoryKeyValueStore>>>,
    package_identity: String,
    api_level: u32,
    os_release: String,
}

impl MemoryPlatform {
    /// Creates a platform for `package_identity` running at `api_level`.
    #[must_use]
    pub fn new(package_identity: &str, api_level: u32) -> Self {
        let locale = Arc::new(MemoryLocale::new("en-US"));
        let keystore = Arc::new(MemoryKeystore::new().observing_locale(locale.clone()));
        Self::with_parts(package_identity, api_level, keystore, locale)
    }

    /// Creates a platform around an explicitly configured keystore and locale.
    #[must_use]
    pub fn with_parts(
        package_identity: &str,
        api_level: u32,
        keystore: Arc<MemoryKeystore>,
        locale: Arc<MemoryLocale>,
    ) -> Self {
        Self {
            keystore,
            locale,
            namespaces: Mutex::new(HashMap::new()),
            package_identity: package_identity.to_string(),
            api_level,
            os_release: format!("api-{api_level}"),
        }
    }

    /// The concrete keystore, for assertions.
    #[must_use]
    pub fn memory_keystore(&self) -> Arc<MemoryKeystore> {
        self.keystore.clone()
    }

    /// The concrete locale, for assertions.
    #[must_use]
    pub fn memory_locale(&self) -> Arc<MemoryLocale> {
        self.locale.clone()
    }

    /// The concrete namespace `name`, created on first use.
    #[must_use]
    pub fn memory_namespace(&self, name: &str) -> Arc<MemoryKeyValueStore> {
        self.namespaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}

impl Platform for MemoryPlatform {
    fn keystore(&self) -> Arc<dyn HardwareKeystore> {
        self.keystore.clone()
    }

    fn namespace(&self, name: String) -> Arc<dyn KeyValueStore> {
        self.memory_namespace(&name)
    }

    fn locale(&self) -> Arc<dyn LocaleControl> {
        self.locale.clone()
    }

    fn package_identity(&self) -> String {
        self.package_identity.clone()
    }

    fn api_level(&self) -> u32 {
        self.api_level
    }

    fn os_release(&self) -> String {
        self.os_release.clone()
    }
}
