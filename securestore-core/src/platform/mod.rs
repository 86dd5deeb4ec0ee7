//! Platform abstraction traits for the secure store.
//!
//! The engine never talks to the OS directly. The host application provides
//! implementations of these traits through `UniFFI`:
//!
//! - [`HardwareKeystore`]: the OS key store holding the asymmetric master key pair
//! - [`KeyValueStore`]: one namespace of persisted string records
//! - [`LocaleControl`]: the process default locale, overridden during key generation
//! - [`Platform`]: bundles the above with the package identity and OS version
//!
//! ## Android (Kotlin)
//! - `HardwareKeystore`: `AndroidKeyStore` via `KeyPairGenerator` and `Cipher`
//! - `KeyValueStore`: `SharedPreferences` opened in `MODE_PRIVATE`
//! - `LocaleControl`: `Locale.setDefault` plus the context configuration
//!
//! [`memory`] holds in-process implementations for tests.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SecureStoreResult;
use crate::keystore::{CipherTransform, KeyPairSpec};

pub mod memory;

/// Hardware-backed store of asymmetric key pairs.
///
/// Private key material never leaves the implementation; the engine only asks it
/// to transform bytes under a named alias.
#[uniffi::export(with_foreign)]
pub trait HardwareKeystore: Send + Sync {
    /// Returns whether a key pair exists under `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SecureStoreError::KeystoreUnavailable`] if the keystore cannot be loaded.
    fn contains_alias(&self, alias: String) -> SecureStoreResult<bool>;

    /// Generates a key pair described by `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SecureStoreError::StrongBoxUnavailable`] when `spec` requests HSM
    /// backing the device cannot provide. Other failures are reported as
    /// [`crate::SecureStoreError::KeystoreUnavailable`].
    fn generate_key_pair(&self, spec: KeyPairSpec) -> SecureStoreResult<()>;

    /// Encrypts `data` with the public key of `alias` using `transform`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SecureStoreError::CipherMismatch`] if the transform/provider pair
    /// cannot be obtained, or [`crate::SecureStoreError::KeystoreUnavailable`] if the alias
    /// has no certificate.
    fn public_encrypt(
        &self,
        alias: String,
        transform: CipherTransform,
        data: Vec<u8>,
    ) -> SecureStoreResult<Vec<u8>>;

    /// Decrypts `data` with the private key of `alias` using `transform`.
    ///
    /// # Errors
    ///
    /// Same as [`HardwareKeystore::public_encrypt`], plus
    /// [`crate::SecureStoreError::UnwrapFailure`] if the ciphertext does not decrypt.
    fn private_decrypt(
        &self,
        alias: String,
        transform: CipherTransform,
        data: Vec<u8>,
    ) -> SecureStoreResult<Vec<u8>>;

    /// Deletes the key pair under `alias`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SecureStoreError::KeystoreUnavailable`] if the keystore cannot be loaded.
    fn delete_entry(&self, alias: String) -> SecureStoreResult<()>;
}

/// One namespace of persisted string records.
#[uniffi::export(with_foreign)]
pub trait KeyValueStore: Send + Sync {
    /// Reads the record `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get(&self, key: String) -> SecureStoreResult<Option<String>>;

    /// Writes `value` under `key`, replacing any previous value. Must be durable on return.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn put(&self, key: String, value: String) -> SecureStoreResult<()>;

    /// Removes the record `key`. Removing a missing record is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn remove(&self, key: String) -> SecureStoreResult<()>;

    /// Returns every record in the namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace cannot be enumerated.
    fn entries(&self) -> SecureStoreResult<HashMap<String, String>>;

    /// Removes every record in the namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace cannot be cleared.
    fn clear(&self) -> SecureStoreResult<()>;
}

/// Process default locale.
#[uniffi::export(with_foreign)]
pub trait LocaleControl: Send + Sync {
    /// Returns the current default locale as a BCP 47 tag.
    fn current_locale(&self) -> String;

    /// Replaces the default locale.
    fn set_locale(&self, tag: String);
}

/// Provider responsible for the platform-specific components.
#[uniffi::export(with_foreign)]
pub trait Platform: Send + Sync {
    /// Returns the hardware keystore.
    fn keystore(&self) -> Arc<dyn HardwareKeystore>;

    /// Opens the record namespace `name`.
    fn namespace(&self, name: String) -> Arc<dyn KeyValueStore>;

    /// Returns the locale control.
    fn locale(&self) -> Arc<dyn LocaleControl>;

    /// Returns the application package identity (e.g. `com.example.app`).
    fn package_identity(&self) -> String;

    /// Returns the OS API level used to select cipher workarounds.
    fn api_level(&self) -> u32;

    /// Returns the human-readable OS release (e.g. `14`).
    fn os_release(&self) -> String;
}
