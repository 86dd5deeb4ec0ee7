//! Master key provider.
//!
//! Owns the hardware-backed RSA key pair that wraps the data key. The pair is
//! created once per install under a deterministic alias and is never exported;
//! every operation is delegated to the [`HardwareKeystore`] with the transform
//! chosen by the [`CipherStrategy`].

use std::sync::Arc;

use chrono::Utc;
use zeroize::Zeroizing;

use super::capability::CipherStrategy;
use super::locale::{LocaleGuard, KEYGEN_LOCALE};
use super::spec::KeyPairSpec;
use crate::error::{SecureStoreError, SecureStoreResult};
use crate::platform::{HardwareKeystore, LocaleControl, Platform};

/// Algorithm of an unwrapped secret key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// AES-128.
    Aes,
}

impl KeyAlgorithm {
    /// Raw key length in bytes.
    #[must_use]
    pub const fn key_len(self) -> usize {
        match self {
            Self::Aes => 16,
        }
    }

    /// JCA algorithm name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Aes => "AES",
        }
    }
}

/// Raw secret key material recovered by [`MasterKeyProvider::unwrap`].
pub struct SecretKey {
    algorithm: KeyAlgorithm,
    material: Zeroizing<Vec<u8>>,
}

impl SecretKey {
    /// The algorithm hint the key was unwrapped for.
    #[must_use]
    pub const fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// Raw key bytes. Treat as sensitive material.
    #[must_use]
    pub fn material(&self) -> &[u8] {
        &self.material
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Outcome of [`MasterKeyProvider::ensure_key_pair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPairStatus {
    /// The alias already held a key pair.
    Existing,
    /// A key pair was generated during this call.
    Generated {
        /// Whether the new pair is backed by the hardware security module.
        strongbox_backed: bool,
    },
}

/// Hardware-backed asymmetric key pair used only to wrap and unwrap the data key.
pub struct MasterKeyProvider {
    keystore: Arc<dyn HardwareKeystore>,
    locale: Arc<dyn LocaleControl>,
    alias: String,
    strategy: CipherStrategy,
}

impl std::fmt::Debug for MasterKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKeyProvider")
            .field("alias", &self.alias)
            .field("tier", &self.strategy.tier)
            .finish_non_exhaustive()
    }
}

impl MasterKeyProvider {
    /// Creates a provider from explicit components.
    #[must_use]
    pub const fn new(
        keystore: Arc<dyn HardwareKeystore>,
        locale: Arc<dyn LocaleControl>,
        alias: String,
        strategy: CipherStrategy,
    ) -> Self {
        Self {
            keystore,
            locale,
            alias,
            strategy,
        }
    }

    /// Creates a provider for the running platform, resolving the alias and the
    /// cipher strategy once.
    #[must_use]
    pub fn from_platform(platform: &dyn Platform, alias_suffix: &str) -> Self {
        let alias = Self::alias_for(&platform.package_identity(), alias_suffix);
        let strategy = CipherStrategy::for_api_level(platform.api_level());
        log::debug!(
            "master key alias {alias}, capability tier {} (api {})",
            strategy.tier,
            platform.api_level()
        );
        Self::new(platform.keystore(), platform.locale(), alias, strategy)
    }

    /// Derives the keystore alias from the package identity.
    #[must_use]
    pub fn alias_for(package_identity: &str, suffix: &str) -> String {
        format!("{package_identity}.{suffix}")
    }

    /// The keystore alias of the key pair.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Creates the key pair if the alias is empty. Idempotent.
    ///
    /// HSM backing is requested first on capable devices; if the device reports it
    /// unavailable the pair is generated again without it. The default locale is
    /// forced to English for the whole generation and restored afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`SecureStoreError::KeystoreUnavailable`] if the keystore cannot be read
    /// or generation fails.
    pub fn ensure_key_pair(&self) -> SecureStoreResult<KeyPairStatus> {
        if self.keystore.contains_alias(self.alias.clone())? {
            return Ok(KeyPairStatus::Existing);
        }

        log::info!("creating master key pair {}", self.alias);
        let _locale = LocaleGuard::set(self.locale.clone(), KEYGEN_LOCALE);
        let spec = KeyPairSpec::new(&self.alias, &self.strategy, Utc::now())?;
        let strongbox_requested = spec.strongbox_backed;
        match self.keystore.generate_key_pair(spec.clone()) {
            Ok(()) => Ok(KeyPairStatus::Generated {
                strongbox_backed: strongbox_requested,
            }),
            Err(SecureStoreError::StrongBoxUnavailable(reason)) if strongbox_requested => {
                log::warn!("StrongBox unavailable ({reason}), generating without it");
                self.keystore.generate_key_pair(spec.without_strongbox())?;
                Ok(KeyPairStatus::Generated {
                    strongbox_backed: false,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Deletes the key pair. Every wrapped key becomes unrecoverable.
    ///
    /// # Errors
    ///
    /// Returns an error if the keystore refuses the deletion.
    pub fn delete_key_pair(&self) -> SecureStoreResult<()> {
        log::warn!("deleting master key pair {}", self.alias);
        self.keystore.delete_entry(self.alias.clone())
    }

    /// Wraps raw key material with the public key.
    ///
    /// # Errors
    ///
    /// Returns [`SecureStoreError::Encoding`] for empty input,
    /// [`SecureStoreError::KeystoreUnavailable`] if the key pair is missing and
    /// [`SecureStoreError::CipherMismatch`] if the transform cannot be obtained.
    pub fn wrap(&self, raw_key: &[u8]) -> SecureStoreResult<Vec<u8>> {
        if raw_key.is_empty() {
            return Err(SecureStoreError::Encoding(
                "refusing to wrap an empty key".to_string(),
            ));
        }
        self.encrypt(raw_key)
    }

    /// Unwraps key material with the private key and checks it fits `algorithm`.
    ///
    /// # Errors
    ///
    /// Same as [`MasterKeyProvider::wrap`], plus [`SecureStoreError::UnwrapFailure`] if
    /// the wrapped bytes do not decrypt to a key of the expected length.
    pub fn unwrap(
        &self,
        wrapped: &[u8],
        algorithm: KeyAlgorithm,
    ) -> SecureStoreResult<SecretKey> {
        let material = Zeroizing::new(self.decrypt(wrapped)?);
        if material.len() != algorithm.key_len() {
            return Err(SecureStoreError::UnwrapFailure(format!(
                "{} key length mismatch: expected {}, got {}",
                algorithm.name(),
                algorithm.key_len(),
                material.len()
            )));
        }
        Ok(SecretKey {
            algorithm,
            material,
        })
    }

    /// Encrypts `input` with the public key.
    ///
    /// # Errors
    ///
    /// Same as [`MasterKeyProvider::wrap`].
    pub fn encrypt(&self, input: &[u8]) -> SecureStoreResult<Vec<u8>> {
        self.require_key_pair()?;
        self.keystore.public_encrypt(
            self.alias.clone(),
            self.strategy.transform.clone(),
            input.to_vec(),
        )
    }

    /// Decrypts `input` with the private key.
    ///
    /// # Errors
    ///
    /// Same as [`MasterKeyProvider::unwrap`].
    pub fn decrypt(&self, input: &[u8]) -> SecureStoreResult<Vec<u8>> {
        self.require_key_pair()?;
        self.keystore.private_decrypt(
            self.alias.clone(),
            self.strategy.transform.clone(),
            input.to_vec(),
        )
    }

    fn require_key_pair(&self) -> SecureStoreResult<()> {
        if self.keystore.contains_alias(self.alias.clone())? {
            Ok(())
        } else {
            Err(SecureStoreError::KeystoreUnavailable(format!(
                "no key found under alias: {}",
                self.alias
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::CapabilityTier;
    use crate::platform::memory::{MemoryKeystore, MemoryLocale, MemoryPlatform};
    use rand::{rngs::OsRng, RngCore};

    const PACKAGE: &str = "com.actionpay.app";

    fn provider_on(platform: &MemoryPlatform) -> MasterKeyProvider {
        MasterKeyProvider::from_platform(platform, "FlutterSecureStoragePluginKey")
    }

    #[test]
    fn test_alias_is_derived_from_package() {
        let platform = MemoryPlatform::new(PACKAGE, 30);
        let provider = provider_on(&platform);
        assert_eq!(
            provider.alias(),
            "com.actionpay.app.FlutterSecureStoragePluginKey"
        );
    }

    #[test]
    fn test_ensure_key_pair_is_idempotent() {
        let platform = MemoryPlatform::new(PACKAGE, 26);
        let provider = provider_on(&platform);
        assert_eq!(
            provider.ensure_key_pair().expect("ensure"),
            KeyPairStatus::Generated {
                strongbox_backed: false
            }
        );
        assert_eq!(
            provider.ensure_key_pair().expect("ensure"),
            KeyPairStatus::Existing
        );
        assert_eq!(platform.memory_keystore().generated_specs().len(), 1);
    }

    #[test]
    fn test_strongbox_requested_on_capable_tier() {
        let platform = MemoryPlatform::new(PACKAGE, 33);
        let provider = provider_on(&platform);
        assert_eq!(
            provider.ensure_key_pair().expect("ensure"),
            KeyPairStatus::Generated {
                strongbox_backed: true
            }
        );
        assert_eq!(
            platform.memory_keystore().is_strongbox_backed(provider.alias()),
            Some(true)
        );
    }

    #[test]
    fn test_strongbox_unavailable_falls_back() {
        let locale = Arc::new(MemoryLocale::new("en-US"));
        let keystore = Arc::new(MemoryKeystore::new().without_strongbox());
        let platform = MemoryPlatform::with_parts(PACKAGE, 31, keystore.clone(), locale);
        let provider = provider_on(&platform);

        assert_eq!(
            provider.ensure_key_pair().expect("ensure"),
            KeyPairStatus::Generated {
                strongbox_backed: false
            }
        );
        let specs = keystore.generated_specs();
        assert_eq!(specs.len(), 1);
        assert!(!specs[0].strongbox_backed);
        assert_eq!(specs[0].digest, "SHA-256");
        assert_eq!(specs[0].block_mode, "ECB");
        assert_eq!(specs[0].encryption_padding, "PKCS1");
    }

    #[test]
    fn test_keygen_runs_under_english_locale_and_restores() {
        let locale = Arc::new(MemoryLocale::new("fa-IR"));
        let keystore = Arc::new(MemoryKeystore::new().observing_locale(locale.clone()));
        let platform = MemoryPlatform::with_parts(PACKAGE, 29, keystore.clone(), locale.clone());

        provider_on(&platform).ensure_key_pair().expect("ensure");

        assert_eq!(keystore.locales_at_generation(), vec!["en".to_string()]);
        assert_eq!(locale.current_locale(), "fa-IR");
    }

    #[test]
    fn test_locale_restored_when_generation_fails() {
        let locale = Arc::new(MemoryLocale::new("th-TH"));
        let keystore = Arc::new(MemoryKeystore::new());
        keystore.fail_next_generation("keystore daemon died");
        let platform = MemoryPlatform::with_parts(PACKAGE, 25, keystore, locale.clone());

        match provider_on(&platform).ensure_key_pair() {
            Err(SecureStoreError::KeystoreUnavailable(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(locale.current_locale(), "th-TH");
    }

    #[test]
    fn test_wrap_unwrap_round_trip() {
        let platform = MemoryPlatform::new(PACKAGE, 30);
        let provider = provider_on(&platform);
        provider.ensure_key_pair().expect("ensure");

        let mut raw = [0u8; 16];
        OsRng.fill_bytes(&mut raw);
        let wrapped = provider.wrap(&raw).expect("wrap");
        assert_ne!(wrapped.as_slice(), raw.as_slice());

        let key = provider.unwrap(&wrapped, KeyAlgorithm::Aes).expect("unwrap");
        assert_eq!(key.material(), raw.as_slice());
        assert_eq!(key.algorithm(), KeyAlgorithm::Aes);
    }

    #[test]
    fn test_unwrap_rejects_wrong_length() {
        let platform = MemoryPlatform::new(PACKAGE, 30);
        let provider = provider_on(&platform);
        provider.ensure_key_pair().expect("ensure");

        let wrapped = provider.encrypt(&[7u8; 32]).expect("encrypt");
        match provider.unwrap(&wrapped, KeyAlgorithm::Aes) {
            Err(SecureStoreError::UnwrapFailure(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_wrap_rejects_empty_key() {
        let platform = MemoryPlatform::new(PACKAGE, 30);
        let provider = provider_on(&platform);
        provider.ensure_key_pair().expect("ensure");
        match provider.wrap(&[]) {
            Err(SecureStoreError::Encoding(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_operations_without_key_pair_fail() {
        let platform = MemoryPlatform::new(PACKAGE, 30);
        let provider = provider_on(&platform);
        match provider.wrap(&[1u8; 16]) {
            Err(SecureStoreError::KeystoreUnavailable(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_wrong_tier_provider_is_a_cipher_mismatch() {
        // A modern device without the legacy OpenSSL path.
        let keystore = Arc::new(
            MemoryKeystore::new().with_providers(&["AndroidKeyStoreBCWorkaround"]),
        );
        let locale = Arc::new(MemoryLocale::new("en-US"));
        let platform = MemoryPlatform::with_parts(PACKAGE, 30, keystore.clone(), locale.clone());
        let provider = provider_on(&platform);
        provider.ensure_key_pair().expect("ensure");
        provider.wrap(&[1u8; 16]).expect("modern transform works");

        let legacy = MasterKeyProvider::new(
            keystore,
            locale,
            provider.alias().to_string(),
            CipherStrategy::for_tier(CapabilityTier::Legacy),
        );
        match legacy.wrap(&[1u8; 16]) {
            Err(SecureStoreError::CipherMismatch(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_delete_key_pair() {
        let platform = MemoryPlatform::new(PACKAGE, 30);
        let provider = provider_on(&platform);
        provider.ensure_key_pair().expect("ensure");
        provider.delete_key_pair().expect("delete");
        assert_eq!(
            provider.ensure_key_pair().expect("ensure"),
            KeyPairStatus::Generated {
                strongbox_backed: true
            }
        );
    }
}
