//! Key pair generation parameters.

use chrono::{DateTime, Months, Utc};

use super::capability::{CipherStrategy, KeySpecBuilder};
use crate::error::{SecureStoreError, SecureStoreResult};

/// Validity of the master key certificate, in years.
pub const KEY_VALIDITY_YEARS: u32 = 25;

/// Parameters of the master key pair, handed to [`crate::platform::HardwareKeystore`].
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct KeyPairSpec {
    /// Keystore alias.
    pub alias: String,
    /// Parameter style the platform must use.
    pub builder: KeySpecBuilder,
    /// Key algorithm, always `RSA`.
    pub algorithm: String,
    /// Certificate subject, `CN=<alias>`.
    pub subject: String,
    /// Certificate serial number.
    pub serial_number: u64,
    /// Certificate validity start, unix seconds.
    pub not_before: i64,
    /// Certificate validity end, unix seconds.
    pub not_after: i64,
    /// Whether the key may encrypt.
    pub purpose_encrypt: bool,
    /// Whether the key may decrypt.
    pub purpose_decrypt: bool,
    /// Allowed digest.
    pub digest: String,
    /// Allowed block mode.
    pub block_mode: String,
    /// Allowed encryption padding.
    pub encryption_padding: String,
    /// Whether the key must live in the hardware security module.
    pub strongbox_backed: bool,
}

impl KeyPairSpec {
    /// Builds the spec for `alias` valid from `now` for [`KEY_VALIDITY_YEARS`].
    ///
    /// # Errors
    ///
    /// Returns [`SecureStoreError::KeystoreUnavailable`] if the validity end overflows.
    pub fn new(
        alias: &str,
        strategy: &CipherStrategy,
        now: DateTime<Utc>,
    ) -> SecureStoreResult<Self> {
        let not_after = now
            .checked_add_months(Months::new(KEY_VALIDITY_YEARS * 12))
            .ok_or_else(|| {
                SecureStoreError::KeystoreUnavailable(
                    "key validity window out of range".to_string(),
                )
            })?;
        Ok(Self {
            alias: alias.to_string(),
            builder: strategy.builder,
            algorithm: "RSA".to_string(),
            subject: format!("CN={alias}"),
            serial_number: 1,
            not_before: now.timestamp(),
            not_after: not_after.timestamp(),
            purpose_encrypt: true,
            purpose_decrypt: true,
            digest: "SHA-256".to_string(),
            block_mode: "ECB".to_string(),
            encryption_padding: "PKCS1".to_string(),
            strongbox_backed: strategy.request_strongbox,
        })
    }

    /// Same parameters without HSM backing.
    #[must_use]
    pub fn without_strongbox(&self) -> Self {
        Self {
            strongbox_backed: false,
            ..self.clone()
        }
    }
}
