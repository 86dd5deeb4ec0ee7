//! Error types for the secure store.

use thiserror::Error;

/// Result type for secure store operations.
pub type SecureStoreResult<T> = Result<T, SecureStoreError>;

/// Errors raised by the key hierarchy, the envelope cipher and the platform seams.
#[derive(Debug, Error, uniffi::Error)]
pub enum SecureStoreError {
    /// The hardware keystore cannot be reached or the master key alias is missing.
    #[error("keystore unavailable: {0}")]
    KeystoreUnavailable(String),

    /// The OS could not provide the requested cipher transform/provider pair.
    #[error("cipher mismatch: {0}")]
    CipherMismatch(String),

    /// The hardware security module cannot back the key pair on this device.
    ///
    /// Raised by [`crate::platform::HardwareKeystore::generate_key_pair`] and consumed by
    /// the master key provider, which retries without HSM backing.
    #[error("strongbox unavailable: {0}")]
    StrongBoxUnavailable(String),

    /// The wrapped data key could not be decrypted (keystore reset, reinstall, corruption).
    #[error("unwrap failure: {0}")]
    UnwrapFailure(String),

    /// A stored envelope is corrupt, truncated, or was sealed under another key.
    #[error("decryption failure: {0}")]
    DecryptionFailure(String),

    /// Errors coming from the key/value store.
    #[error("store error: {0}")]
    Store(String),

    /// Base64 or UTF-8 encoding failures outside of envelope decryption.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The configuration passed by the host could not be parsed.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The crypto worker stopped before answering.
    #[error("worker error: {0}")]
    Worker(String),

    /// Unexpected `UniFFI` callback error.
    #[error("unexpected uniffi callback error: {0}")]
    UnexpectedUniFFICallbackError(String),
}

impl SecureStoreError {
    /// Short, stable name of the error kind, used in boundary messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::KeystoreUnavailable(_) => "KeystoreUnavailable",
            Self::CipherMismatch(_) => "CipherMismatch",
            Self::StrongBoxUnavailable(_) => "StrongBoxUnavailable",
            Self::UnwrapFailure(_) => "UnwrapFailure",
            Self::DecryptionFailure(_) => "DecryptionFailure",
            Self::Store(_) => "Store",
            Self::Encoding(_) => "Encoding",
            Self::InvalidConfig(_) => "InvalidConfig",
            Self::Worker(_) => "Worker",
            Self::UnexpectedUniFFICallbackError(_) => "UnexpectedUniFFICallbackError",
        }
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for SecureStoreError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::UnexpectedUniFFICallbackError(error.reason)
    }
}

impl From<serde_json::Error> for SecureStoreError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidConfig(error.to_string())
    }
}
