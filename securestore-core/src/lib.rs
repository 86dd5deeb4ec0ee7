#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Hardware-backed envelope encryption for small on-device secrets.
//!
//! Values are sealed with AES-128-CBC under a random data key. The data key is
//! persisted only in wrapped form, encrypted by an RSA key pair that lives in
//! the OS hardware keystore. The host provides the keystore, the persisted
//! namespaces and the locale through the [`Platform`] trait and talks to
//! [`SecureStorage`].

mod config;
pub use config::*;

mod data_key;
pub use data_key::{
    DataKey, DataKeyManager, DataKeyState, KeyOrigin, ResolvedDataKey, DATA_KEY_SIZE,
};

mod envelope;
pub use envelope::{EnvelopeCipher, IV_SIZE};

mod error;
pub use error::*;

pub mod keystore;

pub mod logger;

mod migration;
pub use migration::{LegacyKeyMigrator, MigrationOutcome};

pub mod platform;
pub use platform::{HardwareKeystore, KeyValueStore, LocaleControl, Platform};

mod store;
pub use store::*;

uniffi::setup_scaffolding!("securestore_core");
