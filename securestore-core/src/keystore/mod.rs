//! Hardware-backed master key: capability table, generation parameters and the provider.

mod capability;
mod locale;
mod provider;
mod spec;

pub use capability::{
    CapabilityTier, CipherStrategy, CipherTransform, KeySpecBuilder, API_LEVEL_M, API_LEVEL_P,
};
pub use locale::{LocaleGuard, KEYGEN_LOCALE};
pub use provider::{KeyAlgorithm, KeyPairStatus, MasterKeyProvider, SecretKey};
pub use spec::{KeyPairSpec, KEY_VALIDITY_YEARS};
