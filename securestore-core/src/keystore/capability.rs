//! OS capability tiers and the cipher workaround table.
//!
//! Known keystore defects make each transform/provider pair fail on the other
//! tier, so the pair is looked up once from the API level instead of being
//! decided at every call site:
//!
//! - API < 23: `AndroidKeyStoreBCWorkaround` is not registered
//!   (`NoSuchProviderException`).
//! - API >= 23: `AndroidOpenSSL` rejects keystore-backed keys
//!   (`InvalidKeyException: Need RSA private or public key`).

use strum::Display;

/// First API level with `KeyGenParameterSpec` and the keystore BC workaround provider.
pub const API_LEVEL_M: u32 = 23;
/// First API level with `StrongBox`-backed key generation.
pub const API_LEVEL_P: u32 = 28;

const RSA_TRANSFORMATION: &str = "RSA/ECB/PKCS1Padding";
const PROVIDER_OPENSSL: &str = "AndroidOpenSSL";
const PROVIDER_KEYSTORE_BC_WORKAROUND: &str = "AndroidKeyStoreBCWorkaround";

/// Transform/provider pair requested from the platform cipher factory.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct CipherTransform {
    /// Full transformation string, e.g. `RSA/ECB/PKCS1Padding`.
    pub transformation: String,
    /// Security provider name.
    pub provider: String,
}

/// How the key pair generation parameters must be expressed on this OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum KeySpecBuilder {
    /// `KeyPairGeneratorSpec`: alias, subject, serial and validity only.
    Legacy,
    /// `KeyGenParameterSpec`: purposes, digests, block modes and paddings.
    Parameterized,
}

/// OS capability tier derived from the API level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CapabilityTier {
    /// API < 23.
    Legacy,
    /// API 23 to 27.
    Modern,
    /// API >= 28.
    StrongBox,
}

impl CapabilityTier {
    /// Maps an API level to its tier.
    #[must_use]
    pub const fn from_api_level(api_level: u32) -> Self {
        if api_level < API_LEVEL_M {
            Self::Legacy
        } else if api_level < API_LEVEL_P {
            Self::Modern
        } else {
            Self::StrongBox
        }
    }
}

/// Everything the master key provider needs to know about the OS, resolved once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherStrategy {
    /// Tier the strategy was resolved for.
    pub tier: CapabilityTier,
    /// Transform used for every asymmetric operation.
    pub transform: CipherTransform,
    /// Parameter style for key generation.
    pub builder: KeySpecBuilder,
    /// Whether to ask for HSM backing first.
    pub request_strongbox: bool,
}

impl CipherStrategy {
    /// Looks up the strategy for `tier`.
    #[must_use]
    pub fn for_tier(tier: CapabilityTier) -> Self {
        let (provider, builder, request_strongbox) = match tier {
            CapabilityTier::Legacy => (PROVIDER_OPENSSL, KeySpecBuilder::Legacy, false),
            CapabilityTier::Modern => (
                PROVIDER_KEYSTORE_BC_WORKAROUND,
                KeySpecBuilder::Parameterized,
                false,
            ),
            CapabilityTier::StrongBox => (
                PROVIDER_KEYSTORE_BC_WORKAROUND,
                KeySpecBuilder::Parameterized,
                true,
            ),
        };
        Self {
            tier,
            transform: CipherTransform {
                transformation: RSA_TRANSFORMATION.to_string(),
                provider: provider.to_string(),
            },
            builder,
            request_strongbox,
        }
    }

    /// Looks up the strategy for an API level.
    #[must_use]
    pub fn for_api_level(api_level: u32) -> Self {
        Self::for_tier(CapabilityTier::from_api_level(api_level))
    }
}
