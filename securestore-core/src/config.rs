//! Store configuration supplied by the host application.

use serde::Deserialize;

use crate::error::SecureStoreResult;

/// Namespace holding caller values (and, before migration, the legacy key record).
pub const DEFAULT_PRIMARY_NAMESPACE: &str = "API0";
/// Namespace holding the wrapped data key.
pub const DEFAULT_KEY_NAMESPACE: &str = "FlutterSecureKeyStorage";
/// Prefix joined to every caller key with `_`.
pub const DEFAULT_ELEMENT_PREFIX: &str =
    "VGhpcyBpcyB0aGUgcHJlZml4IGZvciBhIHNlY3VyZSBzdG9yYWdlCg";
/// Record name of the wrapped data key.
pub const DEFAULT_DATA_KEY_RECORD: &str =
    "VGhpcyBpcyB0aGUga2V5IGZvciBhIHNlY3VyZSBzdG9yYWdlIEFFUyBLZXkK";
/// Suffix appended to the package identity to form the master key alias.
pub const DEFAULT_ALIAS_SUFFIX: &str = "FlutterSecureStoragePluginKey";

/// What to do when the persisted data key cannot be unwrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, uniffi::Enum)]
#[serde(rename_all = "snake_case")]
pub enum UnwrapFailurePolicy {
    /// Continue with an unpersisted ephemeral key. Previously stored values become
    /// unreadable until the keystore condition is resolved.
    #[default]
    Degrade,
    /// Refuse to serve any operation until the wrapped key can be unwrapped.
    FailClosed,
}

/// Names and policies used by a [`crate::SecureStorage`] instance.
///
/// Every field has a default reproducing the layout written by earlier releases,
/// so an empty JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Namespace holding caller values.
    pub primary_namespace: String,
    /// Namespace holding the wrapped data key.
    pub key_namespace: String,
    /// Namespace the legacy key record is migrated out of.
    pub legacy_namespace: String,
    /// Prefix for caller value records.
    pub element_prefix: String,
    /// Record name of the wrapped data key in `key_namespace`.
    pub data_key_record: String,
    /// Record name of the key in `legacy_namespace`.
    pub legacy_key_record: String,
    /// Suffix of the master key alias.
    pub alias_suffix: String,
    /// Behaviour when the wrapped data key cannot be unwrapped.
    pub unwrap_failure_policy: UnwrapFailurePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            primary_namespace: DEFAULT_PRIMARY_NAMESPACE.to_string(),
            key_namespace: DEFAULT_KEY_NAMESPACE.to_string(),
            legacy_namespace: DEFAULT_PRIMARY_NAMESPACE.to_string(),
            element_prefix: DEFAULT_ELEMENT_PREFIX.to_string(),
            data_key_record: DEFAULT_DATA_KEY_RECORD.to_string(),
            legacy_key_record: DEFAULT_DATA_KEY_RECORD.to_string(),
            alias_suffix: DEFAULT_ALIAS_SUFFIX.to_string(),
            unwrap_failure_policy: UnwrapFailurePolicy::Degrade,
        }
    }
}

impl StoreConfig {
    /// Parses a JSON configuration. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SecureStoreError::InvalidConfig`] on malformed JSON or unknown fields.
    pub fn from_json(json: &str) -> SecureStoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Storage record name for a caller key.
    #[must_use]
    pub fn element_key(&self, key: &str) -> String {
        format!("{}_{key}", self.element_prefix)
    }

    /// Caller key for a storage record name, if the record belongs to this store.
    #[must_use]
    pub fn caller_key<'a>(&self, record: &'a str) -> Option<&'a str> {
        record
            .strip_prefix(self.element_prefix.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SecureStoreError;

    #[test]
    fn test_empty_json_yields_defaults() {
        let config = StoreConfig::from_json("{}").expect("parse");
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config = StoreConfig::from_json(
            r#"{"primary_namespace":"vault","unwrap_failure_policy":"fail_closed"}"#,
        )
        .expect("parse");
        assert_eq!(config.primary_namespace, "vault");
        assert_eq!(config.unwrap_failure_policy, UnwrapFailurePolicy::FailClosed);
        assert_eq!(config.key_namespace, DEFAULT_KEY_NAMESPACE);
    }

    #[test]
    fn test_unknown_field_rejected() {
        match StoreConfig::from_json(r#"{"nope":1}"#) {
            Err(SecureStoreError::InvalidConfig(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_element_key_round_trip() {
        let config = StoreConfig::default();
        let record = config.element_key("token");
        assert_eq!(config.caller_key(&record), Some("token"));
        assert_eq!(config.caller_key("token"), None);
        assert_eq!(config.caller_key(&config.data_key_record), None);
    }
}
