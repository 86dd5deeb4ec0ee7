//! Synchronous store core: value records in, envelopes out.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::data_key::{DataKeyManager, DataKeyState, ResolvedDataKey};
use crate::envelope::EnvelopeCipher;
use crate::error::SecureStoreResult;
use crate::keystore::MasterKeyProvider;
use crate::migration::{LegacyKeyMigrator, MigrationOutcome};
use crate::platform::{KeyValueStore, Platform};

/// Owns the key hierarchy and the primary namespace.
///
/// Every method takes `&mut self`: the engine is meant to be owned by a single
/// worker so keystore calls and the locale override never interleave.
pub struct SecureStoreEngine {
    config: StoreConfig,
    primary: Arc<dyn KeyValueStore>,
    os_release: String,
    migrator: Option<LegacyKeyMigrator>,
    migration_done: bool,
    data_keys: DataKeyManager,
}

impl SecureStoreEngine {
    /// Wires the engine to `platform`. No keystore or store call happens here.
    #[must_use]
    pub fn new(platform: &dyn Platform, config: StoreConfig) -> Self {
        let primary = platform.namespace(config.primary_namespace.clone());
        let key_store = platform.namespace(config.key_namespace.clone());

        let same_record = config.legacy_namespace == config.key_namespace
            && config.legacy_key_record == config.data_key_record;
        let migrator = (!same_record).then(|| {
            LegacyKeyMigrator::new(
                platform.namespace(config.legacy_namespace.clone()),
                config.legacy_key_record.clone(),
                key_store.clone(),
                config.data_key_record.clone(),
            )
        });

        let data_keys = DataKeyManager::new(
            MasterKeyProvider::from_platform(platform, &config.alias_suffix),
            key_store,
            config.data_key_record.clone(),
            config.unwrap_failure_policy,
        );

        Self {
            primary,
            os_release: platform.os_release(),
            migrator,
            migration_done: false,
            data_keys,
            config,
        }
    }

    /// Data key resolution state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state mutex is poisoned.
    pub fn key_state(&self) -> SecureStoreResult<DataKeyState> {
        self.data_keys.state()
    }

    /// Runs the legacy migration if it has not completed in this process.
    ///
    /// # Errors
    ///
    /// Returns store errors; the migration is retried on the next call.
    pub fn ensure_migrated(&mut self) -> SecureStoreResult<()> {
        if self.migration_done {
            return Ok(());
        }
        if let Some(migrator) = &self.migrator {
            if migrator.run_once()? == MigrationOutcome::Migrated {
                self.data_keys.mark_migrated()?;
            }
        }
        self.migration_done = true;
        Ok(())
    }

    fn data_key(&mut self) -> SecureStoreResult<Arc<ResolvedDataKey>> {
        self.ensure_migrated()?;
        self.data_keys.resolve_data_key()
    }

    /// Encrypts `value` and stores it under `key`.
    ///
    /// # Errors
    ///
    /// Returns key resolution and store errors.
    pub fn write(&mut self, key: &str, value: &str) -> SecureStoreResult<()> {
        let data_key = self.data_key()?;
        let sealed = EnvelopeCipher::seal_text(value, data_key.key());
        self.primary.put(self.config.element_key(key), sealed)
    }

    /// Reads and decrypts the value under `key`. A missing key is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns key resolution and store errors, and
    /// [`crate::SecureStoreError::DecryptionFailure`] for an unreadable envelope.
    pub fn read(&mut self, key: &str) -> SecureStoreResult<Option<String>> {
        let data_key = self.data_key()?;
        self.primary
            .get(self.config.element_key(key))?
            .map(|stored| EnvelopeCipher::open_text(&stored, data_key.key()))
            .transpose()
    }

    /// Reads and decrypts every value written through this store, keyed by caller key.
    ///
    /// # Errors
    ///
    /// Same as [`SecureStoreEngine::read`]; one unreadable value fails the whole call.
    pub fn read_all(&mut self) -> SecureStoreResult<HashMap<String, String>> {
        let data_key = self.data_key()?;
        self.primary
            .entries()?
            .into_iter()
            .filter_map(|(record, stored)| {
                self.config
                    .caller_key(&record)
                    .map(|key| (key.to_string(), stored))
            })
            .map(|(key, stored)| {
                EnvelopeCipher::open_text(&stored, data_key.key()).map(|value| (key, value))
            })
            .collect()
    }

    /// Removes the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns store errors.
    pub fn delete(&mut self, key: &str) -> SecureStoreResult<()> {
        self.ensure_migrated()?;
        self.primary.remove(self.config.element_key(key))
    }

    /// Removes every record of the primary namespace. The wrapped data key, kept in
    /// its own namespace, survives.
    ///
    /// # Errors
    ///
    /// Returns store errors.
    pub fn delete_all(&mut self) -> SecureStoreResult<()> {
        self.ensure_migrated()?;
        self.primary.clear()
    }

    /// Human-readable OS version.
    #[must_use]
    pub fn platform_version(&self) -> String {
        format!("Android {}", self.os_release)
    }
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    use super::*;
    use crate::config::{
        DEFAULT_DATA_KEY_RECORD, DEFAULT_KEY_NAMESPACE, DEFAULT_PRIMARY_NAMESPACE,
    };
    use crate::data_key::DataKey;
    use crate::platform::memory::MemoryPlatform;
    use crate::SecureStoreError;

    fn engine(platform: &MemoryPlatform) -> SecureStoreEngine {
        SecureStoreEngine::new(platform, StoreConfig::default())
    }

    #[test]
    fn test_write_then_read() {
        let platform = MemoryPlatform::new("com.example", 30);
        let mut engine = engine(&platform);
        engine.write("token", "abc123").expect("write");
        assert_eq!(engine.read("token").expect("read"), Some("abc123".to_string()));
    }

    #[test]
    fn test_values_are_not_persisted_in_plaintext() {
        let platform = MemoryPlatform::new("com.example", 30);
        let mut engine = engine(&platform);
        engine.write("token", "abc123").expect("write");

        let primary = platform.memory_namespace(DEFAULT_PRIMARY_NAMESPACE);
        let records = primary.entries().expect("entries");
        let stored = &records[&StoreConfig::default().element_key("token")];
        assert!(!stored.contains("abc123"));
        assert!(STANDARD.decode(stored).expect("base64").len() >= 32);
    }

    #[test]
    fn test_read_missing_key_is_none() {
        let platform = MemoryPlatform::new("com.example", 30);
        let mut engine = engine(&platform);
        assert_eq!(engine.read("nothing").expect("read"), None);
    }

    #[test]
    fn test_read_all_strips_prefix_and_skips_foreign_records() {
        let platform = MemoryPlatform::new("com.example", 30);
        let mut engine = engine(&platform);
        engine.write("a", "1").expect("write");
        engine.write("b", "2").expect("write");
        platform
            .memory_namespace(DEFAULT_PRIMARY_NAMESPACE)
            .put("flutter.other".to_string(), "plain".to_string())
            .expect("put");

        let all = engine.read_all().expect("read all");
        assert_eq!(
            all,
            HashMap::from([
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ])
        );
    }

    #[test]
    fn test_delete_all_keeps_data_key() {
        let platform = MemoryPlatform::new("com.example", 30);
        let mut engine = engine(&platform);
        engine.write("a", "1").expect("write");
        engine.delete_all().expect("delete all");

        assert!(engine.read_all().expect("read all").is_empty());
        assert!(!platform.memory_namespace(DEFAULT_KEY_NAMESPACE).is_empty());
        engine.write("a", "2").expect("write");
        assert_eq!(engine.read("a").expect("read"), Some("2".to_string()));
    }

    #[test]
    fn test_delete_single_key() {
        let platform = MemoryPlatform::new("com.example", 30);
        let mut engine = engine(&platform);
        engine.write("a", "1").expect("write");
        engine.write("b", "2").expect("write");
        engine.delete("a").expect("delete");
        assert_eq!(engine.read("a").expect("read"), None);
        assert_eq!(engine.read("b").expect("read"), Some("2".to_string()));
    }

    #[test]
    fn test_legacy_key_is_migrated_before_resolution() {
        let platform = MemoryPlatform::new("com.example", 30);
        let mut first = engine(&platform);
        first.write("token", "abc123").expect("write");

        // Put the store back into the pre-migration layout.
        let keys = platform.memory_namespace(DEFAULT_KEY_NAMESPACE);
        let wrapped = keys
            .get(DEFAULT_DATA_KEY_RECORD.to_string())
            .expect("get")
            .expect("wrapped key");
        keys.clear().expect("clear");
        platform
            .memory_namespace(DEFAULT_PRIMARY_NAMESPACE)
            .put(DEFAULT_DATA_KEY_RECORD.to_string(), wrapped)
            .expect("put");

        let mut second = engine(&platform);
        second.ensure_migrated().expect("migrate");
        assert_eq!(second.key_state().expect("state"), DataKeyState::Migrated);
        assert_eq!(second.read("token").expect("read"), Some("abc123".to_string()));
        assert_eq!(second.key_state().expect("state"), DataKeyState::Resolved);
        assert_eq!(
            platform
                .memory_namespace(DEFAULT_PRIMARY_NAMESPACE)
                .get(DEFAULT_DATA_KEY_RECORD.to_string())
                .expect("get"),
            None
        );
    }

    #[test]
    fn test_degraded_engine_cannot_read_old_values() {
        let platform = MemoryPlatform::new("com.example", 30);
        engine(&platform).write("token", "abc123").expect("write");
        platform.memory_keystore().reset();

        let mut engine = engine(&platform);
        match engine.read("token") {
            Err(SecureStoreError::DecryptionFailure(_)) => {}
            // Without an authentication tag a wrong key can still pass the padding check.
            Ok(Some(value)) => assert_ne!(value, "abc123"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(engine.key_state().expect("state"), DataKeyState::Degraded);

        engine.write("fresh", "v").expect("write");
        assert_eq!(engine.read("fresh").expect("read"), Some("v".to_string()));
    }

    #[test]
    fn test_envelope_written_by_engine_opens_with_resolved_key() {
        let platform = MemoryPlatform::new("com.example", 30);
        let mut engine = engine(&platform);
        engine.write("token", "abc123").expect("write");
        let key = engine.data_key().expect("key");

        let stored = platform
            .memory_namespace(DEFAULT_PRIMARY_NAMESPACE)
            .get(StoreConfig::default().element_key("token"))
            .expect("get")
            .expect("stored");
        assert_eq!(
            EnvelopeCipher::open_text(&stored, key.key()).expect("open"),
            "abc123"
        );
        assert_ne!(
            EnvelopeCipher::open_text(&stored, &DataKey::generate()).ok(),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn test_platform_version() {
        let platform = MemoryPlatform::new("com.example", 34);
        assert_eq!(engine(&platform).platform_version(), "Android api-34");
    }
}
