#![allow(dead_code, missing_docs)]

//! Common test utilities shared across integration tests.

use std::sync::{Arc, Mutex};

use securestore_core::logger::{LogLevel, Logger};
use securestore_core::platform::memory::{MemoryKeystore, MemoryLocale, MemoryPlatform};
use securestore_core::{SecureStorage, StoreConfig};

pub const PACKAGE: &str = "com.example.wallet";

/// Memory platform at `api_level` with the default locale and keystore.
pub fn platform(api_level: u32) -> Arc<MemoryPlatform> {
    Arc::new(MemoryPlatform::new(PACKAGE, api_level))
}

/// Memory platform whose keystore is built by `configure`.
pub fn platform_with_keystore(
    api_level: u32,
    configure: impl FnOnce(MemoryKeystore) -> MemoryKeystore,
) -> Arc<MemoryPlatform> {
    let locale = Arc::new(MemoryLocale::new("ar-EG"));
    let keystore = Arc::new(configure(MemoryKeystore::new().observing_locale(locale.clone())));
    Arc::new(MemoryPlatform::with_parts(PACKAGE, api_level, keystore, locale))
}

/// Opens a store with the default configuration.
pub fn open(platform: &Arc<MemoryPlatform>) -> SecureStorage {
    SecureStorage::with_config(platform.as_ref(), StoreConfig::default()).expect("open storage")
}

/// Logger capturing every forwarded record.
#[derive(Default)]
pub struct CapturingLogger {
    records: Mutex<Vec<(LogLevel, String, String)>>,
}

impl CapturingLogger {
    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .expect("lock")
            .iter()
            .map(|(_, _, message)| message.clone())
            .collect()
    }
}

impl Logger for CapturingLogger {
    fn log(&self, level: LogLevel, tag: String, message: String) {
        self.records
            .lock()
            .expect("lock")
            .push((level, tag, message));
    }
}
