//! One-time relocation of the legacy key record.
//!
//! Early releases kept the wrapped data key in the primary value namespace.
//! It now lives in its own namespace; this moves it there byte for byte.

use std::sync::Arc;

use crate::error::SecureStoreResult;
use crate::platform::KeyValueStore;

/// Result of [`LegacyKeyMigrator::run_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The legacy record was moved into the canonical namespace.
    Migrated,
    /// No legacy record exists. Not an error.
    Noop,
}

/// Moves the legacy key record into the canonical namespace.
pub struct LegacyKeyMigrator {
    legacy: Arc<dyn KeyValueStore>,
    legacy_record: String,
    canonical: Arc<dyn KeyValueStore>,
    canonical_record: String,
}

impl LegacyKeyMigrator {
    /// Creates a migrator moving `legacy_record` of `legacy` to `canonical_record` of
    /// `canonical`.
    #[must_use]
    pub const fn new(
        legacy: Arc<dyn KeyValueStore>,
        legacy_record: String,
        canonical: Arc<dyn KeyValueStore>,
        canonical_record: String,
    ) -> Self {
        Self {
            legacy,
            legacy_record,
            canonical,
            canonical_record,
        }
    }

    /// Moves the legacy record if there is one. Idempotent.
    ///
    /// The canonical copy is written before the legacy record is removed, so an
    /// interrupted run leaves the key in at least one place and the next run
    /// completes the move.
    ///
    /// # Errors
    ///
    /// Returns store errors from either namespace.
    pub fn run_once(&self) -> SecureStoreResult<MigrationOutcome> {
        let Some(value) = self.legacy.get(self.legacy_record.clone())? else {
            log::debug!("no legacy key record to migrate");
            return Ok(MigrationOutcome::Noop);
        };
        self.canonical.put(self.canonical_record.clone(), value)?;
        self.legacy.remove(self.legacy_record.clone())?;
        log::info!("migrated legacy key record into the key namespace");
        Ok(MigrationOutcome::Migrated)
    }
}
