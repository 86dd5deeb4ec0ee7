//! Bridges the `log` facade to a host-provided sink (Logcat on Android).

use std::sync::{Arc, OnceLock};

/// Host log sink.
///
/// Implemented by the embedding app and installed once with [`set_logger`].
/// Messages never contain stored values or key material.
///
/// ## Kotlin
///
/// ```kotlin
/// object LogcatBridge : Logger {
///     override fun log(level: LogLevel, tag: String, message: String) {
///         when (level) {
///             LogLevel.ERROR -> Log.e(tag, message)
///             LogLevel.WARN -> Log.w(tag, message)
///             else -> Log.i(tag, message)
///         }
///     }
/// }
///
/// setLogger(LogcatBridge, LogLevel.INFO)
/// ```
#[uniffi::export(with_foreign)]
pub trait Logger: Sync + Send {
    /// Receives one formatted record. `tag` is the emitting Rust module.
    fn log(&self, level: LogLevel, tag: String, message: String);
}

/// Severity of a forwarded record, most verbose first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, uniffi::Enum)]
pub enum LogLevel {
    /// Step-by-step tracing.
    Trace,
    /// Diagnostics.
    Debug,
    /// Lifecycle events such as key generation or migration.
    Info,
    /// Recoverable problems, e.g. a degraded data key.
    Warn,
    /// Failed operations.
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Self::Error,
            LogLevel::Warn => Self::Warn,
            LogLevel::Info => Self::Info,
            LogLevel::Debug => Self::Debug,
            LogLevel::Trace => Self::Trace,
        }
    }
}

const CRATE_PREFIX: &str = "securestore";

static SINK: OnceLock<Arc<dyn Logger>> = OnceLock::new();

struct ForeignLogger;

static FOREIGN_LOGGER: ForeignLogger = ForeignLogger;

/// Debug and trace records are only forwarded for this crate's modules.
fn is_forwarded(metadata: &log::Metadata<'_>) -> bool {
    metadata.level() <= log::Level::Info || metadata.target().starts_with(CRATE_PREFIX)
}

impl log::Log for ForeignLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        is_forwarded(metadata)
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(sink) = SINK.get() {
            sink.log(
                record.level().into(),
                record.target().to_string(),
                record.args().to_string(),
            );
        }
    }

    fn flush(&self) {}
}

/// Installs `logger` as the destination of all crate logs at `max_level` and above.
///
/// Only the first sink is kept; later calls just adjust the level.
#[uniffi::export]
pub fn set_logger(logger: Arc<dyn Logger>, max_level: LogLevel) {
    if SINK.set(logger).is_err() {
        log::debug!("logger already installed, keeping the first sink");
    }
    // Fails when another `log` implementation was installed first; leave it in place.
    let _ = log::set_logger(&FOREIGN_LOGGER);
    log::set_max_level(max_level.into());
}
