//! Uniform reply shape returned across the host boundary.

use std::collections::HashMap;

use strum::Display;

use crate::error::SecureStoreResult;

/// Success message of a call served by a data key that lives only in memory.
pub const DEGRADED_MESSAGE: &str = "OK (degraded: ephemeral key)";

/// Outcome of a boundary call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, uniffi::Enum)]
#[strum(serialize_all = "UPPERCASE")]
pub enum CallStatus {
    /// The call succeeded.
    Ok,
    /// The call failed; see [`CallResult::message`].
    Fail,
}

/// Payload of a successful call.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum CallData {
    /// A single decrypted value.
    Text {
        /// The plaintext value.
        value: String,
    },
    /// Every decrypted value, keyed by caller key.
    Entries {
        /// Caller key to plaintext value.
        entries: HashMap<String, String>,
    },
}

/// `{status, data, message}` reply of every [`crate::SecureStorage`] method.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct CallResult {
    /// Success or failure.
    pub status: CallStatus,
    /// Returned value, if the operation produces one.
    pub data: Option<CallData>,
    /// `"OK"` on success, [`DEGRADED_MESSAGE`] on success with an in-memory data
    /// key, otherwise `"<method>: <error kind>: <detail>"`.
    pub message: String,
}

impl CallResult {
    /// Successful reply carrying `data`.
    #[must_use]
    pub fn ok(data: Option<CallData>) -> Self {
        Self {
            status: CallStatus::Ok,
            data,
            message: CallStatus::Ok.to_string(),
        }
    }

    /// Folds an operation outcome into a reply, logging failures.
    #[must_use]
    pub fn from_outcome(method: &str, outcome: SecureStoreResult<Option<CallData>>) -> Self {
        match outcome {
            Ok(data) => Self::ok(data),
            Err(err) => {
                log::warn!("{method} failed: {err}");
                Self {
                    status: CallStatus::Fail,
                    data: None,
                    message: format!("{method}: {}: {err}", err.kind()),
                }
            }
        }
    }

    /// Marks a successful reply as served by an in-memory data key. Failures are
    /// left untouched.
    #[must_use]
    pub fn with_degraded_key(mut self, degraded: bool) -> Self {
        if degraded && self.is_ok() {
            self.message = DEGRADED_MESSAGE.to_string();
        }
        self
    }

    /// Whether the call succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == CallStatus::Ok
    }

    /// The single value of a `read`, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.data {
            Some(CallData::Text { value }) => Some(value),
            _ => None,
        }
    }

    /// The map of a `read_all`, if any.
    #[must_use]
    pub const fn entries(&self) -> Option<&HashMap<String, String>> {
        match &self.data {
            Some(CallData::Entries { entries }) => Some(entries),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SecureStoreError;

    #[test]
    fn test_status_display() {
        assert_eq!(CallStatus::Ok.to_string(), "OK");
        assert_eq!(CallStatus::Fail.to_string(), "FAIL");
    }

    #[test]
    fn test_failure_message_names_method_and_kind() {
        let result = CallResult::from_outcome(
            "read",
            Err(SecureStoreError::DecryptionFailure("invalid padding".to_string())),
        );
        assert!(!result.is_ok());
        assert_eq!(result.data, None);
        assert_eq!(
            result.message,
            "read: DecryptionFailure: decryption failure: invalid padding"
        );
    }

    #[test]
    fn test_success_carries_data() {
        let result = CallResult::from_outcome(
            "read",
            Ok(Some(CallData::Text {
                value: "v".to_string(),
            })),
        );
        assert!(result.is_ok());
        assert_eq!(result.message, "OK");
        assert_eq!(result.text(), Some("v"));
        assert_eq!(result.entries(), None);
    }

    #[test]
    fn test_degraded_success_has_distinct_message() {
        let result = CallResult::ok(None).with_degraded_key(true);
        assert!(result.is_ok());
        assert_eq!(result.message, DEGRADED_MESSAGE);
        assert_eq!(CallResult::ok(None).with_degraded_key(false).message, "OK");
    }

    #[test]
    fn test_degraded_flag_keeps_failure_message() {
        let result = CallResult::from_outcome(
            "write",
            Err(SecureStoreError::KeystoreUnavailable("wiped".to_string())),
        )
        .with_degraded_key(true);
        assert!(!result.is_ok());
        assert!(result.message.starts_with("write: "));
    }
}
