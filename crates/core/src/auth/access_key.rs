//! Batch access key validation.
//!
//! Batch runs require a shared access key in addition to whatever the
//! transport-level authenticator enforces. The two checks are
//! independent: a valid session without the key is still rejected.

use super::api_key::constant_time_eq;

/// Validates the shared access key presented with a batch trigger.
pub struct AccessKeyValidator {
    expected: Option<String>,
}

impl AccessKeyValidator {
    /// `expected` is `auth.batch_access_key` from config. When unset,
    /// no key is accepted and batch triggering is disabled.
    pub fn new(expected: Option<String>) -> Self {
        Self {
            expected: expected.filter(|k| !k.is_empty()),
        }
    }

    pub fn validate(&self, presented: Option<&str>) -> bool {
        match (&self.expected, presented) {
            (Some(expected), Some(presented)) => {
                constant_time_eq(expected.as_bytes(), presented.as_bytes())
            }
            _ => false,
        }
    }
}
