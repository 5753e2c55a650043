//! Configuration reader contract used by IaaS drivers.
//!
//! Loading and persisting configuration is owned by the surrounding control
//! plane; drivers only depend on the ability to resolve a named string
//! option. Options follow the `iaas:<name>:<key>` scheme, for example
//! `iaas:cloudstack:api-key`.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

/// Errors raised when resolving configuration options.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Raised when a required option has no value.
    #[error("configuration key \"{key}\" not found")]
    Missing {
        /// Fully qualified option name, for example `iaas:cloudstack:url`.
        key: String,
    },
    /// Raised when an option exists but cannot be used as requested.
    #[error("configuration key \"{key}\" is invalid: {message}")]
    Invalid {
        /// Fully qualified option name.
        key: String,
        /// Reason the value was rejected.
        message: String,
    },
}

/// Read access to named string options.
///
/// Implementations must not tear individual values: a `get_string` call
/// returns either a complete previously-stored value or [`ConfigError::Missing`],
/// never a partial write.
pub trait ConfigSource: Send + Sync {
    /// Resolves the option `name`, returning its value verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when the option has no value.
    fn get_string(&self, name: &str) -> Result<String, ConfigError>;
}

/// In-memory [`ConfigSource`] backed by a guarded map.
///
/// Intended for tests and for control planes that materialise their
/// configuration up front. Updates replace whole values under the lock, so
/// concurrent readers never observe partial strings.
#[derive(Debug, Default)]
pub struct MemoryConfig {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryConfig {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source seeded from `(name, value)` pairs.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self {
            values: RwLock::new(values),
        }
    }

    /// Stores or replaces the option `name`.
    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut values) = self.values.write() {
            values.insert(name.into(), value.into());
        }
    }

    /// Removes the option `name` if present.
    pub fn unset(&self, name: &str) {
        if let Ok(mut values) = self.values.write() {
            values.remove(name);
        }
    }
}

impl ConfigSource for MemoryConfig {
    fn get_string(&self, name: &str) -> Result<String, ConfigError> {
        self.values
            .read()
            .ok()
            .and_then(|values| values.get(name).cloned())
            .ok_or_else(|| ConfigError::Missing {
                key: name.to_owned(),
            })
    }
}
