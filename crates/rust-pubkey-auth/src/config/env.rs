//! Environment-based configuration.
//!
//! | Variable | Meaning |
//! |---|---|
//! | `SSH_AUTH_RESPONSE_TIMEOUT_MS` | response timeout in milliseconds, `0` waits indefinitely |
//! | `SSH_AUTH_OPTIMISTIC_SINGLE_KEY` | `1`/`true`/`yes`/`on` to sign a lone key up front |

use std::collections::HashMap;

use super::{AuthConfig, timeout_from_millis};
use crate::error::{AuthError, Result};

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "SSH_AUTH";

/// Environment variable reader.
///
/// Variables are snapshotted when the reader is built, so a reader can also
/// be fed an explicit map instead of the process environment.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Prefix for environment variables.
    prefix: String,
    /// Captured variables, by full name.
    vars: HashMap<String, String>,
}

impl EnvConfig {
    /// Snapshot the process environment under [`DEFAULT_PREFIX`].
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(DEFAULT_PREFIX, std::env::vars())
    }

    /// Build a reader over explicit `(name, value)` pairs.
    #[must_use]
    pub fn from_vars<I, K, V>(prefix: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let prefix = prefix.into();
        let marker = format!("{prefix}_");
        let vars = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| k.starts_with(&marker))
            .collect();
        Self { prefix, vars }
    }

    /// Build the full environment variable name.
    fn var_name(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name.to_uppercase())
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(&self.var_name(name)).map(String::as_str)
    }

    /// Check if a variable is set.
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get a boolean value.
    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).map(|v| {
            matches!(
                v.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on" | "enabled"
            )
        })
    }

    /// Get an unsigned integer value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the variable is set but not a number.
    pub fn u64(&self, name: &str) -> Result<Option<u64>> {
        self.get(name)
            .map(|v| {
                v.trim().parse::<u64>().map_err(|e| {
                    AuthError::config(format!("{}={v:?}: {e}", self.var_name(name)))
                })
            })
            .transpose()
    }

    /// Overlay the variables that are set onto `config`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if a set variable does not parse.
    pub fn apply(&self, mut config: AuthConfig) -> Result<AuthConfig> {
        if let Some(millis) = self.u64("response_timeout_ms")? {
            config.response_timeout = timeout_from_millis(millis);
        }
        if let Some(enabled) = self.bool("optimistic_single_key") {
            config.optimistic_single_key = enabled;
        }
        Ok(config)
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
