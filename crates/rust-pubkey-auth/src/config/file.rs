//! File-based configuration loading.
//!
//! Settings live in an `[auth]` table so they can share a file with the rest
//! of an application's configuration:
//!
//! ```toml
//! [auth]
//! response_timeout_ms = 10000   # 0 waits indefinitely
//! optimistic_single_key = true
//! ```

use std::path::Path;

use serde::Deserialize;

use super::{AuthConfig, timeout_from_millis};
use crate::error::{AuthError, Result};

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    auth: AuthSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AuthSection {
    response_timeout_ms: Option<u64>,
    optimistic_single_key: Option<bool>,
}

impl AuthSection {
    fn apply(self, mut config: AuthConfig) -> AuthConfig {
        if let Some(millis) = self.response_timeout_ms {
            config.response_timeout = timeout_from_millis(millis);
        }
        if let Some(enabled) = self.optimistic_single_key {
            config.optimistic_single_key = enabled;
        }
        config
    }
}

impl AuthConfig {
    /// Parse a configuration from TOML text.
    ///
    /// Keys missing from the `[auth]` table keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the text is not valid TOML or the
    /// `[auth]` table has unknown keys or wrongly typed values.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let document: ConfigDocument = toml::from_str(text)
            .map_err(|e| AuthError::config(format!("invalid auth configuration: {e}")))?;
        Ok(document.auth.apply(Self::default()))
    }

    /// Load a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or
    /// [`AuthError::Config`] if it does not parse.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            AuthError::io_context(format!("reading config file {}", path.display()), e)
        })?;
        Self::from_toml_str(&text)
    }
}
