//! Configuration types for rust-pubkey-auth.
//!
//! [`AuthConfig`] is built in code with the builder methods below, or loaded
//! from a TOML file ([`file`]) or `SSH_AUTH_*` environment variables
//! ([`env`]).

pub mod env;
pub mod file;

use std::time::Duration;

pub use env::EnvConfig;

/// Default bound on each wait for a server response (30 seconds).
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether a lone credential is signed on the first request by default.
pub const DEFAULT_OPTIMISTIC_SINGLE_KEY: bool = true;

/// Configuration for an authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Bound on each wait for a server response; `None` waits indefinitely.
    pub response_timeout: Option<Duration>,

    /// Sign the first request when only one credential is offered, saving
    /// the probe round trip.
    pub optimistic_single_key: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            response_timeout: Some(DEFAULT_RESPONSE_TIMEOUT),
            optimistic_single_key: DEFAULT_OPTIMISTIC_SINGLE_KEY,
        }
    }
}

impl AuthConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response timeout.
    #[must_use]
    pub const fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    /// Wait for responses without a bound.
    #[must_use]
    pub const fn no_response_timeout(mut self) -> Self {
        self.response_timeout = None;
        self
    }

    /// Enable or disable signing a lone credential up front.
    #[must_use]
    pub const fn optimistic_single_key(mut self, enabled: bool) -> Self {
        self.optimistic_single_key = enabled;
        self
    }

    /// Load the configuration from `SSH_AUTH_*` process environment
    /// variables, starting from the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`](crate::AuthError::Config) if a variable
    /// is set to a value that does not parse.
    pub fn from_env() -> crate::Result<Self> {
        EnvConfig::from_env().apply(Self::default())
    }
}

/// Interpret a millisecond count where zero means "no timeout".
pub(crate) const fn timeout_from_millis(millis: u64) -> Option<Duration> {
    if millis == 0 {
        None
    } else {
        Some(Duration::from_millis(millis))
    }
}
