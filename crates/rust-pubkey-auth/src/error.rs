//! Error types for rust-pubkey-auth.
//!
//! This module defines all error types used throughout the library.
//! A server rejecting a single key is *not* an error: it is reported through
//! [`AuthReport`](crate::auth::AuthReport) and the engine moves on to the next
//! credential. The variants below are the conditions that end an attempt.

use std::time::Duration;

use thiserror::Error;

/// Which wait of an exchange a timeout or cancellation interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    /// Waiting for the answer to the first request of a credential.
    FirstResponse,
    /// Waiting for the answer to the signed follow-up after a probe.
    SecondResponse,
}

impl std::fmt::Display for WaitPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FirstResponse => f.write_str("first response"),
            Self::SecondResponse => f.write_str("signed response"),
        }
    }
}

/// The main error type for authentication attempts.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The server sent something the protocol does not allow here.
    #[error("protocol violation: {reason}")]
    Protocol {
        /// What was wrong with the message.
        reason: String,
    },

    /// The session failed to send a request.
    #[error("transport error: {reason}")]
    Transport {
        /// The reason reported by the session.
        reason: String,
    },

    /// A credential failed to produce a signature.
    #[error("credential '{algorithm}' failed to sign: {reason}")]
    Signing {
        /// Algorithm of the credential that failed.
        algorithm: String,
        /// The reason for the failure.
        reason: String,
    },

    /// No response arrived in time.
    #[error("no {phase} from server within {duration:?}")]
    Timeout {
        /// The configured wait bound.
        duration: Duration,
        /// Which wait timed out.
        phase: WaitPhase,
    },

    /// The attempt was cancelled by its caller.
    #[error("authentication attempt cancelled")]
    Cancelled,

    /// The authenticator was closed before or during the attempt.
    #[error("authenticator is closed")]
    Closed,

    /// Another attempt is already waiting on this authenticator.
    #[error("an authentication exchange is already in flight")]
    Busy,

    /// A private key could not be loaded.
    #[error("failed to load key {path}: {reason}")]
    Key {
        /// Path of the key file.
        path: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// An I/O error occurred with additional context.
    #[error("{context}: {source}")]
    IoWithContext {
        /// What operation was being performed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

impl AuthError {
    /// Create a protocol violation error.
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Create a signing error.
    pub fn signing(algorithm: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Signing {
            algorithm: algorithm.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error.
    #[must_use]
    pub const fn timeout(duration: Duration, phase: WaitPhase) -> Self {
        Self::Timeout { duration, phase }
    }

    /// Create a key loading error.
    pub fn key(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Key {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io_context(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoWithContext {
            context: context.into(),
            source,
        }
    }

    /// Wrap an I/O result with context.
    pub fn with_io_context<T>(result: std::io::Result<T>, context: impl Into<String>) -> Result<T> {
        result.map_err(|e| Self::io_context(context, e))
    }

    /// Check if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this is a protocol violation.
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    /// Check if the attempt ended because the caller gave up on it.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Closed)
    }
}
