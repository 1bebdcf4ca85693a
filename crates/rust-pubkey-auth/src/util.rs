//! Utility modules for the authentication engine.
//!
//! This module provides the SSH wire-format helpers used by the protocol
//! and signature code, and timeout helpers for bounded waits.

pub mod bytes;
pub mod timeout;

// Re-export commonly used types
pub use self::bytes::{SshBufMutExt, SshReader, to_hex};
pub use self::timeout::TimeoutExt;
