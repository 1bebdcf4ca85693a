//! Test utilities for rust-pubkey-auth.
//!
//! This module provides a scripted SSH session and counting credentials for
//! exercising the engine without a network or real keys.

mod credentials;
mod scripted_session;

pub use credentials::TestCredential;
pub use scripted_session::{Registration, Response, ScriptedSession};
