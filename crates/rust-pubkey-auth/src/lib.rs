//! rust-pubkey-auth: client-side SSH public-key authentication
//!
//! This crate implements the `publickey` method of RFC 4252 for an SSH
//! client: it proves possession of a private key to the server without
//! sending the key, trying several credentials in order.
//!
//! # Features
//!
//! - **Exact signed payload** matching what servers verify
//! - **Probe-then-sign** for multiple keys, so only a key the server would
//!   accept is ever used to sign
//! - **Optimistic signing** of a lone key, saving a round trip
//! - **Transport agnostic**: plug any SSH session in through [`AuthSession`]
//!   and feed replies back through a [`DeliveryHandle`]
//! - **Bounded, cancellable waits** on top of Tokio
//! - **OpenSSH key files** as credentials (feature: `keys`)
//! - **Scripted sessions** for testing (feature: `test-utils`)
//!
//! # Example
//!
//! ```ignore
//! use rust_pubkey_auth::prelude::*;
//!
//! async fn login(session: &impl AuthSession, auth: &PublicKeyAuthenticator) -> Result<bool> {
//!     let key = KeyFileCredential::load("/home/me/.ssh/id_ed25519", None)?;
//!     let credentials = CredentialSet::new().with(key);
//!     let report = auth.authenticate(session, "me", &credentials).await?;
//!     Ok(report.is_authenticated())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod credential;
pub mod error;
pub mod exchange;
pub mod prelude;
pub mod protocol;
pub mod session;
pub mod signature;
pub mod sync;
pub mod util;

/// OpenSSH private key files as credentials.
#[cfg(feature = "keys")]
pub mod keys;

pub use auth::{
    AttemptOutcome, AuthMethod, AuthReport, AuthStatus, CredentialAttempt, CredentialState,
    PublicKeyAuthenticator,
};
pub use config::{AuthConfig, DEFAULT_RESPONSE_TIMEOUT, EnvConfig};
pub use credential::{Credential, CredentialSet};
pub use error::{AuthError, Result, WaitPhase};
pub use exchange::{Delivery, DeliveryHandle, ExchangeOutcome};
#[cfg(feature = "keys")]
pub use keys::KeyFileCredential;
pub use protocol::{FailureDetails, PublicKeyRequest, ServerMessage, UserAuthRequest};
pub use session::{AuthSession, MessageTypeGuard};
pub use sync::{SyncAuthenticator, authenticate_blocking, block_on};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[cfg(any(test, feature = "test-utils"))]
pub use test_utils::{Registration, Response, ScriptedSession, TestCredential};
