//! Convenient re-exports for common rust-pubkey-auth usage.
//!
//! ```ignore
//! use rust_pubkey_auth::prelude::*;
//! ```

// Engine
pub use crate::auth::{AuthMethod, AuthReport, AuthStatus, PublicKeyAuthenticator};

// Configuration
pub use crate::config::AuthConfig;

// Credentials
pub use crate::credential::{Credential, CredentialSet};
#[cfg(feature = "keys")]
pub use crate::keys::KeyFileCredential;

// Error handling
pub use crate::error::{AuthError, Result};

// Transport seam
pub use crate::exchange::DeliveryHandle;
pub use crate::protocol::{FailureDetails, ServerMessage};
pub use crate::session::AuthSession;

// Sync wrapper
pub use crate::sync::{SyncAuthenticator, block_on};
