//! SSH user-authentication messages (RFC 4252).
//!
//! The engine produces [`UserAuthRequest`]s and consumes [`ServerMessage`]s.
//! Packet framing and encryption belong to the session; these types only deal
//! with message payloads, starting at the message number byte.

pub mod request;
pub mod response;

pub use request::{PublicKeyRequest, UserAuthRequest};
pub use response::{FailureDetails, ServerMessage};

/// Message numbers used by the user-authentication protocol.
pub mod msg {
    /// `SSH_MSG_USERAUTH_REQUEST`
    pub const USERAUTH_REQUEST: u8 = 50;
    /// `SSH_MSG_USERAUTH_FAILURE`
    pub const USERAUTH_FAILURE: u8 = 51;
    /// `SSH_MSG_USERAUTH_SUCCESS`
    pub const USERAUTH_SUCCESS: u8 = 52;
    /// `SSH_MSG_USERAUTH_BANNER`
    pub const USERAUTH_BANNER: u8 = 53;
    /// `SSH_MSG_USERAUTH_PK_OK`
    ///
    /// Number 60 is method specific; the session must be told to route it to
    /// us while a public-key attempt is running.
    pub const USERAUTH_PK_OK: u8 = 60;
}

/// The service every authentication request asks for.
pub const SERVICE_CONNECTION: &str = "ssh-connection";

/// Method name of public-key authentication.
pub const METHOD_PUBLICKEY: &str = "publickey";

/// Method name of the `none` query.
pub const METHOD_NONE: &str = "none";
