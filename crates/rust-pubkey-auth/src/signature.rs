//! The byte string a credential signs to prove key possession.
//!
//! RFC 4252 §7 defines it as:
//!
//! ```text
//! string    session identifier
//! byte      SSH_MSG_USERAUTH_REQUEST
//! string    user name
//! string    "ssh-connection"
//! string    "publickey"
//! boolean   TRUE
//! string    public key algorithm name
//! string    public key blob
//! ```
//!
//! Binding the session identifier into the payload ties a signature to one
//! connection, so it cannot be replayed elsewhere.

use crate::protocol::{METHOD_PUBLICKEY, PublicKeyRequest, SERVICE_CONNECTION};
use crate::util::SshBufMutExt;

/// Build the signed payload.
///
/// Pure: identical inputs give identical bytes. `message_type` is normally
/// [`msg::USERAUTH_REQUEST`](crate::protocol::msg::USERAUTH_REQUEST).
#[must_use]
pub fn build(
    session_id: &[u8],
    username: &str,
    message_type: u8,
    algorithm_name: &str,
    public_key_blob: &[u8],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(
        session_id.len() + username.len() + algorithm_name.len() + public_key_blob.len() + 64,
    );
    buf.put_ssh_string(session_id);
    buf.push(message_type);
    buf.put_ssh_string(username.as_bytes());
    buf.put_ssh_string(SERVICE_CONNECTION.as_bytes());
    buf.put_ssh_string(METHOD_PUBLICKEY.as_bytes());
    buf.put_ssh_bool(true);
    buf.put_ssh_string(algorithm_name.as_bytes());
    buf.put_ssh_string(public_key_blob);
    buf
}

/// Build the signed payload for a pending request.
#[must_use]
pub fn for_request(session_id: &[u8], request: &PublicKeyRequest) -> Vec<u8> {
    build(
        session_id,
        &request.username,
        crate::protocol::msg::USERAUTH_REQUEST,
        &request.algorithm_name,
        &request.public_key_blob,
    )
}
