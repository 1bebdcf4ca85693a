//! `SSH_MSG_USERAUTH_REQUEST` encoding.

use bytes::{Bytes, BytesMut};

use super::{METHOD_NONE, METHOD_PUBLICKEY, SERVICE_CONNECTION, msg};
use crate::error::{AuthError, Result};
use crate::util::{SshBufMutExt, SshReader, to_hex};

/// A public-key authentication request for one credential.
///
/// The unsigned form asks the server whether it would accept the key; the
/// signed form carries the proof. A request moves from unsigned to signed at
/// most once via [`with_signature`](Self::with_signature).
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKeyRequest {
    /// Service to start after authentication.
    pub service_name: String,
    /// User to authenticate as.
    pub username: String,
    /// Public-key algorithm name, e.g. `ssh-ed25519`.
    pub algorithm_name: String,
    /// Public key in SSH wire encoding.
    pub public_key_blob: Vec<u8>,
    /// Signature over the signed payload, when present.
    pub signature: Option<Vec<u8>>,
}

impl PublicKeyRequest {
    /// Create an unsigned request for the connection service.
    pub fn new(
        username: impl Into<String>,
        algorithm_name: impl Into<String>,
        public_key_blob: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            service_name: SERVICE_CONNECTION.to_string(),
            username: username.into(),
            algorithm_name: algorithm_name.into(),
            public_key_blob: public_key_blob.into(),
            signature: None,
        }
    }

    /// Attach a signature, producing the signed variant.
    #[must_use]
    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        debug_assert!(self.signature.is_none(), "request signed twice");
        self.signature = Some(signature);
        self
    }

    /// Whether a signature is attached.
    #[must_use]
    pub const fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_ssh_string(self.username.as_bytes());
        buf.put_ssh_string(self.service_name.as_bytes());
        buf.put_ssh_string(METHOD_PUBLICKEY.as_bytes());
        buf.put_ssh_bool(self.signature.is_some());
        buf.put_ssh_string(self.algorithm_name.as_bytes());
        buf.put_ssh_string(&self.public_key_blob);
        if let Some(signature) = &self.signature {
            buf.put_ssh_string(signature);
        }
    }
}

impl std::fmt::Debug for PublicKeyRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKeyRequest")
            .field("service_name", &self.service_name)
            .field("username", &self.username)
            .field("algorithm_name", &self.algorithm_name)
            .field("public_key_blob", &to_hex(&self.public_key_blob))
            .field("signed", &self.is_signed())
            .finish()
    }
}

/// A user-authentication request as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAuthRequest {
    /// The `none` method, used to learn which methods the server allows.
    None {
        /// User to authenticate as.
        username: String,
        /// Service to start after authentication.
        service_name: String,
    },
    /// The `publickey` method.
    PublicKey(PublicKeyRequest),
}

impl UserAuthRequest {
    /// A `none` request for the connection service.
    pub fn none(username: impl Into<String>) -> Self {
        Self::None {
            username: username.into(),
            service_name: SERVICE_CONNECTION.to_string(),
        }
    }

    /// Name of the method this request uses.
    #[must_use]
    pub const fn method_name(&self) -> &'static str {
        match self {
            Self::None { .. } => METHOD_NONE,
            Self::PublicKey(_) => METHOD_PUBLICKEY,
        }
    }

    /// Encode the message payload, starting with the message number.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(128);
        buf.extend_from_slice(&[msg::USERAUTH_REQUEST]);
        match self {
            Self::None {
                username,
                service_name,
            } => {
                buf.put_ssh_string(username.as_bytes());
                buf.put_ssh_string(service_name.as_bytes());
                buf.put_ssh_string(METHOD_NONE.as_bytes());
            }
            Self::PublicKey(request) => request.encode_into(&mut buf),
        }
        buf.freeze()
    }

    /// Decode a request payload.
    ///
    /// Clients never receive requests; this exists for servers and test
    /// doubles that need to inspect what the engine sent.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = SshReader::new(payload);
        let number = reader.read_u8()?;
        if number != msg::USERAUTH_REQUEST {
            return Err(AuthError::protocol(format!(
                "expected SSH_MSG_USERAUTH_REQUEST, got message {number}"
            )));
        }
        let username = reader.read_utf8()?.to_string();
        let service_name = reader.read_utf8()?.to_string();
        let request = match reader.read_utf8()? {
            METHOD_NONE => Self::None {
                username,
                service_name,
            },
            METHOD_PUBLICKEY => {
                let has_signature = reader.read_bool()?;
                let algorithm_name = reader.read_utf8()?.to_string();
                let public_key_blob = reader.read_string()?.to_vec();
                let signature = if has_signature {
                    Some(reader.read_string()?.to_vec())
                } else {
                    None
                };
                Self::PublicKey(PublicKeyRequest {
                    service_name,
                    username,
                    algorithm_name,
                    public_key_blob,
                    signature,
                })
            }
            other => {
                return Err(AuthError::protocol(format!(
                    "unsupported authentication method '{other}'"
                )));
            }
        };
        reader.finish("SSH_MSG_USERAUTH_REQUEST")?;
        Ok(request)
    }
}

impl From<PublicKeyRequest> for UserAuthRequest {
    fn from(request: PublicKeyRequest) -> Self {
        Self::PublicKey(request)
    }
}
