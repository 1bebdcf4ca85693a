//! Server responses to user-authentication requests.

use bytes::{Bytes, BytesMut};

use super::msg;
use crate::error::{AuthError, Result};
use crate::util::{SshBufMutExt, SshReader, to_hex};

/// Contents of `SSH_MSG_USERAUTH_FAILURE`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureDetails {
    /// Methods that may productively continue the authentication.
    pub methods: Vec<String>,
    /// Whether the request succeeded but more methods are required.
    pub partial_success: bool,
}

impl FailureDetails {
    /// Failure listing the given methods, without partial success.
    #[must_use]
    pub fn new<S: Into<String>>(methods: impl IntoIterator<Item = S>) -> Self {
        Self {
            methods: methods.into_iter().map(Into::into).collect(),
            partial_success: false,
        }
    }

    /// Whether the server still lists `method` as usable.
    #[must_use]
    pub fn allows(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }
}

/// A message the server sends during user authentication.
#[derive(Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// `SSH_MSG_USERAUTH_FAILURE`
    Failure(FailureDetails),
    /// `SSH_MSG_USERAUTH_SUCCESS`
    Success,
    /// `SSH_MSG_USERAUTH_BANNER`
    Banner {
        /// Text to show the user.
        message: String,
        /// RFC 3066 language tag.
        language: String,
    },
    /// `SSH_MSG_USERAUTH_PK_OK`: the key would be accepted, please sign.
    PublicKeyOk {
        /// Algorithm echoed from the request.
        algorithm_name: String,
        /// Key blob echoed from the request.
        public_key_blob: Vec<u8>,
    },
}

impl ServerMessage {
    /// Message number of this message.
    #[must_use]
    pub const fn number(&self) -> u8 {
        match self {
            Self::Failure(_) => msg::USERAUTH_FAILURE,
            Self::Success => msg::USERAUTH_SUCCESS,
            Self::Banner { .. } => msg::USERAUTH_BANNER,
            Self::PublicKeyOk { .. } => msg::USERAUTH_PK_OK,
        }
    }

    /// A failure listing `methods`.
    #[must_use]
    pub fn failure<S: Into<String>>(methods: impl IntoIterator<Item = S>) -> Self {
        Self::Failure(FailureDetails::new(methods))
    }

    /// A probe acknowledgement for the given key.
    pub fn pk_ok(algorithm_name: impl Into<String>, public_key_blob: impl Into<Vec<u8>>) -> Self {
        Self::PublicKeyOk {
            algorithm_name: algorithm_name.into(),
            public_key_blob: public_key_blob.into(),
        }
    }

    /// Decode a message payload, starting at the message number.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = SshReader::new(payload);
        let message = match reader.read_u8()? {
            msg::USERAUTH_FAILURE => {
                let methods = reader.read_name_list()?;
                let partial_success = reader.read_bool()?;
                reader.finish("SSH_MSG_USERAUTH_FAILURE")?;
                Self::Failure(FailureDetails {
                    methods,
                    partial_success,
                })
            }
            msg::USERAUTH_SUCCESS => {
                reader.finish("SSH_MSG_USERAUTH_SUCCESS")?;
                Self::Success
            }
            msg::USERAUTH_BANNER => {
                let message = reader.read_utf8()?.to_string();
                let language = reader.read_utf8()?.to_string();
                Self::Banner { message, language }
            }
            msg::USERAUTH_PK_OK => {
                let algorithm_name = reader.read_utf8()?.to_string();
                let public_key_blob = reader.read_string()?.to_vec();
                reader.finish("SSH_MSG_USERAUTH_PK_OK")?;
                Self::PublicKeyOk {
                    algorithm_name,
                    public_key_blob,
                }
            }
            other => {
                return Err(AuthError::protocol(format!(
                    "unexpected message {other} during user authentication"
                )));
            }
        };
        Ok(message)
    }

    /// Encode the message payload, starting with the message number.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(64);
        buf.extend_from_slice(&[self.number()]);
        match self {
            Self::Failure(details) => {
                buf.put_name_list(details.methods.as_slice());
                buf.put_ssh_bool(details.partial_success);
            }
            Self::Success => {}
            Self::Banner { message, language } => {
                buf.put_ssh_string(message.as_bytes());
                buf.put_ssh_string(language.as_bytes());
            }
            Self::PublicKeyOk {
                algorithm_name,
                public_key_blob,
            } => {
                buf.put_ssh_string(algorithm_name.as_bytes());
                buf.put_ssh_string(public_key_blob);
            }
        }
        buf.freeze()
    }
}

impl std::fmt::Debug for ServerMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failure(details) => f.debug_tuple("Failure").field(details).finish(),
            Self::Success => f.write_str("Success"),
            Self::Banner { message, language } => f
                .debug_struct("Banner")
                .field("message", message)
                .field("language", language)
                .finish(),
            Self::PublicKeyOk {
                algorithm_name,
                public_key_blob,
            } => f
                .debug_struct("PublicKeyOk")
                .field("algorithm_name", algorithm_name)
                .field("public_key_blob", &to_hex(public_key_blob))
                .finish(),
        }
    }
}
