//! Credentials backed by OpenSSH private key files.
//!
//! Keys are decoded with `russh::keys::decode_secret_key`, which handles both
//! encrypted and unencrypted keys, and sign through the key's own
//! `Signer` implementation. Ed25519, ECDSA and RSA keys are supported; RSA
//! keys sign with `rsa-sha2-512`.

use std::path::Path;

use ed25519_dalek::{Signer, SigningKey};
use russh::keys::PrivateKey;
use russh::keys::ssh_key::private::{Ed25519Keypair, KeypairData};
use russh::keys::ssh_key::{Algorithm, HashAlg, Signature};

use crate::credential::Credential;
use crate::error::{AuthError, Result};
use crate::util::SshBufMutExt;

/// Algorithm name of Ed25519 keys and signatures.
pub const ED25519: &str = "ssh-ed25519";

/// A credential loaded from an OpenSSH private key.
pub struct KeyFileCredential {
    key: PrivateKey,
    algorithm_name: String,
    public_key_blob: Vec<u8>,
}

impl KeyFileCredential {
    /// Load a key file, decrypting it with `passphrase` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Key`] if the file cannot be read or decoded, or
    /// holds a key type that cannot sign.
    pub fn load(path: impl AsRef<Path>, passphrase: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AuthError::key(path.display().to_string(), e.to_string()))?;
        Self::from_openssh(&text, passphrase).map_err(|e| match e {
            AuthError::Key { reason, .. } => AuthError::key(path.display().to_string(), reason),
            other => other,
        })
    }

    /// Decode an OpenSSH private key from its PEM-style text.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Key`] if the text does not decode or holds a key
    /// type that cannot sign.
    pub fn from_openssh(text: &str, passphrase: Option<&str>) -> Result<Self> {
        let key = russh::keys::decode_secret_key(text, passphrase).map_err(|e| {
            let reason = if passphrase.is_none() && e.to_string().contains("encrypted") {
                "key appears to be encrypted but no passphrase was provided".to_string()
            } else {
                e.to_string()
            };
            AuthError::key("<inline>", reason)
        })?;
        Self::from_private_key(key)
    }

    /// Wrap a decoded private key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Key`] for DSA, hardware-backed and other key
    /// types that cannot sign here.
    pub fn from_private_key(key: PrivateKey) -> Result<Self> {
        let algorithm_name = match key.key_data() {
            KeypairData::Ed25519(_) | KeypairData::Ecdsa(_) => key.algorithm().as_str().to_string(),
            KeypairData::Rsa(_) => Algorithm::Rsa {
                hash: Some(HashAlg::Sha512),
            }
            .as_str()
            .to_string(),
            _ => {
                return Err(AuthError::key(
                    "<inline>",
                    format!("unsupported key type {}", key.algorithm()),
                ));
            }
        };
        let public_key_blob = key
            .public_key()
            .to_bytes()
            .map_err(|e| AuthError::key("<inline>", format!("encoding public key: {e}")))?;
        Ok(Self {
            key,
            algorithm_name,
            public_key_blob,
        })
    }

    /// Wrap an in-memory Ed25519 key.
    #[must_use]
    pub fn from_signing_key(signing_key: &SigningKey) -> Self {
        let mut public_key_blob = Vec::with_capacity(51);
        public_key_blob.put_ssh_string(ED25519.as_bytes());
        public_key_blob.put_ssh_string(signing_key.verifying_key().as_bytes());
        Self {
            key: PrivateKey::from(Ed25519Keypair::from_seed(&signing_key.to_bytes())),
            algorithm_name: ED25519.to_string(),
            public_key_blob,
        }
    }

    /// Attach a comment, usually `user@host` from the key file.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.key.set_comment(comment);
        self
    }

    /// The key's comment.
    #[must_use]
    pub fn comment(&self) -> &str {
        self.key.comment()
    }
}

impl Credential for KeyFileCredential {
    fn algorithm_name(&self) -> &str {
        &self.algorithm_name
    }

    fn public_key_blob(&self) -> &[u8] {
        &self.public_key_blob
    }

    /// Signature blob: `string` algorithm, `string` signature bytes.
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let signature: Signature = self
            .key
            .try_sign(payload)
            .map_err(|e| AuthError::signing(&*self.algorithm_name, e.to_string()))?;
        if signature.algorithm().as_str() != self.algorithm_name {
            return Err(AuthError::signing(
                &*self.algorithm_name,
                format!("key produced a {} signature", signature.algorithm()),
            ));
        }
        let data = signature.as_bytes();
        let mut blob = Vec::with_capacity(data.len() + self.algorithm_name.len() + 8);
        blob.put_ssh_string(signature.algorithm().as_str().as_bytes());
        blob.put_ssh_string(data);
        Ok(blob)
    }
}

impl std::fmt::Debug for KeyFileCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyFileCredential")
            .field("algorithm", &self.algorithm_name)
            .field("comment", &self.key.comment())
            .finish_non_exhaustive()
    }
}
