//! Credentials: key material that can prove possession by signing.
//!
//! The engine never sees private key bytes. It asks a [`Credential`] for its
//! algorithm and public key blob, and hands it payloads to sign.

use std::sync::Arc;

use crate::error::Result;
use crate::util::to_hex;

/// A key the engine can authenticate with.
///
/// Implementations are used by one authentication attempt at a time; `sign`
/// is never called concurrently by the engine.
pub trait Credential: Send + Sync {
    /// Public-key algorithm name, e.g. `ssh-ed25519` or `rsa-sha2-256`.
    fn algorithm_name(&self) -> &str;

    /// The public key in SSH wire encoding.
    fn public_key_blob(&self) -> &[u8];

    /// Sign `payload`, returning the SSH signature blob.
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>>;
}

impl<C: Credential + ?Sized> Credential for &C {
    fn algorithm_name(&self) -> &str {
        (**self).algorithm_name()
    }

    fn public_key_blob(&self) -> &[u8] {
        (**self).public_key_blob()
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        (**self).sign(payload)
    }
}

impl<C: Credential + ?Sized> Credential for Arc<C> {
    fn algorithm_name(&self) -> &str {
        (**self).algorithm_name()
    }

    fn public_key_blob(&self) -> &[u8] {
        (**self).public_key_blob()
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        (**self).sign(payload)
    }
}

/// Ordered credentials for one authentication attempt.
///
/// Order is trial order: the first credential the server accepts wins and the
/// rest are never tried.
#[derive(Default)]
pub struct CredentialSet<'a> {
    credentials: Vec<Box<dyn Credential + 'a>>,
}

impl<'a> CredentialSet<'a> {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            credentials: Vec::new(),
        }
    }

    /// Add a credential at the end.
    #[must_use]
    pub fn with(mut self, credential: impl Credential + 'a) -> Self {
        self.push(credential);
        self
    }

    /// Add a credential at the end.
    pub fn push(&mut self, credential: impl Credential + 'a) {
        self.credentials.push(Box::new(credential));
    }

    /// Number of credentials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Whether there is nothing to try.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Iterate in trial order.
    pub fn iter(&self) -> impl Iterator<Item = &(dyn Credential + 'a)> {
        self.credentials.iter().map(|c| &**c)
    }
}

impl<'a, C: Credential + 'a> FromIterator<C> for CredentialSet<'a> {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        let mut set = Self::new();
        for credential in iter {
            set.push(credential);
        }
        set
    }
}

impl std::fmt::Debug for CredentialSet<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|c| {
                let blob = c.public_key_blob();
                let tail = &blob[blob.len().saturating_sub(8)..];
                format!("{} …{}", c.algorithm_name(), to_hex(tail))
            }))
            .finish()
    }
}
