//! Credentials that record how they are used.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::credential::Credential;
use crate::error::{AuthError, Result};

/// A fake key whose "signature" is its blob followed by the signed payload.
///
/// That makes signatures checkable by [`ScriptedSession`] and lets tests
/// count signing operations.
///
/// [`ScriptedSession`]: super::ScriptedSession
#[derive(Debug)]
pub struct TestCredential {
    algorithm_name: String,
    public_key_blob: Vec<u8>,
    sign_calls: AtomicUsize,
    failing: bool,
}

impl TestCredential {
    /// Create a credential with the given algorithm and blob.
    #[must_use]
    pub fn new(algorithm_name: impl Into<String>, public_key_blob: impl Into<Vec<u8>>) -> Self {
        Self {
            algorithm_name: algorithm_name.into(),
            public_key_blob: public_key_blob.into(),
            sign_calls: AtomicUsize::new(0),
            failing: false,
        }
    }

    /// An `ssh-ed25519` credential with a blob derived from `id`.
    #[must_use]
    pub fn ed25519(id: u8) -> Self {
        Self::new("ssh-ed25519", vec![id; 32])
    }

    /// Make every `sign` call fail.
    #[must_use]
    pub const fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Number of times `sign` was called.
    #[must_use]
    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    /// The signature this credential produces for `payload`.
    #[must_use]
    pub fn expected_signature(&self, payload: &[u8]) -> Vec<u8> {
        let mut signature = self.public_key_blob.clone();
        signature.extend_from_slice(payload);
        signature
    }
}

impl Credential for TestCredential {
    fn algorithm_name(&self) -> &str {
        &self.algorithm_name
    }

    fn public_key_blob(&self) -> &[u8] {
        &self.public_key_blob
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(AuthError::signing(&self.algorithm_name, "test credential refuses to sign"));
        }
        Ok(self.expected_signature(payload))
    }
}
