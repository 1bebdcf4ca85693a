//! The per-credential public-key state machine.
//!
//! ```text
//! Start ──► AwaitFirstResponse ──► Success | Failure
//!                   │
//!                   └─ PK_OK ──► AwaitSecondResponse ──► Success | Failure
//! ```
//!
//! A credential is either signed up front (optimistic) and needs a single
//! round trip, or probed unsigned first and only signed once the server has
//! said it would accept the key.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{AttemptOutcome, CredentialAttempt};
use crate::credential::Credential;
use crate::error::{AuthError, Result, WaitPhase};
use crate::exchange::{ExchangeOutcome, ExchangeSlot, ProbeKey, Waiter};
use crate::protocol::{PublicKeyRequest, UserAuthRequest};
use crate::session::AuthSession;
use crate::signature;

/// Where a credential's exchange stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Nothing sent yet.
    Start,
    /// First request sent, waiting for success, failure or a probe.
    AwaitFirstResponse,
    /// Probe acknowledged and signed request sent.
    AwaitSecondResponse,
    /// The server accepted the key.
    Success,
    /// The server rejected the key.
    Failure,
}

impl CredentialState {
    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

/// Everything one attempt shares across its credentials.
pub(crate) struct CredentialRun<'r, S: AuthSession + ?Sized> {
    pub(crate) session: &'r S,
    pub(crate) session_id: &'r [u8],
    pub(crate) username: &'r str,
    pub(crate) slot: &'r Arc<ExchangeSlot>,
    pub(crate) cancel: &'r CancellationToken,
    pub(crate) response_timeout: Option<Duration>,
}

impl<S: AuthSession + ?Sized> CredentialRun<'_, S> {
    /// Drive one credential to a terminal state.
    ///
    /// Rejection is an `Ok` outcome; errors end the whole attempt.
    pub(crate) async fn run(
        &self,
        credential: &dyn Credential,
        sign_first: bool,
    ) -> Result<CredentialAttempt> {
        let algorithm = credential.algorithm_name();
        let mut attempt = CredentialAttempt::new(algorithm);
        let mut state = CredentialState::Start;

        let mut request =
            PublicKeyRequest::new(self.username, algorithm, credential.public_key_blob());
        if sign_first {
            request = self.sign(credential, request)?;
            attempt.signed = true;
        }

        let waiter = self.send(&request)?;
        self.transition(&mut state, CredentialState::AwaitFirstResponse, algorithm);

        match self.wait(waiter, WaitPhase::FirstResponse).await? {
            ExchangeOutcome::Success => {
                self.transition(&mut state, CredentialState::Success, algorithm);
                attempt.outcome = AttemptOutcome::Accepted;
                return Ok(attempt);
            }
            ExchangeOutcome::Failure(details) => {
                self.transition(&mut state, CredentialState::Failure, algorithm);
                attempt.outcome = AttemptOutcome::Rejected(details);
                return Ok(attempt);
            }
            ExchangeOutcome::ProbeAcknowledged if request.is_signed() => {
                return Err(AuthError::protocol("PK_OK in answer to a signed request"));
            }
            ExchangeOutcome::ProbeAcknowledged => {
                tracing::debug!(user = %self.username, algorithm, "Server would accept key, signing");
                attempt.probe_acknowledged = true;
            }
        }

        let request = self.sign(credential, request)?;
        attempt.signed = true;
        let waiter = self.send(&request)?;
        self.transition(&mut state, CredentialState::AwaitSecondResponse, algorithm);

        match self.wait(waiter, WaitPhase::SecondResponse).await? {
            ExchangeOutcome::Success => {
                self.transition(&mut state, CredentialState::Success, algorithm);
                attempt.outcome = AttemptOutcome::Accepted;
            }
            ExchangeOutcome::Failure(details) => {
                self.transition(&mut state, CredentialState::Failure, algorithm);
                attempt.outcome = AttemptOutcome::Rejected(details);
            }
            ExchangeOutcome::ProbeAcknowledged => {
                return Err(AuthError::protocol("PK_OK in answer to a signed request"));
            }
        }
        Ok(attempt)
    }

    fn transition(&self, state: &mut CredentialState, next: CredentialState, algorithm: &str) {
        debug_assert!(!state.is_terminal(), "transition out of terminal state");
        tracing::debug!(
            user = %self.username,
            algorithm,
            from = ?*state,
            to = ?next,
            "Credential state change"
        );
        *state = next;
    }

    fn sign(
        &self,
        credential: &dyn Credential,
        request: PublicKeyRequest,
    ) -> Result<PublicKeyRequest> {
        let payload = signature::for_request(self.session_id, &request);
        let signature = credential.sign(&payload).map_err(|e| match e {
            AuthError::Signing { .. } => e,
            other => AuthError::signing(credential.algorithm_name(), other.to_string()),
        })?;
        Ok(request.with_signature(signature))
    }

    /// Arm the slot, then send. Arming first means a reply racing the
    /// `send` call still finds its waiter.
    fn send(&self, request: &PublicKeyRequest) -> Result<Waiter> {
        let probe = (!request.is_signed()).then(|| ProbeKey {
            algorithm_name: request.algorithm_name.clone(),
            public_key_blob: request.public_key_blob.clone(),
        });
        let waiter = self.slot.arm(probe)?;
        tracing::trace!(
            user = %self.username,
            algorithm = %request.algorithm_name,
            signed = request.is_signed(),
            "Sending public key request"
        );
        self.session.send(UserAuthRequest::from(request.clone()).encode())?;
        Ok(waiter)
    }

    async fn wait(&self, waiter: Waiter, phase: WaitPhase) -> Result<ExchangeOutcome> {
        waiter.wait(self.response_timeout, self.cancel, phase).await
    }
}
