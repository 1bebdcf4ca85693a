//! The authentication orchestrator.
//!
//! [`PublicKeyAuthenticator`] owns the exchange slot for one connection. It
//! runs an [`AuthMethod`] against an [`AuthSession`]: for public keys it walks
//! the credentials in order, stops at the first the server accepts, and keeps
//! the `PK_OK` message type registered for exactly the duration of the walk.
//!
//! # Example
//!
//! ```ignore
//! let auth = PublicKeyAuthenticator::new(AuthConfig::default());
//! let delivery = auth.delivery();
//! // hand `delivery` to the session's dispatch thread, then:
//! let report = auth.authenticate(&session, "deploy", &credentials).await?;
//! if report.is_authenticated() {
//!     // open channels
//! }
//! ```

pub mod publickey;

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

pub use self::publickey::CredentialState;
use self::publickey::CredentialRun;
use crate::config::AuthConfig;
use crate::credential::CredentialSet;
use crate::error::{AuthError, Result, WaitPhase};
use crate::exchange::{DeliveryHandle, ExchangeOutcome, ExchangeSlot};
use crate::protocol::{FailureDetails, UserAuthRequest, msg};
use crate::session::{AuthSession, MessageTypeGuard};

/// A way of authenticating the engine knows how to run.
#[derive(Debug)]
pub enum AuthMethod<'a> {
    /// Ask which methods the server allows without proving anything.
    None,
    /// Prove possession of one of these keys, tried in order.
    PublicKey(CredentialSet<'a>),
}

impl AuthMethod<'_> {
    /// Protocol name of the method.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => crate::protocol::METHOD_NONE,
            Self::PublicKey(_) => crate::protocol::METHOD_PUBLICKEY,
        }
    }
}

/// How one credential fared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The server accepted the key.
    Accepted,
    /// The server rejected the key.
    Rejected(FailureDetails),
}

/// Trace of one credential's exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialAttempt {
    /// Algorithm of the credential.
    pub algorithm_name: String,
    /// Whether the server acknowledged an unsigned probe.
    pub probe_acknowledged: bool,
    /// Whether a signature was produced for this credential.
    pub signed: bool,
    /// Terminal outcome.
    pub outcome: AttemptOutcome,
}

impl CredentialAttempt {
    pub(crate) fn new(algorithm_name: &str) -> Self {
        Self {
            algorithm_name: algorithm_name.to_string(),
            probe_acknowledged: false,
            signed: false,
            outcome: AttemptOutcome::Rejected(FailureDetails::default()),
        }
    }

    /// Whether the server accepted this credential.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Accepted)
    }
}

/// Overall result of an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    /// The server accepted the authentication.
    Authenticated,
    /// Every request was rejected; carries the last failure message.
    Rejected(FailureDetails),
    /// There was nothing to try.
    NotAttempted,
}

/// What an attempt did and how it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthReport {
    /// Overall result.
    pub status: AuthStatus,
    /// Per-credential trace, in trial order.
    pub attempts: Vec<CredentialAttempt>,
}

impl AuthReport {
    const fn not_attempted() -> Self {
        Self {
            status: AuthStatus::NotAttempted,
            attempts: Vec::new(),
        }
    }

    /// Whether the server accepted the authentication.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.status, AuthStatus::Authenticated)
    }

    /// The server's last failure message, if the attempt was rejected.
    #[must_use]
    pub fn failure(&self) -> Option<&FailureDetails> {
        match &self.status {
            AuthStatus::Rejected(details) => Some(details),
            _ => None,
        }
    }

    /// The credential the server accepted.
    #[must_use]
    pub fn accepted(&self) -> Option<&CredentialAttempt> {
        self.attempts.iter().find(|a| a.is_accepted())
    }
}

/// Runs authentication methods for one connection.
///
/// Replies reach the authenticator through the [`DeliveryHandle`] returned by
/// [`delivery`](Self::delivery). One attempt may be in flight at a time.
#[derive(Debug)]
pub struct PublicKeyAuthenticator {
    config: AuthConfig,
    slot: Arc<ExchangeSlot>,
    cancel: CancellationToken,
}

impl PublicKeyAuthenticator {
    /// Create an authenticator.
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            slot: ExchangeSlot::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Handle for the session's dispatch thread.
    #[must_use]
    pub fn delivery(&self) -> DeliveryHandle {
        DeliveryHandle::new(Arc::clone(&self.slot))
    }

    /// Token that cancels the attempt in flight, and every later one.
    ///
    /// To cancel a single attempt, pass a token to
    /// [`authenticate_with_cancel`](Self::authenticate_with_cancel) or
    /// [`attempt_with_cancel`](Self::attempt_with_cancel) instead.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.slot.is_closed()
    }

    /// Release the authenticator.
    ///
    /// Wakes a waiting attempt with [`AuthError::Closed`]; later deliveries
    /// are dropped and later attempts fail. Returns `false` if already closed.
    pub fn close(&self) -> bool {
        let closed = self.slot.close();
        if closed {
            tracing::debug!("Authenticator closed");
        }
        closed
    }

    /// Authenticate `username` with public keys, trying `credentials` in
    /// order.
    ///
    /// A lone credential is signed on the first request (unless disabled in
    /// the config). With several, each is first offered unsigned and only
    /// signed after the server acknowledges it.
    ///
    /// # Errors
    ///
    /// Rejection is not an error; it is reported as
    /// [`AuthStatus::Rejected`]. Errors are protocol violations, send
    /// failures, signing failures, timeouts, cancellation, use after close and
    /// [`AuthError::Busy`] if another attempt is running.
    pub async fn authenticate<S>(
        &self,
        session: &S,
        username: &str,
        credentials: &CredentialSet<'_>,
    ) -> Result<AuthReport>
    where
        S: AuthSession + ?Sized,
    {
        if self.is_closed() {
            return Err(AuthError::Closed);
        }
        if credentials.is_empty() {
            tracing::debug!(user = %username, "No credentials, public key authentication not attempted");
            return Ok(AuthReport::not_attempted());
        }

        let _claim = self.slot.claim()?;
        let _registration = MessageTypeGuard::register(session, msg::USERAUTH_PK_OK);
        let session_id = session.session_id();
        let run = CredentialRun {
            session,
            session_id: &session_id,
            username,
            slot: &self.slot,
            cancel: &self.cancel,
            response_timeout: self.config.response_timeout,
        };
        let sign_first = self.config.optimistic_single_key && credentials.len() == 1;

        let mut attempts = Vec::with_capacity(credentials.len());
        for (index, credential) in credentials.iter().enumerate() {
            tracing::debug!(
                user = %username,
                algorithm = credential.algorithm_name(),
                credential = index,
                "Attempting public key authentication"
            );
            let attempt = run.run(credential, sign_first).await?;
            let accepted = attempt.is_accepted();
            attempts.push(attempt);
            if accepted {
                tracing::info!(
                    user = %username,
                    algorithm = credential.algorithm_name(),
                    credential = index,
                    "Public key authentication successful"
                );
                return Ok(AuthReport {
                    status: AuthStatus::Authenticated,
                    attempts,
                });
            }
            tracing::debug!(
                user = %username,
                algorithm = credential.algorithm_name(),
                credential = index,
                "Public key authentication failed"
            );
        }

        let last = attempts
            .iter()
            .rev()
            .find_map(|a| match &a.outcome {
                AttemptOutcome::Rejected(details) => Some(details.clone()),
                AttemptOutcome::Accepted => None,
            })
            .unwrap_or_default();
        Ok(AuthReport {
            status: AuthStatus::Rejected(last),
            attempts,
        })
    }

    /// Like [`authenticate`](Self::authenticate), but gives up with
    /// [`AuthError::Cancelled`] once `cancel` fires.
    ///
    /// Only this attempt is affected; the authenticator stays usable.
    ///
    /// # Errors
    ///
    /// See [`authenticate`](Self::authenticate).
    pub async fn authenticate_with_cancel<S>(
        &self,
        session: &S,
        username: &str,
        credentials: &CredentialSet<'_>,
        cancel: &CancellationToken,
    ) -> Result<AuthReport>
    where
        S: AuthSession + ?Sized,
    {
        until_cancelled(cancel, self.authenticate(session, username, credentials)).await
    }

    /// Run any supported method.
    ///
    /// # Errors
    ///
    /// See [`authenticate`](Self::authenticate).
    pub async fn attempt<S>(
        &self,
        session: &S,
        username: &str,
        method: &AuthMethod<'_>,
    ) -> Result<AuthReport>
    where
        S: AuthSession + ?Sized,
    {
        match method {
            AuthMethod::None => self.query_methods(session, username).await,
            AuthMethod::PublicKey(credentials) => {
                self.authenticate(session, username, credentials).await
            }
        }
    }

    /// Like [`attempt`](Self::attempt), scoped to `cancel`.
    ///
    /// # Errors
    ///
    /// See [`authenticate`](Self::authenticate).
    pub async fn attempt_with_cancel<S>(
        &self,
        session: &S,
        username: &str,
        method: &AuthMethod<'_>,
        cancel: &CancellationToken,
    ) -> Result<AuthReport>
    where
        S: AuthSession + ?Sized,
    {
        until_cancelled(cancel, self.attempt(session, username, method)).await
    }

    /// Send a `none` request. Servers answer with the methods that can
    /// continue, or accept outright if no authentication is required.
    async fn query_methods<S>(&self, session: &S, username: &str) -> Result<AuthReport>
    where
        S: AuthSession + ?Sized,
    {
        let _claim = self.slot.claim()?;
        let waiter = self.slot.arm(None)?;
        tracing::debug!(user = %username, "Querying allowed authentication methods");
        session.send(UserAuthRequest::none(username).encode())?;

        let status = match waiter
            .wait(self.config.response_timeout, &self.cancel, WaitPhase::FirstResponse)
            .await?
        {
            ExchangeOutcome::Success => {
                tracing::info!(user = %username, "Server requires no authentication");
                AuthStatus::Authenticated
            }
            ExchangeOutcome::Failure(details) => {
                tracing::debug!(user = %username, methods = ?details.methods, "Server listed methods");
                AuthStatus::Rejected(details)
            }
            ExchangeOutcome::ProbeAcknowledged => {
                return Err(AuthError::protocol("PK_OK in answer to a none request"));
            }
        };
        Ok(AuthReport {
            status,
            attempts: Vec::new(),
        })
    }
}

/// Drive `attempt` unless `cancel` fires first.
///
/// Dropping the attempt releases its registration, armed exchange and claim.
async fn until_cancelled<F>(cancel: &CancellationToken, attempt: F) -> Result<AuthReport>
where
    F: Future<Output = Result<AuthReport>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            tracing::debug!("Authentication attempt cancelled");
            Err(AuthError::Cancelled)
        }
        report = attempt => report,
    }
}

impl Default for PublicKeyAuthenticator {
    fn default() -> Self {
        Self::new(AuthConfig::default())
    }
}

impl Drop for PublicKeyAuthenticator {
    fn drop(&mut self) {
        self.close();
    }
}
