//! Synchronous wrapper for async authentication.
//!
//! This module provides a blocking API for callers whose SSH transport runs
//! its own threads and has no async runtime of its own.

use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthMethod, AuthReport, PublicKeyAuthenticator};
use crate::config::AuthConfig;
use crate::credential::CredentialSet;
use crate::error::{AuthError, Result};
use crate::exchange::DeliveryHandle;
use crate::session::AuthSession;

fn runtime() -> Result<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AuthError::io_context("creating tokio runtime", e))
}

/// A synchronous authenticator.
///
/// Wraps a [`PublicKeyAuthenticator`] together with a current-thread runtime
/// and blocks the calling thread for each attempt. Replies must be delivered
/// from another thread.
#[derive(Debug)]
pub struct SyncAuthenticator {
    /// The tokio runtime.
    runtime: Runtime,
    /// The inner async authenticator.
    inner: PublicKeyAuthenticator,
}

impl SyncAuthenticator {
    /// Create a synchronous authenticator.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be created.
    pub fn new(config: AuthConfig) -> Result<Self> {
        Ok(Self {
            runtime: runtime()?,
            inner: PublicKeyAuthenticator::new(config),
        })
    }

    /// Handle for the session's dispatch thread.
    #[must_use]
    pub fn delivery(&self) -> DeliveryHandle {
        self.inner.delivery()
    }

    /// The wrapped async authenticator.
    #[must_use]
    pub const fn inner(&self) -> &PublicKeyAuthenticator {
        &self.inner
    }

    /// Authenticate with public keys, blocking until done.
    ///
    /// # Errors
    ///
    /// See [`PublicKeyAuthenticator::authenticate`].
    pub fn authenticate<S>(
        &self,
        session: &S,
        username: &str,
        credentials: &CredentialSet<'_>,
    ) -> Result<AuthReport>
    where
        S: AuthSession + ?Sized,
    {
        self.runtime
            .block_on(self.inner.authenticate(session, username, credentials))
    }

    /// Authenticate with public keys until done or `cancel` fires.
    ///
    /// `cancel` may be triggered from any thread.
    ///
    /// # Errors
    ///
    /// See [`PublicKeyAuthenticator::authenticate_with_cancel`].
    pub fn authenticate_with_cancel<S>(
        &self,
        session: &S,
        username: &str,
        credentials: &CredentialSet<'_>,
        cancel: &CancellationToken,
    ) -> Result<AuthReport>
    where
        S: AuthSession + ?Sized,
    {
        self.runtime.block_on(
            self.inner
                .authenticate_with_cancel(session, username, credentials, cancel),
        )
    }

    /// Run any supported method, blocking until done.
    ///
    /// # Errors
    ///
    /// See [`PublicKeyAuthenticator::attempt`].
    pub fn attempt<S>(
        &self,
        session: &S,
        username: &str,
        method: &AuthMethod<'_>,
    ) -> Result<AuthReport>
    where
        S: AuthSession + ?Sized,
    {
        self.runtime
            .block_on(self.inner.attempt(session, username, method))
    }

    /// Close the authenticator. Returns `false` if already closed.
    pub fn close(&self) -> bool {
        self.inner.close()
    }

    /// Run an async operation synchronously.
    pub fn block_on<F>(&self, future: F) -> F::Output
    where
        F: std::future::Future,
    {
        self.runtime.block_on(future)
    }
}

/// Run `future` to completion on a fresh current-thread runtime.
///
/// # Errors
///
/// Returns an error if the runtime cannot be created.
pub fn block_on<F>(future: F) -> Result<F::Output>
where
    F: std::future::Future,
{
    Ok(runtime()?.block_on(future))
}

/// One-shot blocking public-key authentication with an existing
/// authenticator.
///
/// # Errors
///
/// Returns an error if the runtime cannot be created, or see
/// [`PublicKeyAuthenticator::authenticate`].
pub fn authenticate_blocking<S>(
    authenticator: &PublicKeyAuthenticator,
    session: &S,
    username: &str,
    credentials: &CredentialSet<'_>,
) -> Result<AuthReport>
where
    S: AuthSession + ?Sized,
{
    block_on(authenticator.authenticate(session, username, credentials))?
}
