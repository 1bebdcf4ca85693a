//! The transport seam the engine drives.
//!
//! Connection setup, key exchange, encryption and packet framing all live
//! behind [`AuthSession`]. The engine only needs the session identifier, a way
//! to send an encoded request, and a way to tell the session which
//! method-specific message numbers to route back. Replies travel the other
//! way through a [`DeliveryHandle`](crate::exchange::DeliveryHandle).

use bytes::Bytes;

use crate::error::Result;

/// What the engine needs from an SSH transport.
///
/// Implementations are shared between the calling task and the session's
/// dispatch thread, so they take `&self` and must be `Send + Sync`.
pub trait AuthSession: Send + Sync {
    /// Exchange hash of the first key exchange; stable for the connection.
    fn session_id(&self) -> Bytes;

    /// Start routing messages numbered `message_type` to the engine.
    fn register_message_type(&self, message_type: u8);

    /// Stop routing messages numbered `message_type` to the engine.
    fn unregister_message_type(&self, message_type: u8);

    /// Queue an encoded user-authentication message for sending.
    ///
    /// Returns once the message is handed to the transport; replies arrive
    /// asynchronously.
    fn send(&self, payload: Bytes) -> Result<()>;
}

impl<S: AuthSession + ?Sized> AuthSession for &S {
    fn session_id(&self) -> Bytes {
        (**self).session_id()
    }

    fn register_message_type(&self, message_type: u8) {
        (**self).register_message_type(message_type);
    }

    fn unregister_message_type(&self, message_type: u8) {
        (**self).unregister_message_type(message_type);
    }

    fn send(&self, payload: Bytes) -> Result<()> {
        (**self).send(payload)
    }
}

impl<S: AuthSession + ?Sized> AuthSession for std::sync::Arc<S> {
    fn session_id(&self) -> Bytes {
        (**self).session_id()
    }

    fn register_message_type(&self, message_type: u8) {
        (**self).register_message_type(message_type);
    }

    fn unregister_message_type(&self, message_type: u8) {
        (**self).unregister_message_type(message_type);
    }

    fn send(&self, payload: Bytes) -> Result<()> {
        (**self).send(payload)
    }
}

/// Keeps a message type registered for as long as it lives.
///
/// Unregistration runs in `Drop`, so every exit path of an attempt
/// (success, exhaustion, `?` on an error, cancellation, a panic unwinding)
/// releases the registration exactly once.
#[must_use = "the message type is unregistered when the guard is dropped"]
pub struct MessageTypeGuard<'s, S: AuthSession + ?Sized> {
    session: &'s S,
    message_type: u8,
}

impl<'s, S: AuthSession + ?Sized> MessageTypeGuard<'s, S> {
    /// Register `message_type` on `session`.
    pub fn register(session: &'s S, message_type: u8) -> Self {
        tracing::trace!(message_type, "registering message type");
        session.register_message_type(message_type);
        Self {
            session,
            message_type,
        }
    }

    /// The registered message number.
    #[must_use]
    pub const fn message_type(&self) -> u8 {
        self.message_type
    }
}

impl<S: AuthSession + ?Sized> Drop for MessageTypeGuard<'_, S> {
    fn drop(&mut self) {
        tracing::trace!(message_type = self.message_type, "unregistering message type");
        self.session.unregister_message_type(self.message_type);
    }
}

impl<S: AuthSession + ?Sized> std::fmt::Debug for MessageTypeGuard<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageTypeGuard")
            .field("message_type", &self.message_type)
            .finish_non_exhaustive()
    }
}
