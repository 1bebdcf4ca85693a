//! Correlating server replies with the request in flight.
//!
//! An authentication attempt runs one request/response exchange at a time.
//! Before each request is sent the engine *arms* the slot with a fresh
//! one-shot channel; the session's dispatch thread calls
//! [`DeliveryHandle::deliver`] and the first matching reply fires that
//! channel with the typed outcome. The outcome travels as the payload of the
//! signal, so there is no flag for the waiter to read afterwards.
//!
//! Rules enforced here:
//!
//! - arming happens before sending, so a fast reply cannot be lost;
//! - a slot fires at most once per exchange;
//! - replies that arrive with nothing armed are dropped;
//! - a `PK_OK` arriving while the armed request was already signed, or
//!   naming a key other than the one offered, is dropped and the slot stays
//!   armed.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::{AuthError, Result, WaitPhase};
use crate::protocol::{FailureDetails, ServerMessage};
use crate::util::timeout::bounded;
use crate::util::to_hex;

/// Hex of the trailing bytes of a key blob, enough to tell keys apart in logs.
fn key_prefix(blob: &[u8]) -> String {
    let tail = &blob[blob.len().saturating_sub(8)..];
    format!("…{}", to_hex(tail))
}

/// What a single exchange ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The server accepted the authentication.
    Success,
    /// The server rejected this request.
    Failure(FailureDetails),
    /// The server would accept the probed key and wants a signature.
    ProbeAcknowledged,
}

/// Whether a delivered message was consumed by an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The message completed the exchange in flight.
    Delivered,
    /// Nothing was waiting for this message; it was dropped.
    Ignored,
}

impl Delivery {
    /// Whether the message completed an exchange.
    #[must_use]
    pub const fn is_delivered(self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// The key a probe acknowledgement must echo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProbeKey {
    pub(crate) algorithm_name: String,
    pub(crate) public_key_blob: Vec<u8>,
}

type Reply = Result<ExchangeOutcome>;

#[derive(Debug)]
struct Armed {
    id: u64,
    tx: oneshot::Sender<Reply>,
    probe: Option<ProbeKey>,
}

#[derive(Debug, Default)]
struct SlotState {
    armed: Option<Armed>,
    next_id: u64,
    in_use: bool,
    closed: bool,
}

/// Shared state between the waiting attempt and the delivery path.
#[derive(Debug, Default)]
pub(crate) struct ExchangeSlot {
    state: Mutex<SlotState>,
}

impl ExchangeSlot {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve the slot for one attempt.
    ///
    /// Must be taken before the attempt touches the session, so a rejected
    /// concurrent attempt leaves the running one alone.
    pub(crate) fn claim(self: &Arc<Self>) -> Result<AttemptClaim> {
        let mut state = self.lock();
        if state.closed {
            return Err(AuthError::Closed);
        }
        if state.in_use {
            return Err(AuthError::Busy);
        }
        state.in_use = true;
        Ok(AttemptClaim {
            slot: Arc::clone(self),
        })
    }

    /// Arm the slot for the next exchange.
    ///
    /// `probe` is the key a `PK_OK` must name; `None` means the request is
    /// signed and probes are not expected.
    pub(crate) fn arm(self: &Arc<Self>, probe: Option<ProbeKey>) -> Result<Waiter> {
        let mut state = self.lock();
        if state.closed {
            return Err(AuthError::Closed);
        }
        if state.armed.is_some() {
            return Err(AuthError::Busy);
        }
        let id = state.next_id;
        state.next_id += 1;
        let (tx, rx) = oneshot::channel();
        state.armed = Some(Armed { id, tx, probe });
        Ok(Waiter {
            slot: Arc::clone(self),
            id,
            rx,
        })
    }

    fn disarm(&self, id: u64) {
        let mut state = self.lock();
        if state.armed.as_ref().is_some_and(|armed| armed.id == id) {
            state.armed = None;
        }
    }

    /// Close the slot. Returns `false` if it was already closed.
    pub(crate) fn close(&self) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        if let Some(armed) = state.armed.take() {
            let _ = armed.tx.send(Err(AuthError::Closed));
        }
        true
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn fire(&self, reply: impl FnOnce(&Armed) -> Option<Reply>) -> Delivery {
        let mut state = self.lock();
        if state.closed {
            return Delivery::Ignored;
        }
        let Some(armed) = state.armed.as_ref() else {
            return Delivery::Ignored;
        };
        let Some(reply) = reply(armed) else {
            return Delivery::Ignored;
        };
        if let Some(armed) = state.armed.take() {
            // The waiter may have given up already; that is not our concern.
            let _ = armed.tx.send(reply);
        }
        Delivery::Delivered
    }
}

/// Exclusive use of the slot for one attempt; released on drop.
#[derive(Debug)]
pub(crate) struct AttemptClaim {
    slot: Arc<ExchangeSlot>,
}

impl Drop for AttemptClaim {
    fn drop(&mut self) {
        self.slot.lock().in_use = false;
    }
}

/// The receiving half of one armed exchange.
///
/// Dropping a waiter disarms the slot, so a reply that arrives after a
/// timeout or cancellation is dropped instead of completing a later exchange.
#[derive(Debug)]
pub(crate) struct Waiter {
    slot: Arc<ExchangeSlot>,
    id: u64,
    rx: oneshot::Receiver<Reply>,
}

impl Waiter {
    /// Wait for the exchange to complete.
    pub(crate) async fn wait(
        mut self,
        limit: Option<Duration>,
        cancel: &CancellationToken,
        phase: WaitPhase,
    ) -> Result<ExchangeOutcome> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(AuthError::Cancelled),
            reply = bounded(&mut self.rx, limit) => match reply {
                Some(Ok(reply)) => reply,
                // Sender dropped without firing: the slot was closed.
                Some(Err(_)) => Err(AuthError::Closed),
                None => Err(AuthError::timeout(limit.unwrap_or_default(), phase)),
            },
        }
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.slot.disarm(self.id);
    }
}

/// Handle the session's dispatch thread uses to hand replies to the engine.
///
/// Cheap to clone and safe to use from any thread.
#[derive(Debug, Clone)]
pub struct DeliveryHandle {
    slot: Arc<ExchangeSlot>,
}

impl DeliveryHandle {
    pub(crate) const fn new(slot: Arc<ExchangeSlot>) -> Self {
        Self { slot }
    }

    /// Deliver a decoded server message.
    pub fn deliver(&self, message: ServerMessage) -> Delivery {
        let delivery = match message {
            ServerMessage::Banner { message, language } => {
                tracing::info!(banner = %message.trim_end(), language = %language, "Server banner");
                Delivery::Ignored
            }
            ServerMessage::Success => self.slot.fire(|_| Some(Ok(ExchangeOutcome::Success))),
            ServerMessage::Failure(details) => self
                .slot
                .fire(|_| Some(Ok(ExchangeOutcome::Failure(details)))),
            ServerMessage::PublicKeyOk {
                algorithm_name,
                public_key_blob,
            } => self.slot.fire(|armed| {
                let expected = armed.probe.as_ref()?;
                if expected.algorithm_name == algorithm_name
                    && expected.public_key_blob == public_key_blob
                {
                    Some(Ok(ExchangeOutcome::ProbeAcknowledged))
                } else {
                    tracing::warn!(
                        algorithm = %algorithm_name,
                        key = %key_prefix(&public_key_blob),
                        offered = %key_prefix(&expected.public_key_blob),
                        "PK_OK names a key other than the one offered, dropped"
                    );
                    None
                }
            }),
        };
        if !delivery.is_delivered() {
            tracing::debug!("No exchange waiting for message, dropped");
        }
        delivery
    }

    /// Decode and deliver a raw message payload.
    ///
    /// A payload that fails to decode ends the exchange in flight with a
    /// protocol error.
    pub fn deliver_packet(&self, payload: &[u8]) -> Delivery {
        match ServerMessage::decode(payload) {
            Ok(message) => self.deliver(message),
            Err(err) => {
                tracing::warn!(error = %err, "Undecodable user-authentication message");
                let mut err = Some(err);
                self.slot.fire(|_| err.take().map(Err))
            }
        }
    }

    /// End the exchange in flight with a transport-level error.
    pub fn fail(&self, error: AuthError) -> Delivery {
        let mut error = Some(error);
        self.slot.fire(|_| error.take().map(Err))
    }

    /// Whether the owning authenticator has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.slot.is_closed()
    }
}
