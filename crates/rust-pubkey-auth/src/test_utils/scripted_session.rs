//! A fake SSH session that answers requests from a script.
//!
//! Every request the engine sends is decoded and recorded. The reply is
//! either taken from a queue of [`Response`]s, one per request, or computed
//! by a small server policy that accepts a fixed set of keys. Replies go
//! through the engine's [`DeliveryHandle`], inline from `send` by default or
//! from a separate thread after a delay.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;

use crate::error::{AuthError, Result};
use crate::exchange::DeliveryHandle;
use crate::protocol::{PublicKeyRequest, ServerMessage, UserAuthRequest};
use crate::session::AuthSession;
use crate::signature;

/// Session identifier used unless a test sets its own.
const DEFAULT_SESSION_ID: &[u8] = b"scripted-session-id";

/// What the fake server does with one request.
#[derive(Debug, Clone)]
pub enum Response {
    /// `PK_OK` echoing the algorithm and key of the request.
    ProbeOk,
    /// Send these messages, in order.
    Messages(Vec<ServerMessage>),
    /// Send a raw payload.
    Packet(Vec<u8>),
    /// Send nothing.
    Silence,
    /// Make `send` itself fail.
    SendError(String),
}

impl Response {
    /// `SSH_MSG_USERAUTH_SUCCESS`.
    #[must_use]
    pub fn success() -> Self {
        Self::Messages(vec![ServerMessage::Success])
    }

    /// `SSH_MSG_USERAUTH_FAILURE` listing `methods`.
    #[must_use]
    pub fn failure<S: Into<String>>(methods: impl IntoIterator<Item = S>) -> Self {
        Self::Messages(vec![ServerMessage::failure(methods)])
    }

    /// A failure that still allows `publickey`.
    #[must_use]
    pub fn reject() -> Self {
        Self::failure(["publickey"])
    }

    /// A single message.
    #[must_use]
    pub fn message(message: ServerMessage) -> Self {
        Self::Messages(vec![message])
    }
}

/// A registration call made by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// `register_message_type`
    Register(u8),
    /// `unregister_message_type`
    Unregister(u8),
}

#[derive(Debug)]
enum Policy {
    Script(VecDeque<Response>),
    Accepting(Vec<Vec<u8>>),
}

#[derive(Debug)]
enum Outgoing {
    Message(ServerMessage),
    Packet(Vec<u8>),
}

/// A scripted [`AuthSession`].
#[derive(Debug)]
pub struct ScriptedSession {
    session_id: Bytes,
    delivery: DeliveryHandle,
    policy: Mutex<Policy>,
    sent: Mutex<Vec<UserAuthRequest>>,
    registrations: Mutex<Vec<Registration>>,
    reply_delay: Option<Duration>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedSession {
    /// A session that never replies until given a script or policy.
    #[must_use]
    pub fn new(delivery: DeliveryHandle) -> Self {
        Self {
            session_id: Bytes::from_static(DEFAULT_SESSION_ID),
            delivery,
            policy: Mutex::new(Policy::Script(VecDeque::new())),
            sent: Mutex::new(Vec::new()),
            registrations: Mutex::new(Vec::new()),
            reply_delay: None,
        }
    }

    /// Answer requests with `responses`, one per request; once they run out
    /// the server stays silent.
    #[must_use]
    pub fn script(self, responses: impl IntoIterator<Item = Response>) -> Self {
        *lock(&self.policy) = Policy::Script(responses.into_iter().collect());
        self
    }

    /// Behave like a server that accepts exactly these key blobs, checking
    /// signatures made by [`TestCredential`](super::TestCredential).
    #[must_use]
    pub fn accepting<B: Into<Vec<u8>>>(self, blobs: impl IntoIterator<Item = B>) -> Self {
        *lock(&self.policy) = Policy::Accepting(blobs.into_iter().map(Into::into).collect());
        self
    }

    /// Use a specific session identifier.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<Bytes>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Deliver replies from another thread after `delay`.
    #[must_use]
    pub const fn reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = Some(delay);
        self
    }

    /// The handle replies are delivered through.
    #[must_use]
    pub const fn delivery(&self) -> &DeliveryHandle {
        &self.delivery
    }

    /// Every request sent so far.
    #[must_use]
    pub fn requests(&self) -> Vec<UserAuthRequest> {
        lock(&self.sent).clone()
    }

    /// The public-key requests sent so far.
    #[must_use]
    pub fn publickey_requests(&self) -> Vec<PublicKeyRequest> {
        lock(&self.sent)
            .iter()
            .filter_map(|r| match r {
                UserAuthRequest::PublicKey(request) => Some(request.clone()),
                UserAuthRequest::None { .. } => None,
            })
            .collect()
    }

    /// Registration calls, in order.
    #[must_use]
    pub fn registrations(&self) -> Vec<Registration> {
        lock(&self.registrations).clone()
    }

    /// How often `message_type` was registered.
    #[must_use]
    pub fn register_count(&self, message_type: u8) -> usize {
        self.count(Registration::Register(message_type))
    }

    /// How often `message_type` was unregistered.
    #[must_use]
    pub fn unregister_count(&self, message_type: u8) -> usize {
        self.count(Registration::Unregister(message_type))
    }

    fn count(&self, wanted: Registration) -> usize {
        lock(&self.registrations)
            .iter()
            .filter(|r| **r == wanted)
            .count()
    }

    fn respond(&self, request: &UserAuthRequest) -> Result<Vec<Outgoing>> {
        let mut policy = lock(&self.policy);
        let response = match &mut *policy {
            Policy::Script(queue) => queue.pop_front().unwrap_or(Response::Silence),
            Policy::Accepting(blobs) => self.decide(blobs, request),
        };
        drop(policy);

        Ok(match response {
            Response::ProbeOk => match request {
                UserAuthRequest::PublicKey(request) => vec![Outgoing::Message(
                    ServerMessage::pk_ok(&*request.algorithm_name, &*request.public_key_blob),
                )],
                UserAuthRequest::None { .. } => Vec::new(),
            },
            Response::Messages(messages) => messages.into_iter().map(Outgoing::Message).collect(),
            Response::Packet(payload) => vec![Outgoing::Packet(payload)],
            Response::Silence => Vec::new(),
            Response::SendError(reason) => return Err(AuthError::transport(reason)),
        })
    }

    fn decide(&self, accepted: &[Vec<u8>], request: &UserAuthRequest) -> Response {
        let UserAuthRequest::PublicKey(request) = request else {
            return Response::reject();
        };
        if !accepted.contains(&request.public_key_blob) {
            return Response::reject();
        }
        match &request.signature {
            None => Response::ProbeOk,
            Some(signature) => {
                let mut expected = request.public_key_blob.clone();
                expected.extend_from_slice(&signature::for_request(&self.session_id, request));
                if *signature == expected {
                    Response::success()
                } else {
                    Response::reject()
                }
            }
        }
    }

    fn dispatch(delivery: &DeliveryHandle, outgoing: Vec<Outgoing>) {
        for item in outgoing {
            match item {
                Outgoing::Message(message) => delivery.deliver(message),
                Outgoing::Packet(payload) => delivery.deliver_packet(&payload),
            };
        }
    }
}

impl AuthSession for ScriptedSession {
    fn session_id(&self) -> Bytes {
        self.session_id.clone()
    }

    fn register_message_type(&self, message_type: u8) {
        lock(&self.registrations).push(Registration::Register(message_type));
    }

    fn unregister_message_type(&self, message_type: u8) {
        lock(&self.registrations).push(Registration::Unregister(message_type));
    }

    fn send(&self, payload: Bytes) -> Result<()> {
        let request = UserAuthRequest::decode(&payload)?;
        lock(&self.sent).push(request.clone());
        let outgoing = self.respond(&request)?;

        match self.reply_delay {
            None => Self::dispatch(&self.delivery, outgoing),
            Some(delay) => {
                let delivery = self.delivery.clone();
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    Self::dispatch(&delivery, outgoing);
                });
            }
        }
        Ok(())
    }
}
