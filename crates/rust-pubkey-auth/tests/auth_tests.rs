//! Integration tests for the public-key authentication engine.

use std::time::Duration;

use rust_pubkey_auth::protocol::msg;
use rust_pubkey_auth::{
    AuthConfig, AuthError, AuthMethod, AuthStatus, CredentialSet, Delivery, PublicKeyAuthenticator,
    Registration, Response, ScriptedSession, ServerMessage, TestCredential, UserAuthRequest,
    WaitPhase, signature,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn bracketed() -> Vec<Registration> {
    vec![
        Registration::Register(msg::USERAUTH_PK_OK),
        Registration::Unregister(msg::USERAUTH_PK_OK),
    ]
}

// =============================================================================
// Signing policy
// =============================================================================

#[tokio::test]
async fn single_credential_signs_first_request() {
    init_tracing();
    let auth = PublicKeyAuthenticator::default();
    let session = ScriptedSession::new(auth.delivery()).script([Response::success()]);
    let key = TestCredential::ed25519(1);

    let report = auth
        .authenticate(&session, "alice", &CredentialSet::new().with(&key))
        .await
        .unwrap();

    assert!(report.is_authenticated());
    let requests = session.publickey_requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].is_signed());
    assert_eq!(key.sign_calls(), 1);
    assert!(!report.attempts[0].probe_acknowledged);

    let payload = signature::for_request(b"scripted-session-id", &requests[0]);
    assert_eq!(requests[0].signature, Some(key.expected_signature(&payload)));
}

#[tokio::test]
async fn single_credential_probes_when_optimism_disabled() {
    let auth = PublicKeyAuthenticator::new(AuthConfig::new().optimistic_single_key(false));
    let session =
        ScriptedSession::new(auth.delivery()).script([Response::ProbeOk, Response::success()]);
    let key = TestCredential::ed25519(1);

    let report = auth
        .authenticate(&session, "alice", &CredentialSet::new().with(&key))
        .await
        .unwrap();

    assert!(report.is_authenticated());
    let requests = session.publickey_requests();
    assert_eq!(requests.len(), 2);
    assert!(!requests[0].is_signed());
    assert!(requests[1].is_signed());
    assert!(report.attempts[0].probe_acknowledged);
}

#[tokio::test]
async fn multiple_credentials_sign_only_after_probe() {
    init_tracing();
    let auth = PublicKeyAuthenticator::default();
    let session = ScriptedSession::new(auth.delivery()).accepting([vec![2; 32]]);
    let first = TestCredential::ed25519(1);
    let second = TestCredential::ed25519(2);

    let report = auth
        .authenticate(&session, "bob", &CredentialSet::new().with(&first).with(&second))
        .await
        .unwrap();

    assert!(report.is_authenticated());
    let requests = session.publickey_requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].public_key_blob, vec![1; 32]);
    assert!(!requests[0].is_signed());
    assert_eq!(requests[1].public_key_blob, vec![2; 32]);
    assert!(!requests[1].is_signed());
    assert_eq!(requests[2].public_key_blob, vec![2; 32]);
    assert!(requests[2].is_signed());

    assert_eq!(first.sign_calls(), 0);
    assert_eq!(second.sign_calls(), 1);
    assert_eq!(report.accepted().unwrap().algorithm_name, "ssh-ed25519");
}

#[tokio::test]
async fn signed_follow_up_reuses_request_fields() {
    let auth = PublicKeyAuthenticator::default();
    let session = ScriptedSession::new(auth.delivery())
        .with_session_id(&b"another-exchange-hash"[..])
        .accepting([vec![1; 32]]);
    let key = TestCredential::new("rsa-sha2-256", vec![1; 32]);
    let other = TestCredential::ed25519(9);

    let report = auth
        .authenticate(&session, "carol", &CredentialSet::new().with(&key).with(&other))
        .await
        .unwrap();

    assert!(report.is_authenticated());
    let requests = session.publickey_requests();
    assert_eq!(requests.len(), 2);
    let (probe, signed) = (&requests[0], &requests[1]);
    assert_eq!(probe.username, signed.username);
    assert_eq!(probe.service_name, "ssh-connection");
    assert_eq!(signed.service_name, "ssh-connection");
    assert_eq!(probe.algorithm_name, signed.algorithm_name);
    assert_eq!(probe.public_key_blob, signed.public_key_blob);
}

// =============================================================================
// Credential iteration
// =============================================================================

#[tokio::test]
async fn first_success_wins() {
    let auth = PublicKeyAuthenticator::default();
    let session = ScriptedSession::new(auth.delivery()).accepting([vec![2; 32], vec![3; 32]]);
    let keys: Vec<_> = (1..=4).map(TestCredential::ed25519).collect();
    let credentials: CredentialSet<'_> = keys.iter().collect();

    let report = auth.authenticate(&session, "dave", &credentials).await.unwrap();

    assert!(report.is_authenticated());
    assert_eq!(report.attempts.len(), 2);
    let tried: Vec<_> = session
        .publickey_requests()
        .into_iter()
        .map(|r| r.public_key_blob[0])
        .collect();
    assert_eq!(tried, vec![1, 2, 2]);
    assert_eq!(keys[2].sign_calls(), 0);
    assert_eq!(keys[3].sign_calls(), 0);
}

#[tokio::test]
async fn exhaustion_without_probes_sends_one_request_each() {
    let auth = PublicKeyAuthenticator::default();
    let session = ScriptedSession::new(auth.delivery()).accepting(Vec::<Vec<u8>>::new());
    let keys: Vec<_> = (1..=3).map(TestCredential::ed25519).collect();
    let credentials: CredentialSet<'_> = keys.iter().collect();

    let report = auth.authenticate(&session, "erin", &credentials).await.unwrap();

    assert!(!report.is_authenticated());
    assert!(report.failure().unwrap().allows("publickey"));
    assert_eq!(session.publickey_requests().len(), 3);
    assert!(keys.iter().all(|k| k.sign_calls() == 0));
    assert_eq!(session.registrations(), bracketed());
}

#[tokio::test]
async fn exhaustion_with_probes_sends_two_requests_each() {
    let auth = PublicKeyAuthenticator::default();
    let session = ScriptedSession::new(auth.delivery()).script([
        Response::ProbeOk,
        Response::reject(),
        Response::ProbeOk,
        Response::failure(["password", "keyboard-interactive"]),
    ]);
    let first = TestCredential::ed25519(1);
    let second = TestCredential::ed25519(2);

    let report = auth
        .authenticate(&session, "frank", &CredentialSet::new().with(&first).with(&second))
        .await
        .unwrap();

    assert_eq!(session.publickey_requests().len(), 4);
    let details = report.failure().unwrap();
    assert!(details.allows("password"));
    assert!(!details.allows("publickey"));
    assert!(report.attempts.iter().all(|a| a.probe_acknowledged && a.signed));
}

#[tokio::test]
async fn empty_credentials_are_not_attempted() {
    let auth = PublicKeyAuthenticator::default();
    let session = ScriptedSession::new(auth.delivery());

    let report = auth
        .authenticate(&session, "gina", &CredentialSet::new())
        .await
        .unwrap();

    assert_eq!(report.status, AuthStatus::NotAttempted);
    assert!(session.requests().is_empty());
    assert!(session.registrations().is_empty());
}

// =============================================================================
// Registration bracketing
// =============================================================================

#[tokio::test]
async fn registration_bracketed_on_early_success() {
    let auth = PublicKeyAuthenticator::default();
    let session = ScriptedSession::new(auth.delivery()).accepting([vec![1; 32]]);
    let keys: Vec<_> = (1..=3).map(TestCredential::ed25519).collect();
    let credentials: CredentialSet<'_> = keys.iter().collect();

    auth.authenticate(&session, "hank", &credentials).await.unwrap();

    assert_eq!(session.register_count(msg::USERAUTH_PK_OK), 1);
    assert_eq!(session.unregister_count(msg::USERAUTH_PK_OK), 1);
    assert_eq!(session.registrations(), bracketed());
}

#[tokio::test]
async fn registration_bracketed_on_protocol_error() {
    let auth = PublicKeyAuthenticator::default();
    let session = ScriptedSession::new(auth.delivery()).script([Response::Packet(vec![99])]);
    let first = TestCredential::ed25519(1);
    let second = TestCredential::ed25519(2);

    let err = auth
        .authenticate(&session, "ivy", &CredentialSet::new().with(&first).with(&second))
        .await
        .unwrap_err();

    assert!(err.is_protocol());
    assert_eq!(session.requests().len(), 1);
    assert_eq!(session.registrations(), bracketed());
}

// =============================================================================
// Server message handling
// =============================================================================

#[tokio::test]
async fn late_pk_ok_for_previous_key_is_dropped() {
    init_tracing();
    let auth = PublicKeyAuthenticator::default();
    let session = ScriptedSession::new(auth.delivery()).script([
        Response::reject(),
        Response::Messages(vec![
            ServerMessage::pk_ok("ssh-ed25519", vec![1; 32]),
            ServerMessage::pk_ok("ssh-ed25519", vec![2; 32]),
        ]),
        Response::success(),
    ]);
    let first = TestCredential::ed25519(1);
    let second = TestCredential::ed25519(2);

    let report = auth
        .authenticate(&session, "jack", &CredentialSet::new().with(&first).with(&second))
        .await
        .unwrap();

    assert!(report.is_authenticated());
    assert_eq!(first.sign_calls(), 0);
    assert_eq!(second.sign_calls(), 1);
    assert!(report.attempts[1].probe_acknowledged);
    assert_eq!(session.publickey_requests().len(), 3);
}

#[tokio::test]
async fn pk_ok_for_unknown_key_leaves_exchange_waiting() {
    let auth = PublicKeyAuthenticator::new(
        AuthConfig::new().response_timeout(Duration::from_millis(30)),
    );
    let session = ScriptedSession::new(auth.delivery()).script([Response::message(
        ServerMessage::pk_ok("ssh-rsa", vec![9; 16]),
    )]);
    let first = TestCredential::ed25519(1);
    let second = TestCredential::ed25519(2);

    let err = auth
        .authenticate(&session, "jill", &CredentialSet::new().with(&first).with(&second))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(first.sign_calls(), 0);
    assert_eq!(session.registrations(), bracketed());
}

#[tokio::test]
async fn probe_during_signed_request_is_ignored() {
    let auth = PublicKeyAuthenticator::default();
    let key = TestCredential::ed25519(1);
    let session = ScriptedSession::new(auth.delivery()).script([Response::Messages(vec![
        ServerMessage::pk_ok("ssh-ed25519", vec![1; 32]),
        ServerMessage::Success,
    ])]);

    let report = auth
        .authenticate(&session, "kate", &CredentialSet::new().with(&key))
        .await
        .unwrap();

    assert!(report.is_authenticated());
    assert_eq!(session.requests().len(), 1);
    assert_eq!(key.sign_calls(), 1);
}

#[tokio::test]
async fn stale_probe_after_completion_is_dropped() {
    let auth = PublicKeyAuthenticator::default();
    let session = ScriptedSession::new(auth.delivery()).script([Response::success()]);
    let key = TestCredential::ed25519(1);

    let report = auth
        .authenticate(&session, "liam", &CredentialSet::new().with(&key))
        .await
        .unwrap();
    assert!(report.is_authenticated());

    let late = session
        .delivery()
        .deliver(ServerMessage::pk_ok("ssh-ed25519", vec![1; 32]));
    assert_eq!(late, Delivery::Ignored);
    assert_eq!(session.requests().len(), 1);
    assert_eq!(key.sign_calls(), 1);
}

#[tokio::test]
async fn banner_does_not_complete_exchange() {
    let auth = PublicKeyAuthenticator::default();
    let session = ScriptedSession::new(auth.delivery()).script([Response::Messages(vec![
        ServerMessage::Banner {
            message: "Authorized use only\r\n".to_string(),
            language: "en".to_string(),
        },
        ServerMessage::Success,
    ])]);
    let key = TestCredential::ed25519(1);

    let report = auth
        .authenticate(&session, "mia", &CredentialSet::new().with(&key))
        .await
        .unwrap();

    assert!(report.is_authenticated());
}

#[tokio::test]
async fn replies_from_another_thread() {
    let auth = PublicKeyAuthenticator::default();
    let session = ScriptedSession::new(auth.delivery())
        .accepting([vec![2; 32]])
        .reply_delay(Duration::from_millis(5));
    let first = TestCredential::ed25519(1);
    let second = TestCredential::ed25519(2);

    let report = auth
        .authenticate(&session, "noah", &CredentialSet::new().with(&first).with(&second))
        .await
        .unwrap();

    assert!(report.is_authenticated());
    assert_eq!(session.requests().len(), 3);
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn send_failure_propagates() {
    let auth = PublicKeyAuthenticator::default();
    let session = ScriptedSession::new(auth.delivery())
        .script([Response::SendError("broken pipe".to_string())]);
    let key = TestCredential::ed25519(1);

    let err = auth
        .authenticate(&session, "olga", &CredentialSet::new().with(&key))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Transport { .. }));
    assert!(err.to_string().contains("broken pipe"));
    assert_eq!(session.registrations(), bracketed());
}

#[tokio::test]
async fn signing_failure_is_fatal() {
    let auth = PublicKeyAuthenticator::default();
    let session = ScriptedSession::new(auth.delivery()).script([Response::success()]);
    let key = TestCredential::ed25519(1).failing();

    let err = auth
        .authenticate(&session, "pete", &CredentialSet::new().with(&key))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Signing { .. }));
    assert!(session.requests().is_empty());
}

#[tokio::test]
async fn silent_server_times_out() {
    let auth =
        PublicKeyAuthenticator::new(AuthConfig::new().response_timeout(Duration::from_millis(30)));
    let session = ScriptedSession::new(auth.delivery());
    let key = TestCredential::ed25519(1);

    let err = auth
        .authenticate(&session, "quinn", &CredentialSet::new().with(&key))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AuthError::Timeout {
            phase: WaitPhase::FirstResponse,
            ..
        }
    ));
    assert_eq!(session.registrations(), bracketed());
}

#[tokio::test]
async fn timeout_after_probe_names_second_phase() {
    let auth = PublicKeyAuthenticator::new(
        AuthConfig::new()
            .response_timeout(Duration::from_millis(30))
            .optimistic_single_key(false),
    );
    let session = ScriptedSession::new(auth.delivery()).script([Response::ProbeOk]);
    let key = TestCredential::ed25519(1);

    let err = auth
        .authenticate(&session, "rosa", &CredentialSet::new().with(&key))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AuthError::Timeout {
            phase: WaitPhase::SecondResponse,
            ..
        }
    ));
}

#[tokio::test]
async fn cancellation_unblocks_wait() {
    let auth = PublicKeyAuthenticator::new(AuthConfig::new().no_response_timeout());
    let session = ScriptedSession::new(auth.delivery());
    let key = TestCredential::ed25519(1);

    let token = auth.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let err = auth
        .authenticate(&session, "sam", &CredentialSet::new().with(&key))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Cancelled));
    assert_eq!(session.registrations(), bracketed());
}

#[tokio::test]
async fn cancelling_one_attempt_leaves_authenticator_usable() {
    let auth = PublicKeyAuthenticator::new(AuthConfig::new().no_response_timeout());
    let silent = ScriptedSession::new(auth.delivery());
    let key = TestCredential::ed25519(1);
    let credentials = CredentialSet::new().with(&key);

    let token = tokio_util::sync::CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = auth
        .authenticate_with_cancel(&silent, "sam", &credentials, &token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Cancelled));
    assert_eq!(silent.registrations(), bracketed());
    assert!(!auth.cancel_token().is_cancelled());

    let session = ScriptedSession::new(auth.delivery()).script([Response::success()]);
    let report = auth
        .authenticate(&session, "sam", &credentials)
        .await
        .unwrap();
    assert!(report.is_authenticated());
}

// =============================================================================
// Concurrent use
// =============================================================================

#[tokio::test]
async fn concurrent_attempt_is_busy_and_leaves_registration_alone() {
    let auth = PublicKeyAuthenticator::default();
    let session = ScriptedSession::new(auth.delivery())
        .script([Response::success()])
        .reply_delay(Duration::from_millis(50));
    let first = TestCredential::ed25519(1);
    let second = TestCredential::ed25519(2);
    let first_set = CredentialSet::new().with(&first);

    let running = auth.authenticate(&session, "nina", &first_set);
    let rejected = async {
        let result = auth
            .authenticate(&session, "nina", &CredentialSet::new().with(&second))
            .await;
        (result, session.registrations())
    };
    let (report, (result, during)) = tokio::join!(running, rejected);

    assert!(matches!(result, Err(AuthError::Busy)));
    assert_eq!(during, vec![Registration::Register(msg::USERAUTH_PK_OK)]);
    assert_eq!(second.sign_calls(), 0);
    assert!(report.unwrap().is_authenticated());
    assert_eq!(session.registrations(), bracketed());
    assert_eq!(session.requests().len(), 1);
}

#[tokio::test]
async fn none_method_is_busy_during_publickey_attempt() {
    let auth = PublicKeyAuthenticator::default();
    let session = ScriptedSession::new(auth.delivery())
        .script([Response::success()])
        .reply_delay(Duration::from_millis(50));
    let key = TestCredential::ed25519(1);
    let credentials = CredentialSet::new().with(&key);

    let running = auth.authenticate(&session, "omar", &credentials);
    let query = auth.attempt(&session, "omar", &AuthMethod::None);
    let (report, queried) = tokio::join!(running, query);

    assert!(matches!(queried, Err(AuthError::Busy)));
    assert!(report.unwrap().is_authenticated());
    assert_eq!(session.requests().len(), 1);
}

// =============================================================================
// Disposal
// =============================================================================

#[tokio::test]
async fn attempts_after_close_fail() {
    let auth = PublicKeyAuthenticator::default();
    let session = ScriptedSession::new(auth.delivery()).script([Response::success()]);
    let key = TestCredential::ed25519(1);

    assert!(auth.close());
    assert!(!auth.close());

    let err = auth
        .authenticate(&session, "tess", &CredentialSet::new().with(&key))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Closed));
    assert!(session.requests().is_empty());
}

#[test]
fn deliveries_after_drop_are_ignored() {
    let auth = PublicKeyAuthenticator::default();
    let delivery = auth.delivery();
    drop(auth);

    assert!(delivery.is_closed());
    assert_eq!(delivery.deliver(ServerMessage::Success), Delivery::Ignored);
    assert_eq!(delivery.deliver_packet(&[52]), Delivery::Ignored);
}

// =============================================================================
// The none method
// =============================================================================

#[tokio::test]
async fn none_method_reports_allowed_methods() {
    let auth = PublicKeyAuthenticator::default();
    let session = ScriptedSession::new(auth.delivery())
        .script([Response::failure(["publickey", "password"])]);

    let report = auth
        .attempt(&session, "uma", &AuthMethod::None)
        .await
        .unwrap();

    assert_eq!(
        report.failure().map(|d| d.methods.clone()),
        Some(vec!["publickey".to_string(), "password".to_string()])
    );
    assert!(matches!(
        session.requests().as_slice(),
        [UserAuthRequest::None { username, .. }] if username == "uma"
    ));
    assert!(session.registrations().is_empty());
}

#[tokio::test]
async fn attempt_dispatches_publickey() {
    let auth = PublicKeyAuthenticator::default();
    let session = ScriptedSession::new(auth.delivery()).accepting([vec![1; 32]]);
    let key = TestCredential::ed25519(1);
    let method = AuthMethod::PublicKey(CredentialSet::new().with(&key));

    let report = auth.attempt(&session, "vic", &method).await.unwrap();

    assert!(report.is_authenticated());
    assert_eq!(method.name(), "publickey");
}
