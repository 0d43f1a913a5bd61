//! Integration tests for the session lifecycle

use nodestat_core::{Session, SessionError, SessionState, SshTarget};
use secrecy::SecretString;

use super::fake::{FakeConnector, FakeHost};

fn target(host: &str) -> SshTarget {
    SshTarget::new(host, "alice", SecretString::from("secret".to_string()))
}

#[tokio::test]
async fn channels_open_together_once() {
    let connector = FakeConnector::new().with_host("node1", FakeHost::scenario_a());
    let mut session = Session::new(target("node1"), "/tmp", &connector);

    session.open().await.unwrap();
    session.open().await.unwrap();
    assert!(session.is_connected());

    session.transfer().unwrap().download("/etc/hostname").await.unwrap();
    session.files().unwrap().remove("/tmp/x").await.unwrap();

    assert_eq!(
        connector.events(),
        vec![
            "connect node1",
            "download node1 /etc/hostname",
            "remove node1 /tmp/x"
        ]
    );
}

#[tokio::test]
async fn close_is_idempotent() {
    let connector = FakeConnector::new().with_host("node1", FakeHost::scenario_a());
    let mut session = Session::new(target("node1"), "", &connector);

    session.close().await;
    assert!(connector.events().is_empty());

    session.open().await.unwrap();
    session.close().await;
    session.close().await;

    assert_eq!(session.state(), SessionState::Disconnected);
    let closes = connector
        .events()
        .iter()
        .filter(|e| e.starts_with("close"))
        .count();
    assert_eq!(closes, 3);
    assert!(matches!(
        session.shell(),
        Err(SessionError::NotConnected(host)) if host == "node1"
    ));
}

#[tokio::test]
async fn reopen_after_close() {
    let connector = FakeConnector::new().with_host("node1", FakeHost::scenario_a());
    let mut session = Session::new(target("node1"), "", &connector);

    session.open().await.unwrap();
    session.close().await;
    session.open().await.unwrap();

    assert!(session.is_connected());
    assert_eq!(connector.events_for("node1")[0], "connect node1");
    assert_eq!(
        connector
            .events()
            .iter()
            .filter(|e| e.starts_with("connect"))
            .count(),
        2
    );
}

#[tokio::test]
async fn connection_error_returns_to_disconnected() {
    let refusing = FakeHost {
        refuse_connection: true,
        ..FakeHost::default()
    };
    let connector = FakeConnector::new().with_host("node1", refusing);
    let mut session = Session::new(target("node1"), "", &connector);

    let err = session.open().await.unwrap_err();
    assert!(matches!(err, SessionError::ConnectionFailed { .. }));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn auth_failure_terminates() {
    let rejecting = FakeHost {
        reject_auth: true,
        ..FakeHost::default()
    };
    let connector = FakeConnector::new().with_host("node1", rejecting);
    let mut session = Session::new(target("node1"), "", &connector);

    assert!(session.open().await.unwrap_err().is_authentication_failure());
    assert_eq!(session.state(), SessionState::Terminated);
    assert!(matches!(
        session.open().await,
        Err(SessionError::Terminated(_))
    ));
    // Closing a terminated session is a no-op
    session.close().await;
    assert_eq!(session.state(), SessionState::Terminated);
}
