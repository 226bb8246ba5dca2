//! Connection lifecycle: idempotent connect, bounded reconnect,
//! room rejoin, and non-throwing failure semantics.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{wait_until, MockConnector};
use ridelink_client::{ClientConfig, ConnectionState, RealtimeClient};
use ridelink_shared::ClientEvent;

fn client_with(connector: &Arc<MockConnector>) -> Arc<RealtimeClient> {
    Arc::new(RealtimeClient::with_connector(
        ClientConfig::default(),
        connector.clone(),
    ))
}

#[tokio::test(start_paused = true)]
async fn connect_is_idempotent_and_joins_room_once() {
    let connector = Arc::new(MockConnector::succeed());
    let client = client_with(&connector);

    client.connect("u1");
    client.connect("u1");
    wait_until(|| client.is_connected()).await;
    client.connect("u1");
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(connector.attempt_count(), 1);
    assert_eq!(connector.session_count(), 1);

    let frames = connector.sessions.lock().unwrap()[0].drain_outbound();
    assert_eq!(frames.len(), 1);
    let frame: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
    assert_eq!(frame["event"], "join-room");
    assert_eq!(frame["data"], "user_u1");
}

#[tokio::test(start_paused = true)]
async fn reconnect_attempts_are_bounded_with_linear_delays() {
    let connector = Arc::new(MockConnector::always_fail());
    let client = client_with(&connector);
    let mut state = client.watch_state();

    client.connect("u1");
    loop {
        state.changed().await.unwrap();
        if matches!(*state.borrow(), ConnectionState::Failed { .. }) {
            break;
        }
    }

    // Initial attempt plus exactly five reconnects.
    let attempts = connector.attempts.lock().unwrap().clone();
    assert_eq!(attempts.len(), 6);

    let deltas: Vec<Duration> = attempts.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(
        deltas,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(3),
            Duration::from_secs(4),
            Duration::from_secs(5),
        ]
    );

    // Parked at Failed: no further attempts without an explicit connect.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.attempt_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn explicit_connect_resumes_after_failure() {
    let connector = Arc::new(MockConnector::always_fail());
    let client = client_with(&connector);
    let mut state = client.watch_state();

    client.connect("u1");
    loop {
        state.changed().await.unwrap();
        if matches!(*state.borrow(), ConnectionState::Failed { .. }) {
            break;
        }
    }
    let after_failure = connector.attempt_count();

    client.connect("u1");
    wait_until(|| connector.attempt_count() > after_failure).await;
}

#[tokio::test(start_paused = true)]
async fn user_room_is_rejoined_after_reconnect() {
    let connector = Arc::new(MockConnector::succeed());
    let client = client_with(&connector);

    client.connect("u1");
    wait_until(|| client.is_connected()).await;

    connector.sessions.lock().unwrap()[0].sever();
    wait_until(|| connector.session_count() == 2 && client.is_connected()).await;

    let frames = connector.sessions.lock().unwrap()[1].drain_outbound();
    let frame: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
    assert_eq!(frame["event"], "join-room");
    assert_eq!(frame["data"], "user_u1");
}

#[tokio::test(start_paused = true)]
async fn emit_while_disconnected_drops_without_error() {
    let connector = Arc::new(MockConnector::always_fail());
    let client = client_with(&connector);

    // No session at all: emit and disconnect must both be no-ops.
    client.emit(&ClientEvent::JoinRoom("user_u1".to_string()));
    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn emitted_events_reach_the_wire_when_connected() {
    let connector = Arc::new(MockConnector::succeed());
    let client = client_with(&connector);

    client.connect("u1");
    wait_until(|| client.is_connected()).await;

    client.emit(&ClientEvent::TypingStart {
        receiver_id: "u2".to_string(),
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let frames = connector.sessions.lock().unwrap()[0].drain_outbound();
    assert_eq!(frames.len(), 2); // join-room, then typing-start
    let frame: serde_json::Value = serde_json::from_str(&frames[1]).unwrap();
    assert_eq!(frame["event"], "typing-start");
    assert_eq!(frame["data"]["receiverId"], "u2");
}

#[tokio::test(start_paused = true)]
async fn disconnect_clears_session_and_stops_reconnecting() {
    let connector = Arc::new(MockConnector::succeed());
    let client = client_with(&connector);

    client.connect("u1");
    wait_until(|| client.is_connected()).await;

    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.user_id(), None);

    // The dead session must not be replaced.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(connector.session_count(), 1);
}
