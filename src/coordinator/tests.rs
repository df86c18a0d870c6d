//! Coordinator state-machine tests
//!
//! These drive the coordinator through a mock transport, injecting raw
//! events and observing the normalized stream through a broadcast
//! subscription.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tracing_test::traced_test;

use crate::coordinator::{ConnectionState, CoordinatorConfig, SessionCoordinator};
use crate::error::ClientResult;
use crate::events::ClientEvent;
use crate::history::{HistoryFetcher, HistoryRecord};
use crate::transport::{
    RealtimeTransport, TransportEvent, CLIENT_DISCONNECT_REASON, SERVER_DISCONNECT_REASON,
};

struct MockTransport {
    events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    connect_calls: AtomicUsize,
    attach_calls: AtomicUsize,
}

impl MockTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(None),
            connect_calls: AtomicUsize::new(0),
            attach_calls: AtomicUsize::new(0),
        })
    }

    fn inject(&self, event: TransportEvent) {
        let guard = self.events.lock().unwrap();
        guard
            .as_ref()
            .expect("transport not attached")
            .send(event)
            .expect("event loop gone");
    }

    fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RealtimeTransport for MockTransport {
    fn attach(&self, events: mpsc::UnboundedSender<TransportEvent>) {
        self.attach_calls.fetch_add(1, Ordering::SeqCst);
        *self.events.lock().unwrap() = Some(events);
    }

    async fn connect(&self) -> ClientResult<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {}
}

struct MockHistory {
    records: Mutex<Vec<HistoryRecord>>,
    fetch_calls: AtomicUsize,
}

impl MockHistory {
    fn empty() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
            fetch_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl HistoryFetcher for MockHistory {
    async fn fetch_after(&self, after: i64, limit: u32) -> ClientResult<Vec<HistoryRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.created_at > after)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

fn setup(
    config: CoordinatorConfig,
) -> (
    Arc<SessionCoordinator>,
    Arc<MockTransport>,
    Arc<MockHistory>,
) {
    let transport = MockTransport::new();
    let history = MockHistory::empty();
    let coordinator = Arc::new(SessionCoordinator::new(
        config,
        transport.clone(),
        history.clone(),
    ));
    (coordinator, transport, history)
}

async fn next_event(rx: &mut broadcast::Receiver<ClientEvent>) -> ClientEvent {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn assert_no_event(rx: &mut broadcast::Receiver<ClientEvent>) {
    let got = timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(got.is_err(), "unexpected event: {:?}", got);
}

fn message(id: &str, created_at: i64) -> TransportEvent {
    TransportEvent::Domain {
        name: "message.created".to_string(),
        payload: Some(json!({ "id": id, "createdAt": created_at, "text": "hi" })),
    }
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let (coordinator, transport, _) = setup(CoordinatorConfig::new());

    coordinator.connect().await;
    coordinator.connect().await;
    coordinator.connect().await;

    assert_eq!(transport.connect_calls(), 1);
    assert_eq!(transport.attach_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        coordinator.connection_state().await,
        ConnectionState::Connecting
    );
}

#[tokio::test]
async fn test_legacy_mode_ready_on_connect() {
    // No credential configured: connecting counts as authenticated
    let (coordinator, transport, _) = setup(CoordinatorConfig::new());
    let mut events = coordinator.subscribe();

    coordinator.connect().await;
    transport.inject(TransportEvent::Connected);

    assert!(matches!(next_event(&mut events).await, ClientEvent::Ready));
    assert_eq!(coordinator.connection_state().await, ConnectionState::Ready);
}

#[tokio::test]
async fn test_authenticated_mode_waits_for_auth_success() {
    let (coordinator, transport, _) =
        setup(CoordinatorConfig::new().with_credential("token".to_string()));
    let mut events = coordinator.subscribe();

    coordinator.connect().await;
    transport.inject(TransportEvent::Connected);
    assert_no_event(&mut events).await;
    assert_eq!(
        coordinator.connection_state().await,
        ConnectionState::Authenticating
    );

    transport.inject(TransportEvent::AuthSucceeded);
    assert!(matches!(next_event(&mut events).await, ClientEvent::Ready));
}

#[tokio::test]
async fn test_ready_fires_once_per_cycle() {
    let (coordinator, transport, _) =
        setup(CoordinatorConfig::new().with_credential("token".to_string()));
    let mut events = coordinator.subscribe();

    coordinator.connect().await;
    transport.inject(TransportEvent::Connected);
    // Erroneous double delivery of the auth success notification
    transport.inject(TransportEvent::AuthSucceeded);
    transport.inject(TransportEvent::AuthSucceeded);

    assert!(matches!(next_event(&mut events).await, ClientEvent::Ready));
    assert_no_event(&mut events).await;
}

#[tokio::test]
async fn test_disconnect_resets_ready_cycle() {
    let (coordinator, transport, _) =
        setup(CoordinatorConfig::new().with_credential("token".to_string()));
    let mut events = coordinator.subscribe();

    coordinator.connect().await;
    transport.inject(TransportEvent::Connected);
    transport.inject(TransportEvent::AuthSucceeded);
    assert!(matches!(next_event(&mut events).await, ClientEvent::Ready));

    transport.inject(TransportEvent::Disconnected {
        reason: "transport error".to_string(),
    });
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::Disconnected { .. }
    ));

    // Transport auto-reconnects and re-authenticates: a fresh ready fires
    transport.inject(TransportEvent::Connected);
    transport.inject(TransportEvent::AuthSucceeded);
    assert!(matches!(next_event(&mut events).await, ClientEvent::Ready));
}

#[tokio::test]
async fn test_auth_failure_emits_error_not_ready() {
    let (coordinator, transport, _) =
        setup(CoordinatorConfig::new().with_credential("bad".to_string()));
    let mut events = coordinator.subscribe();

    coordinator.connect().await;
    transport.inject(TransportEvent::Connected);
    transport.inject(TransportEvent::AuthFailed {
        message: "invalid token".to_string(),
        reason: Some("401".to_string()),
    });

    match next_event(&mut events).await {
        ClientEvent::Error { message } => {
            assert!(message.contains("invalid token"));
            assert!(message.contains("401"));
        }
        other => panic!("expected error event, got {:?}", other),
    }
    assert_ne!(coordinator.connection_state().await, ConnectionState::Ready);
}

#[tokio::test]
async fn test_server_disconnect_triggers_one_manual_reconnect() {
    let (coordinator, transport, _) = setup(CoordinatorConfig::new());
    let mut events = coordinator.subscribe();

    coordinator.connect().await;
    transport.inject(TransportEvent::Connected);
    assert!(matches!(next_event(&mut events).await, ClientEvent::Ready));
    assert_eq!(transport.connect_calls(), 1);

    transport.inject(TransportEvent::Disconnected {
        reason: SERVER_DISCONNECT_REASON.to_string(),
    });
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::Disconnected { .. }
    ));

    // The manual reconnect happens inside the event loop; the disconnect
    // event above is emitted before it, so one more poll settles it
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.connect_calls(), 2);
}

#[tokio::test]
async fn test_network_disconnect_triggers_no_manual_reconnect() {
    let (coordinator, transport, _) = setup(CoordinatorConfig::new());
    let mut events = coordinator.subscribe();

    coordinator.connect().await;
    transport.inject(TransportEvent::Connected);
    assert!(matches!(next_event(&mut events).await, ClientEvent::Ready));

    transport.inject(TransportEvent::Disconnected {
        reason: "ping timeout".to_string(),
    });
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::Disconnected { .. }
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    // Auto-reconnect is the transport's job here, not ours
    assert_eq!(transport.connect_calls(), 1);
}

#[tokio::test]
async fn test_unknown_event_names_are_dropped() {
    let (coordinator, transport, _) = setup(CoordinatorConfig::new());
    let mut events = coordinator.subscribe();

    coordinator.connect().await;
    transport.inject(TransportEvent::Connected);
    assert!(matches!(next_event(&mut events).await, ClientEvent::Ready));

    transport.inject(TransportEvent::Domain {
        name: "presence.changed".to_string(),
        payload: Some(json!({ "status": "away" })),
    });
    assert_no_event(&mut events).await;
}

#[tokio::test]
async fn test_reconnect_notices_are_observational() {
    use crate::transport::ReconnectNotice;

    let (coordinator, transport, _) = setup(CoordinatorConfig::new());
    let mut events = coordinator.subscribe();

    coordinator.connect().await;
    transport.inject(TransportEvent::Reconnect(ReconnectNotice::Attempt(1)));
    transport.inject(TransportEvent::Reconnect(ReconnectNotice::Failed(
        "timeout".to_string(),
    )));
    transport.inject(TransportEvent::Reconnect(ReconnectNotice::Exhausted));

    // Logged only; nothing reaches listeners and no extra connects happen
    assert_no_event(&mut events).await;
    assert_eq!(transport.connect_calls(), 1);
}

#[tokio::test]
async fn test_processed_message_housekeeping() {
    let (coordinator, transport, _) = setup(CoordinatorConfig::new());
    let mut events = coordinator.subscribe();

    coordinator.connect().await;
    transport.inject(TransportEvent::Connected);
    assert!(matches!(next_event(&mut events).await, ClientEvent::Ready));

    for i in 0..30 {
        transport.inject(message(&format!("m-{i}"), i));
        assert!(matches!(
            next_event(&mut events).await,
            ClientEvent::MessageReceived { .. }
        ));
    }
    assert_eq!(coordinator.processed_message_count().await, 30);
    assert_eq!(coordinator.last_seen_timestamp().await, 29);

    // Within bounds: no-op
    coordinator.clear_processed_messages(Some(30)).await;
    assert_eq!(coordinator.processed_message_count().await, 30);

    // Above bounds: trimmed to the newest half
    coordinator.clear_processed_messages(Some(20)).await;
    assert_eq!(coordinator.processed_message_count().await, 10);
    assert_eq!(coordinator.last_seen_timestamp().await, 29);
}

#[tokio::test]
async fn test_connect_after_close_reconnects() {
    let (coordinator, transport, _) = setup(CoordinatorConfig::new());
    let mut events = coordinator.subscribe();

    coordinator.connect().await;
    transport.inject(TransportEvent::Connected);
    assert!(matches!(next_event(&mut events).await, ClientEvent::Ready));

    // The mock transport emits nothing on local teardown, so the session
    // state must be reset by close() itself
    coordinator.close().await;
    match next_event(&mut events).await {
        ClientEvent::Disconnected { reason } => assert_eq!(reason, CLIENT_DISCONNECT_REASON),
        other => panic!("expected Disconnected, got {:?}", other),
    }
    assert_eq!(
        coordinator.connection_state().await,
        ConnectionState::Disconnected
    );

    coordinator.connect().await;
    assert_eq!(transport.connect_calls(), 2);
    transport.inject(TransportEvent::Connected);
    assert!(matches!(next_event(&mut events).await, ClientEvent::Ready));
}

#[tokio::test]
async fn test_concurrent_connect_initiates_once() {
    let (coordinator, transport, _) = setup(CoordinatorConfig::new());

    let first = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.connect().await })
    };
    let second = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.connect().await })
    };
    first.await.unwrap();
    second.await.unwrap();

    // Whichever call lost the race observed Connecting and backed off
    assert_eq!(transport.connect_calls(), 1);
    assert_eq!(
        coordinator.connection_state().await,
        ConnectionState::Connecting
    );
}

#[traced_test]
#[tokio::test]
async fn test_duplicate_suppression_is_logged() {
    let (coordinator, transport, _) = setup(CoordinatorConfig::new());
    let mut events = coordinator.subscribe();

    coordinator.connect().await;
    transport.inject(TransportEvent::Connected);
    assert!(matches!(next_event(&mut events).await, ClientEvent::Ready));

    transport.inject(message("m-1", 1));
    transport.inject(message("m-1", 1));
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::MessageReceived { .. }
    ));
    assert_no_event(&mut events).await;
    assert!(logs_contain("suppressing duplicate message m-1"));
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let (coordinator, _transport, _) = setup(CoordinatorConfig::new());
    coordinator.close().await;
    coordinator.close().await;
    assert_eq!(
        coordinator.connection_state().await,
        ConnectionState::Disconnected
    );
}
