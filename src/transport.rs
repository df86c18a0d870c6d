//! Real-time transport seam
//!
//! The coordinator does not implement the wire protocol itself. It consumes
//! a [`RealtimeTransport`]: a bidirectional connection with automatic
//! reconnection and a one-shot handshake that can carry a credential.
//! Concrete adapters (websocket, long-poll bridge, in-process test doubles)
//! implement this trait and push [`TransportEvent`]s into the sender handed
//! to [`RealtimeTransport::attach`].
//!
//! Reconnection-lifecycle notices from the transport's built-in reconnect
//! machinery are folded onto the same event channel as
//! [`TransportEvent::Reconnect`], so the coordinator observes one ordered
//! stream per connection.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ClientResult;

/// Disconnect reason reported when the remote end intentionally dropped the
/// connection. The transport's built-in auto-reconnect does not cover this
/// case, so the coordinator issues a manual reconnect when it sees it.
pub const SERVER_DISCONNECT_REASON: &str = "io server disconnect";

/// Disconnect reason carried by the normalized `Disconnected` event when the
/// client itself tore the connection down via `close()`.
pub const CLIENT_DISCONNECT_REASON: &str = "io client disconnect";

/// Raw events produced by a transport adapter
///
/// These never reach application listeners directly; the coordinator
/// translates them into the normalized [`ClientEvent`](crate::events::ClientEvent)
/// surface.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The underlying connection is established (pre-authentication)
    Connected,
    /// The connection dropped, with the transport's reason string
    Disconnected { reason: String },
    /// The handshake credential was accepted by the server
    AuthSucceeded,
    /// The handshake credential was rejected
    AuthFailed {
        message: String,
        /// Machine-readable reason, when the server supplies one
        reason: Option<String>,
    },
    /// A domain event from the server's fixed event catalog
    Domain {
        /// Raw event name on the wire (e.g. `message.created`)
        name: String,
        /// JSON payload, if the event carries one
        payload: Option<Value>,
    },
    /// Notice from the transport's reconnection machinery
    Reconnect(ReconnectNotice),
}

/// Reconnection-lifecycle notices
///
/// Purely observational for the coordinator: they are logged, never
/// state-bearing. Exhaustion ends the transport's own retry cycle, but the
/// coordinator stays reconnect-eligible through another `connect()` call.
#[derive(Debug, Clone)]
pub enum ReconnectNotice {
    /// A reconnection attempt is starting (1-based attempt counter)
    Attempt(u32),
    /// Reconnection succeeded after the given number of attempts
    Succeeded(u32),
    /// A reconnection attempt failed
    Failed(String),
    /// The transport gave up reconnecting for this connection cycle
    Exhausted,
}

/// Bidirectional real-time connection consumed by the coordinator
///
/// Contract expected by [`SessionCoordinator`](crate::coordinator::SessionCoordinator):
///
/// - `attach` is called exactly once per process lifetime, before the first
///   `connect`. All raw events for every subsequent connection cycle flow
///   through the sender it receives.
/// - `connect` initiates the handshake, carrying the configured credential
///   if one exists. Connection results arrive asynchronously as events; an
///   `Err` here means the attempt could not even be started.
/// - `disconnect` tears the connection down and is safe to call when not
///   connected. Adapters are not required to emit a raw `Disconnected`
///   event for this locally requested teardown; the coordinator resets its
///   own session state on `close()`.
/// - The adapter handles its own reconnection with backoff, reporting
///   progress via [`TransportEvent::Reconnect`]. Server-initiated
///   disconnects (reason [`SERVER_DISCONNECT_REASON`]) are outside that
///   machinery and are the coordinator's job to recover from.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Register the raw-event sink for this transport
    fn attach(&self, events: mpsc::UnboundedSender<TransportEvent>);

    /// Initiate a connection attempt (handshake carries the credential)
    async fn connect(&self) -> ClientResult<()>;

    /// Tear down the connection; idempotent
    async fn disconnect(&self);
}
