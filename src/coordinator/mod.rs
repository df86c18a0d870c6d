//! Session coordinator
//!
//! The coordinator is the sole owner of connection and authentication state.
//! It attaches to a [`RealtimeTransport`], translates raw transport events
//! into the normalized [`ClientEvent`] stream (deduplicating new-message
//! records), runs gap recovery when a connection cycle reaches `Ready`, and
//! serializes all outbound sends through one FIFO queue.
//!
//! All coordinator state (the dedup ledger, the high-water mark, the
//! ready-emitted flag) is mutated only from the coordinator's single event
//! loop task. Handlers run to completion between suspension points, so raw
//! events are processed strictly in delivery order.

pub mod config;
pub mod dedup;
pub mod recovery;
pub mod registry;
pub mod sender;

#[cfg(test)]
mod tests;

pub use config::{CoordinatorConfig, DEFAULT_MAX_PROCESSED_IDS, DEFAULT_RECOVERY_PAGE_SIZE};
pub use dedup::DedupLedger;
pub use registry::SessionRegistry;
pub use sender::SendSerializer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};
use crate::events::{record_meta, ClientEvent, ClientEventHandler, DomainEventKind};
use crate::history::HistoryFetcher;
use crate::transport::{
    RealtimeTransport, ReconnectNotice, TransportEvent, CLIENT_DISCONNECT_REASON,
    SERVER_DISCONNECT_REASON,
};

/// Capacity of the broadcast channel behind [`SessionCoordinator::subscribe`]
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Connection state of the session, as seen by the coordinator
///
/// `Disconnected` is reachable from every other state on a transport-level
/// disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection; the initial state
    Disconnected,
    /// A connect attempt is in flight
    Connecting,
    /// Transport connected, not yet authenticated
    Connected,
    /// Handshake credential sent, awaiting the server's verdict
    Authenticating,
    /// Authenticated and recovered; the session is usable
    Ready,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Authenticating => write!(f, "authenticating"),
            ConnectionState::Ready => write!(f, "ready"),
        }
    }
}

/// Mutable session state, owned by the coordinator's event loop
#[derive(Debug)]
pub(crate) struct SessionState {
    pub(crate) connection: ConnectionState,
    /// Guards the `Ready` entry actions: recovery runs and `Ready` fires at
    /// most once per connection-authentication cycle
    pub(crate) ready_emitted: bool,
    pub(crate) ledger: DedupLedger,
}

/// Coordinator owning the real-time session with the chat server
///
/// One coordinator per process is the intended shape; obtain it through a
/// [`SessionRegistry`] so every consumer shares the same instance. The
/// coordinator normalizes the transport's flaky delivery into a clean event
/// stream: duplicates suppressed, missed records replayed before `ready`,
/// and outbound sends strictly serialized.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use tokio::sync::mpsc;
/// use chat_client_core::coordinator::{CoordinatorConfig, SessionCoordinator};
/// use chat_client_core::history::{HistoryFetcher, HistoryRecord};
/// use chat_client_core::transport::{RealtimeTransport, TransportEvent};
/// use chat_client_core::{ClientError, ClientResult};
///
/// struct NullTransport;
///
/// #[async_trait]
/// impl RealtimeTransport for NullTransport {
///     fn attach(&self, _events: mpsc::UnboundedSender<TransportEvent>) {}
///     async fn connect(&self) -> ClientResult<()> { Ok(()) }
///     async fn disconnect(&self) {}
/// }
///
/// struct NullHistory;
///
/// #[async_trait]
/// impl HistoryFetcher for NullHistory {
///     async fn fetch_after(&self, _after: i64, _limit: u32) -> ClientResult<Vec<HistoryRecord>> {
///         Ok(Vec::new())
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() {
/// let coordinator = Arc::new(SessionCoordinator::new(
///     CoordinatorConfig::new().with_credential("token".to_string()),
///     Arc::new(NullTransport),
///     Arc::new(NullHistory),
/// ));
///
/// let mut events = coordinator.subscribe();
/// coordinator.connect().await;
/// coordinator.connect().await; // idempotent
///
/// assert_eq!(coordinator.processed_message_count().await, 0);
/// coordinator.close().await;
/// # }
/// ```
pub struct SessionCoordinator {
    config: CoordinatorConfig,
    /// Identifies this client instance in logs
    client_id: Uuid,
    transport: Arc<dyn RealtimeTransport>,
    history: Arc<dyn HistoryFetcher>,
    pub(crate) state: Arc<RwLock<SessionState>>,
    event_handler: Arc<RwLock<Option<Arc<dyn ClientEventHandler>>>>,
    event_tx: broadcast::Sender<ClientEvent>,
    sender: SendSerializer,
    /// One-time flag: transport listeners are attached at most once per
    /// process lifetime
    listeners_attached: AtomicBool,
    raw_tx: mpsc::UnboundedSender<TransportEvent>,
    /// Taken by the event loop on first `connect()`
    raw_rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("client_id", &self.client_id)
            .field("config", &self.config)
            .finish()
    }
}

impl SessionCoordinator {
    /// Create a coordinator over the given transport and history fetcher
    ///
    /// Must be called within a Tokio runtime: the send serializer's worker
    /// task is spawned here. The transport is not touched until the first
    /// [`connect`](Self::connect).
    pub fn new(
        config: CoordinatorConfig,
        transport: Arc<dyn RealtimeTransport>,
        history: Arc<dyn HistoryFetcher>,
    ) -> Self {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let max_ids = config.max_processed_ids;
        Self {
            config,
            client_id: Uuid::new_v4(),
            transport,
            history,
            state: Arc::new(RwLock::new(SessionState {
                connection: ConnectionState::Disconnected,
                ready_emitted: false,
                ledger: DedupLedger::new(max_ids),
            })),
            event_handler: Arc::new(RwLock::new(None)),
            event_tx,
            sender: SendSerializer::new(),
            listeners_attached: AtomicBool::new(false),
            raw_tx,
            raw_rx: Mutex::new(Some(raw_rx)),
        }
    }

    /// Subscribe to the normalized event stream
    ///
    /// Each receiver sees every event emitted after the call, in emission
    /// order. Slow receivers that fall more than the channel capacity behind
    /// observe a lag error, not a stall of the coordinator.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.event_tx.subscribe()
    }

    /// Register the application's event handler
    ///
    /// The handler is invoked from the coordinator's event loop after the
    /// broadcast delivery for the same event.
    pub async fn set_event_handler(&self, handler: Arc<dyn ClientEventHandler>) {
        *self.event_handler.write().await = Some(handler);
    }

    /// Initiate (or re-initiate) the real-time connection
    ///
    /// Idempotent: calling while a connection exists logs and returns with
    /// no side effects. Transport listeners are attached exactly once per
    /// process lifetime, on the first call. Failures never surface here
    /// synchronously; they arrive as the normalized `Error` event.
    pub async fn connect(self: &Arc<Self>) {
        if self
            .listeners_attached
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.transport.attach(self.raw_tx.clone());
            if let Some(raw_rx) = self.raw_rx.lock().await.take() {
                let coordinator = Arc::clone(self);
                tokio::spawn(coordinator.event_loop(raw_rx));
            }
        }

        {
            // Check and transition under one write lock: two concurrent
            // connect() calls must not both observe Disconnected
            let mut state = self.state.write().await;
            if state.connection != ConnectionState::Disconnected {
                info!(
                    "connect() called while {}; nothing to do",
                    state.connection
                );
                return;
            }
            state.connection = ConnectionState::Connecting;
        }

        info!(
            client_id = %self.client_id,
            user_agent = %self.config.user_agent,
            authenticated = self.config.credential.is_some(),
            "connecting to chat server"
        );
        if let Err(e) = self.transport.connect().await {
            error!("transport connect failed: {}", e);
            self.state.write().await.connection = ConnectionState::Disconnected;
            self.emit(ClientEvent::Error {
                message: format!("connect failed: {e}"),
            })
            .await;
        }
    }

    /// Disconnect the transport; idempotent, safe when not connected
    ///
    /// In-flight recovery or sends run to completion; only the connection is
    /// torn down. Session state is reset here rather than waiting on a raw
    /// disconnect event, since adapters are not required to emit one for a
    /// locally requested teardown. A later `connect()` starts a fresh cycle.
    pub async fn close(&self) {
        info!("closing session");
        self.transport.disconnect().await;
        let had_connection = {
            let mut state = self.state.write().await;
            let had = state.connection != ConnectionState::Disconnected;
            state.connection = ConnectionState::Disconnected;
            state.ready_emitted = false;
            had
        };
        if had_connection {
            self.emit(ClientEvent::Disconnected {
                reason: CLIENT_DISCONNECT_REASON.to_string(),
            })
            .await;
        }
    }

    /// Run `task` through the process-wide send queue
    ///
    /// Every outbound operation that must not race another send goes
    /// through here, whatever resource module issues it. See
    /// [`SendSerializer::enqueue`] for the ordering contract.
    pub async fn enqueue_send<T, F, Fut>(&self, task: F) -> ClientResult<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ClientResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.sender.enqueue(task).await
    }

    /// Trim the dedup ledger if it exceeds `max_size` (default 1000)
    ///
    /// Retains the most recent `max_size / 2` ids. Pure housekeeping; emits
    /// nothing.
    pub async fn clear_processed_messages(&self, max_size: Option<usize>) {
        let max_size = max_size.unwrap_or(DEFAULT_MAX_PROCESSED_IDS);
        self.state.write().await.ledger.trim(max_size);
    }

    /// Current dedup ledger size, for observability and testing
    pub async fn processed_message_count(&self) -> usize {
        self.state.read().await.ledger.len()
    }

    /// High-water mark of processed record creation times (Unix ms, 0 unset)
    pub async fn last_seen_timestamp(&self) -> i64 {
        self.state.read().await.ledger.high_water_mark()
    }

    /// Current connection state
    pub async fn connection_state(&self) -> ConnectionState {
        self.state.read().await.connection
    }

    /// Whether a connection exists in any pre- or post-auth state
    pub async fn is_connected(&self) -> bool {
        self.state.read().await.connection != ConnectionState::Disconnected
    }

    /// Single consumer of raw transport events
    ///
    /// Runs until the transport side of the channel is dropped. Events are
    /// handled one at a time, in delivery order.
    async fn event_loop(self: Arc<Self>, mut raw_rx: mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = raw_rx.recv().await {
            self.handle_raw(event).await;
        }
        debug!("transport event loop stopped");
    }

    async fn handle_raw(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                info!("transport connected");
                if self.config.credential.is_some() {
                    // Credential travels in the handshake; the server's
                    // verdict arrives as AuthSucceeded/AuthFailed
                    self.state.write().await.connection = ConnectionState::Authenticating;
                } else {
                    // Legacy mode: no credential configured, the session
                    // counts as authenticated on connect
                    self.state.write().await.connection = ConnectionState::Connected;
                    self.on_authenticated().await;
                }
            }
            TransportEvent::AuthSucceeded => {
                self.on_authenticated().await;
            }
            TransportEvent::AuthFailed { message, reason } => {
                let error = ClientError::authentication(message, reason);
                warn!("{}", error);
                // The connection stays up; the transport and server decide
                // whether to retry or drop
                self.emit_error(&error).await;
            }
            TransportEvent::Disconnected { reason } => {
                self.on_disconnected(reason).await;
            }
            TransportEvent::Domain { name, payload } => {
                self.handle_domain_event(name, payload).await;
            }
            TransportEvent::Reconnect(notice) => match notice {
                ReconnectNotice::Attempt(n) => info!("reconnection attempt {}", n),
                ReconnectNotice::Succeeded(n) => {
                    info!("reconnected after {} attempt(s)", n)
                }
                ReconnectNotice::Failed(e) => warn!("reconnection attempt failed: {}", e),
                ReconnectNotice::Exhausted => {
                    error!("reconnection attempts exhausted; call connect() to try again")
                }
            },
        }
    }

    /// `Ready` entry actions, at most once per connection-auth cycle
    ///
    /// Gap recovery runs first so any replayed records are emitted before
    /// `Ready`; recovery failure is logged and never blocks readiness.
    async fn on_authenticated(&self) {
        if self.state.read().await.ready_emitted {
            debug!("ready already emitted this cycle; ignoring repeated authentication success");
            return;
        }
        self.run_gap_recovery().await;
        {
            let mut state = self.state.write().await;
            state.connection = ConnectionState::Ready;
            state.ready_emitted = true;
        }
        info!("session ready");
        self.emit(ClientEvent::Ready).await;
    }

    async fn on_disconnected(&self, reason: String) {
        {
            let mut state = self.state.write().await;
            if state.connection == ConnectionState::Disconnected {
                // close() already tore this cycle down; one normalized
                // disconnect per connection cycle is enough
                debug!("transport disconnect for a closed session: {}", reason);
                return;
            }
            state.connection = ConnectionState::Disconnected;
            // Next successful authentication re-runs recovery and fires a
            // fresh ready
            state.ready_emitted = false;
        }
        warn!("transport disconnected: {}", reason);
        self.emit(ClientEvent::Disconnected {
            reason: reason.clone(),
        })
        .await;

        if reason == SERVER_DISCONNECT_REASON {
            // The transport's auto-reconnect does not cover disconnects the
            // server initiated, so issue one manual attempt
            info!("server closed the connection; reconnecting");
            self.state.write().await.connection = ConnectionState::Connecting;
            if let Err(e) = self.transport.connect().await {
                error!("manual reconnect failed: {}", e);
                self.state.write().await.connection = ConnectionState::Disconnected;
                self.emit(ClientEvent::Error {
                    message: format!("reconnect failed: {e}"),
                })
                .await;
            }
        }
    }

    /// Normalize one domain event from the transport
    ///
    /// `message.created` goes through dedup bookkeeping; every other catalog
    /// class passes straight through. Names outside the catalog are dropped
    /// so listeners never observe a raw transport shape.
    async fn handle_domain_event(&self, name: String, payload: Option<serde_json::Value>) {
        let Some(kind) = DomainEventKind::from_raw(&name) else {
            debug!("ignoring unknown transport event '{}'", name);
            return;
        };

        if kind == DomainEventKind::MessageCreated {
            let Some(payload) = payload else {
                warn!("message.created arrived without a payload; dropping");
                return;
            };
            match record_meta(&payload) {
                Some((id, created_at)) => {
                    let fresh = self.state.write().await.ledger.observe(&id, created_at);
                    if !fresh {
                        debug!("suppressing duplicate message {}", id);
                        return;
                    }
                    self.emit(ClientEvent::MessageReceived { payload }).await;
                }
                None => {
                    // Without an id the record cannot participate in dedup;
                    // favor delivery over suppression
                    warn!("message.created payload missing id/createdAt; forwarding undeduplicated");
                    self.emit(ClientEvent::MessageReceived { payload }).await;
                }
            }
        } else if let Some(event) = ClientEvent::passthrough(kind, payload) {
            self.emit(event).await;
        }
    }

    /// Surface a failure to listeners as the normalized `Error` event
    pub(crate) async fn emit_error(&self, error: &ClientError) {
        let message = match error {
            ClientError::Authentication {
                reason: Some(reason),
                ..
            } => format!("{error} ({reason})"),
            _ => error.to_string(),
        };
        self.emit(ClientEvent::Error { message }).await;
    }

    /// Deliver a normalized event to the broadcast channel and the handler
    pub(crate) async fn emit(&self, event: ClientEvent) {
        // No receivers is fine; broadcast send only fails then
        let _ = self.event_tx.send(event.clone());

        let handler = self.event_handler.read().await.clone();
        if let Some(handler) = handler {
            match event {
                ClientEvent::Ready => handler.on_ready().await,
                ClientEvent::Disconnected { reason } => handler.on_disconnected(reason).await,
                ClientEvent::Error { message } => handler.on_error(message).await,
                ClientEvent::MessageReceived { payload } => {
                    handler.on_message_received(payload).await
                }
                other => handler.on_domain_event(other).await,
            }
        }
    }
}
