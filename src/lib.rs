//! # chat-client-core - Chat client coordination layer
//!
//! This crate maintains a durable, authenticated, real-time session with a
//! chat server, normalizing a flaky push transport into a clean event
//! stream. It owns the parts that are genuinely hard to get right on a
//! reconnecting transport:
//!
//! - **Session coordination**: connection and authentication lifecycle,
//!   including manual recovery from server-initiated disconnects
//! - **Deduplication**: a bounded ledger of seen record ids suppresses
//!   duplicate deliveries
//! - **Gap recovery**: records missed during an outage are replayed from
//!   history before the session reports `ready`
//! - **Send serialization**: all outbound operations run through one FIFO
//!   queue, so sends never interleave on the wire
//!
//! Per-resource REST operations (polls, contacts, server stats) live in
//! higher layers; they reach this crate only as the injected
//! [`HistoryFetcher`](history::HistoryFetcher) and as tasks handed to
//! [`enqueue_send`](coordinator::SessionCoordinator::enqueue_send).
//!
//! ## Architecture
//!
//! ```text
//! application listeners
//!          ^  normalized ClientEvent stream
//!          |
//! +--------+-----------+   gap recovery   +-------------------+
//! | SessionCoordinator  | ---------------> | HistoryFetcher    |
//! |  (dedup ledger,     |                  +-------------------+
//! |   state machine,    |   raw events     +-------------------+
//! |   send serializer)  | <--------------- | RealtimeTransport |
//! +---------------------+                  +-------------------+
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chat_client_core::coordinator::{CoordinatorConfig, SessionRegistry};
//!
//! # async fn example(
//! #     transport: Arc<dyn chat_client_core::transport::RealtimeTransport>,
//! #     history: Arc<dyn chat_client_core::history::HistoryFetcher>,
//! # ) {
//! let registry = SessionRegistry::new();
//! let session = registry
//!     .obtain(|| {
//!         (
//!             CoordinatorConfig::new().with_credential("app-token".to_string()),
//!             transport,
//!             history,
//!         )
//!     })
//!     .await;
//!
//! let mut events = session.subscribe();
//! session.connect().await;
//!
//! while let Ok(event) = events.recv().await {
//!     println!("event: {event:?}");
//! }
//! # }
//! ```

pub mod coordinator;
pub mod error;
pub mod events;
pub mod history;
pub mod transport;

pub use coordinator::{
    ConnectionState, CoordinatorConfig, DedupLedger, SendSerializer, SessionCoordinator,
    SessionRegistry,
};
pub use error::{ClientError, ClientResult};
pub use events::{ClientEvent, ClientEventHandler, DomainEventKind};
pub use history::{HistoryFetcher, HistoryRecord};
pub use transport::{
    RealtimeTransport, ReconnectNotice, TransportEvent, CLIENT_DISCONNECT_REASON,
    SERVER_DISCONNECT_REASON,
};
