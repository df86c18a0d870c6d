//! Normalized event surface for the chat client coordination layer
//!
//! Application code never sees raw transport events. The coordinator
//! re-emits everything through [`ClientEvent`]: deduplicated, recovery-aware,
//! and with at most one payload per event. Events are delivered two ways,
//! both usable at once:
//!
//! - a broadcast channel obtained from
//!   [`SessionCoordinator::subscribe`](crate::coordinator::SessionCoordinator::subscribe),
//!   for independent consumers
//! - a registered [`ClientEventHandler`], for callback-style applications
//!
//! Delivery is synchronous and run-to-completion per event from the
//! coordinator's single event loop, so listeners observe events in emission
//! order.

use async_trait::async_trait;
use serde_json::Value;

/// The fixed catalog of domain events the coordinator understands
///
/// [`MessageCreated`](DomainEventKind::MessageCreated) is the only class
/// subject to deduplication and gap recovery; every other class passes
/// through unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainEventKind {
    /// A new message record was created
    MessageCreated,
    /// An existing message was edited or had metadata updated
    MessageUpdated,
    /// Chat/room metadata changed (name, topic, settings)
    ChatChanged,
    /// Group membership changed (join, leave, kick)
    MembershipChanged,
    /// A participant started or stopped typing
    Typing,
    /// An incoming or outgoing call is ringing
    CallRinging,
    /// A call ended
    CallEnded,
    /// The server announced itself / updated its discovery record
    ServerDiscovered,
}

impl DomainEventKind {
    /// Map a raw transport event name onto the catalog
    ///
    /// Returns `None` for names outside the catalog; the coordinator logs
    /// and drops those so listeners never observe raw names.
    pub fn from_raw(name: &str) -> Option<Self> {
        match name {
            "message.created" => Some(Self::MessageCreated),
            "message.updated" => Some(Self::MessageUpdated),
            "chat.changed" => Some(Self::ChatChanged),
            "membership.changed" => Some(Self::MembershipChanged),
            "typing" => Some(Self::Typing),
            "call.ringing" => Some(Self::CallRinging),
            "call.ended" => Some(Self::CallEnded),
            "server.discovered" => Some(Self::ServerDiscovered),
            _ => None,
        }
    }

    /// Wire name for this event class
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageCreated => "message.created",
            Self::MessageUpdated => "message.updated",
            Self::ChatChanged => "chat.changed",
            Self::MembershipChanged => "membership.changed",
            Self::Typing => "typing",
            Self::CallRinging => "call.ringing",
            Self::CallEnded => "call.ended",
            Self::ServerDiscovered => "server.discovered",
        }
    }
}

impl std::fmt::Display for DomainEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalized events emitted to application listeners
///
/// Exactly one payload per event, or none. `MessageReceived` is emitted for
/// both live records and records replayed by gap recovery; listeners cannot
/// tell the two apart, which is the point.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The session is authenticated and gap recovery has completed.
    /// Fires exactly once per successful connection-authentication cycle.
    Ready,
    /// The connection dropped; the transport's reason string is forwarded
    Disconnected { reason: String },
    /// A connection or authentication failure worth surfacing
    Error { message: String },
    /// A new, not-previously-seen message record
    MessageReceived { payload: Value },
    /// A message was updated
    MessageUpdated { payload: Option<Value> },
    /// Chat metadata changed
    ChatChanged { payload: Option<Value> },
    /// Group membership changed
    MembershipChanged { payload: Option<Value> },
    /// Typing indicator
    Typing { payload: Option<Value> },
    /// Call ringing
    CallRinging { payload: Option<Value> },
    /// Call ended
    CallEnded { payload: Option<Value> },
    /// Server discovery announcement
    ServerDiscovered { payload: Option<Value> },
}

impl ClientEvent {
    /// Build the pass-through event for a non-record domain class
    pub(crate) fn passthrough(kind: DomainEventKind, payload: Option<Value>) -> Option<Self> {
        match kind {
            // MessageCreated goes through the dedup path, never here
            DomainEventKind::MessageCreated => None,
            DomainEventKind::MessageUpdated => Some(Self::MessageUpdated { payload }),
            DomainEventKind::ChatChanged => Some(Self::ChatChanged { payload }),
            DomainEventKind::MembershipChanged => Some(Self::MembershipChanged { payload }),
            DomainEventKind::Typing => Some(Self::Typing { payload }),
            DomainEventKind::CallRinging => Some(Self::CallRinging { payload }),
            DomainEventKind::CallEnded => Some(Self::CallEnded { payload }),
            DomainEventKind::ServerDiscovered => Some(Self::ServerDiscovered { payload }),
        }
    }
}

/// Identifier and creation time extracted from a "new record" payload
///
/// Live `message.created` payloads carry `id` (string) and `createdAt`
/// (Unix milliseconds); both are required for dedup bookkeeping.
pub(crate) fn record_meta(payload: &Value) -> Option<(String, i64)> {
    let id = payload.get("id")?.as_str()?.to_string();
    let created_at = payload.get("createdAt")?.as_i64()?;
    Some((id, created_at))
}

/// Handler trait for receiving normalized client events
///
/// All methods have empty default bodies; implement only the categories the
/// application cares about. Called from the coordinator's event loop, so
/// implementations should return promptly.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use chat_client_core::events::ClientEventHandler;
/// use serde_json::Value;
///
/// struct Printer;
///
/// #[async_trait]
/// impl ClientEventHandler for Printer {
///     async fn on_ready(&self) {
///         println!("session ready");
///     }
///
///     async fn on_message_received(&self, payload: Value) {
///         println!("message: {payload}");
///     }
/// }
/// ```
#[async_trait]
pub trait ClientEventHandler: Send + Sync {
    /// The session reached `Ready` (recovery already complete)
    async fn on_ready(&self) {}

    /// The connection dropped
    async fn on_disconnected(&self, _reason: String) {}

    /// A connection or authentication failure was surfaced
    async fn on_error(&self, _message: String) {}

    /// A new message record arrived (live or recovered)
    async fn on_message_received(&self, _payload: Value) {}

    /// Any other domain event from the catalog
    async fn on_domain_event(&self, _event: ClientEvent) {}
}
