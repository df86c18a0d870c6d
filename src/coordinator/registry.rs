//! Process-wide session registry
//!
//! The intended shape is one shared session per process, lazily created.
//! Rather than an ambient global, [`SessionRegistry`] is an explicit
//! first-access-wins factory: the composition root owns it and hands it to
//! whatever resource modules need the coordinator. Configuration is fixed
//! by whichever caller gets there first; later initializers are ignored.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::debug;

use crate::coordinator::{CoordinatorConfig, SessionCoordinator};
use crate::history::HistoryFetcher;
use crate::transport::RealtimeTransport;

/// Lazily-initialized holder of the process's single [`SessionCoordinator`]
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use tokio::sync::mpsc;
/// use chat_client_core::coordinator::{CoordinatorConfig, SessionRegistry};
/// use chat_client_core::history::{HistoryFetcher, HistoryRecord};
/// use chat_client_core::transport::{RealtimeTransport, TransportEvent};
/// use chat_client_core::ClientResult;
///
/// # struct NullTransport;
/// # #[async_trait]
/// # impl RealtimeTransport for NullTransport {
/// #     fn attach(&self, _events: mpsc::UnboundedSender<TransportEvent>) {}
/// #     async fn connect(&self) -> ClientResult<()> { Ok(()) }
/// #     async fn disconnect(&self) {}
/// # }
/// # struct NullHistory;
/// # #[async_trait]
/// # impl HistoryFetcher for NullHistory {
/// #     async fn fetch_after(&self, _after: i64, _limit: u32) -> ClientResult<Vec<HistoryRecord>> {
/// #         Ok(Vec::new())
/// #     }
/// # }
/// # #[tokio::main]
/// # async fn main() {
/// let registry = SessionRegistry::new();
///
/// let a = registry
///     .obtain(|| {
///         (
///             CoordinatorConfig::new(),
///             Arc::new(NullTransport) as Arc<dyn RealtimeTransport>,
///             Arc::new(NullHistory) as Arc<dyn HistoryFetcher>,
///         )
///     })
///     .await;
/// let b = registry
///     .obtain(|| unreachable!("already initialized"))
///     .await;
///
/// assert!(Arc::ptr_eq(&a, &b));
/// # }
/// ```
#[derive(Debug, Default)]
pub struct SessionRegistry {
    slot: OnceCell<Arc<SessionCoordinator>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            slot: OnceCell::new(),
        }
    }

    /// Get the shared coordinator, creating it on first access
    ///
    /// `init` supplies the configuration and collaborators; it runs only if
    /// no coordinator exists yet. Every caller receives the same instance
    /// for the lifetime of the registry.
    pub async fn obtain<F>(&self, init: F) -> Arc<SessionCoordinator>
    where
        F: FnOnce() -> (
            CoordinatorConfig,
            Arc<dyn RealtimeTransport>,
            Arc<dyn HistoryFetcher>,
        ),
    {
        self.slot
            .get_or_init(|| async {
                let (config, transport, history) = init();
                debug!("creating process-wide session coordinator");
                Arc::new(SessionCoordinator::new(config, transport, history))
            })
            .await
            .clone()
    }

    /// The coordinator, if one has been created
    pub fn get(&self) -> Option<Arc<SessionCoordinator>> {
        self.slot.get().cloned()
    }
}
