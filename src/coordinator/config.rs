//! Configuration for the session coordinator
//!
//! Configuration is fixed at coordinator creation; when the coordinator is
//! obtained through [`SessionRegistry`](crate::coordinator::SessionRegistry),
//! that means fixed at first access for the process lifetime.

use serde::{Deserialize, Serialize};

/// Default maximum number of processed record ids kept for deduplication
pub const DEFAULT_MAX_PROCESSED_IDS: usize = 1000;

/// Default page size for a gap-recovery history fetch
pub const DEFAULT_RECOVERY_PAGE_SIZE: u32 = 100;

/// Configuration for a [`SessionCoordinator`](crate::coordinator::SessionCoordinator)
///
/// # Examples
///
/// ```rust
/// use chat_client_core::coordinator::CoordinatorConfig;
///
/// // Legacy mode: no credential, the session is ready as soon as the
/// // transport connects
/// let config = CoordinatorConfig::new();
/// assert!(config.credential.is_none());
/// assert_eq!(config.max_processed_ids, 1000);
///
/// // Authenticated session with a smaller dedup window
/// let config = CoordinatorConfig::new()
///     .with_credential("app-token-123".to_string())
///     .with_max_processed_ids(200)
///     .with_recovery_page_size(50);
///
/// assert_eq!(config.credential.as_deref(), Some("app-token-123"));
/// assert_eq!(config.recovery_page_size, 50);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Credential carried in the transport handshake. When `None`, the
    /// session runs in legacy mode: connecting counts as authenticated.
    pub credential: Option<String>,

    /// Dedup ledger bound. When the ledger exceeds this, it is trimmed to
    /// the most-recently-inserted half.
    pub max_processed_ids: usize,

    /// Upper bound on records fetched in one gap-recovery pass
    pub recovery_page_size: u32,

    /// Client identification string, for logging and diagnostics
    pub user_agent: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            credential: None,
            max_processed_ids: DEFAULT_MAX_PROCESSED_IDS,
            recovery_page_size: DEFAULT_RECOVERY_PAGE_SIZE,
            user_agent: "chat-client-core".to_string(),
        }
    }
}

impl CoordinatorConfig {
    /// Create a configuration with default settings and no credential
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the handshake credential
    pub fn with_credential(mut self, credential: String) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Set the dedup ledger bound
    pub fn with_max_processed_ids(mut self, max: usize) -> Self {
        self.max_processed_ids = max;
        self
    }

    /// Set the gap-recovery page size
    pub fn with_recovery_page_size(mut self, limit: u32) -> Self {
        self.recovery_page_size = limit;
        self
    }

    /// Set the client identification string
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}
