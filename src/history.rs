//! Message history seam used for gap recovery
//!
//! After an outage the coordinator closes the gap by asking a
//! [`HistoryFetcher`] for records created after its high-water mark. The
//! fetcher is typically a thin wrapper over the service's REST history
//! endpoint; the coordinator only depends on this trait.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientResult;

/// A single historical record returned by a [`HistoryFetcher`]
///
/// Timestamps are Unix milliseconds, matching the `createdAt` field carried
/// by live "new record" payloads so the two paths share one high-water mark.
///
/// # Examples
///
/// ```rust
/// use chat_client_core::history::HistoryRecord;
/// use serde_json::json;
///
/// let record = HistoryRecord {
///     id: "msg-41".to_string(),
///     created_at: 1_700_000_000_000,
///     payload: json!({ "id": "msg-41", "createdAt": 1_700_000_000_000u64, "text": "hi" }),
/// };
///
/// assert!(record.created_at_utc().is_some());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    /// Globally unique record identifier
    pub id: String,
    /// Creation time, Unix milliseconds
    pub created_at: i64,
    /// Full record payload, re-emitted verbatim when the record is replayed
    pub payload: Value,
}

impl HistoryRecord {
    /// Creation time as a UTC datetime, if the millisecond value is in range
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.created_at).single()
    }
}

/// Fetches records created after a given timestamp
///
/// Results must be ascending by creation time and bounded by `limit`.
/// Errors are tolerated by the caller: gap recovery is best-effort.
#[async_trait]
pub trait HistoryFetcher: Send + Sync {
    /// Return up to `limit` records created strictly after `after`
    /// (Unix milliseconds), oldest first.
    async fn fetch_after(&self, after: i64, limit: u32) -> ClientResult<Vec<HistoryRecord>>;
}
