//! Gap recovery
//!
//! Closes the window between a connection drop and its recovery by replaying
//! records the client would otherwise have missed. Triggered only from the
//! `Ready` entry actions in the coordinator; application code never calls
//! it. Best-effort throughout: any fetch failure is logged and swallowed so
//! readiness is never blocked.

use tracing::{debug, info, warn};

use crate::events::ClientEvent;

use super::SessionCoordinator;

impl SessionCoordinator {
    /// Replay records created after the high-water mark
    ///
    /// Skipped when no mark has been established yet (first-ever
    /// connection: nothing to recover from). Fetched records are run
    /// through the same dedup bookkeeping as live deliveries, so a record
    /// that raced in over the reconnected transport is not emitted twice.
    pub(crate) async fn run_gap_recovery(&self) {
        let after = self.state.read().await.ledger.high_water_mark();
        if after == 0 {
            debug!("no high-water mark yet; skipping gap recovery");
            return;
        }

        let limit = self.config.recovery_page_size;
        debug!("recovering records created after {} (limit {})", after, limit);
        let records = match self.history.fetch_after(after, limit).await {
            Ok(records) => records,
            Err(e) => {
                // Best-effort: the session becomes ready regardless
                warn!("gap recovery fetch failed, continuing without replay: {}", e);
                return;
            }
        };

        let mut replayed = 0usize;
        for record in records {
            let fresh = self
                .state
                .write()
                .await
                .ledger
                .observe(&record.id, record.created_at);
            if !fresh {
                debug!("recovered record {} already processed", record.id);
                continue;
            }
            replayed += 1;
            self.emit(ClientEvent::MessageReceived {
                payload: record.payload,
            })
            .await;
        }

        if replayed > 0 {
            info!("gap recovery replayed {} missed record(s)", replayed);
        }
    }
}
