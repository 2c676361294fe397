use crate::application::ports::SyncNotifier;
use crate::domain::entities::SyncNotice;
use tracing::{info, warn};

/// Writes notices to the log instead of a UI.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl SyncNotifier for TracingNotifier {
    fn notify(&self, notice: SyncNotice) {
        match notice {
            SyncNotice::ConnectionLost => {
                warn!(target: "workforce_sync::notice", "Connection lost; changes will sync later")
            }
            SyncNotice::ConnectionRestored => {
                info!(target: "workforce_sync::notice", "Connection restored")
            }
            SyncNotice::SyncStarted { pending } => {
                info!(target: "workforce_sync::notice", pending, "Syncing offline changes")
            }
            SyncNotice::ActionExhausted { action } => warn!(
                target: "workforce_sync::notice",
                action_id = %action.id,
                entity_type = %action.entity_type,
                entity_id = %action.entity_id,
                attempts = action.attempts,
                error = %action.last_error,
                "Offline change could not be synced"
            ),
            SyncNotice::SyncCompleted { report } => info!(
                target: "workforce_sync::notice",
                succeeded = report.succeeded,
                retried = report.retried,
                exhausted = report.exhausted.len(),
                "Offline sync complete"
            ),
        }
    }
}
