use super::sync_report::{ExhaustedAction, SyncReport};
use serde::{Deserialize, Serialize};

/// User-facing notifications emitted by the action queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "notice")]
pub enum SyncNotice {
    ConnectionLost,
    ConnectionRestored,
    SyncStarted { pending: u64 },
    ActionExhausted { action: ExhaustedAction },
    SyncCompleted { report: SyncReport },
}
