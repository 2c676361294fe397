pub mod connectivity_event;
pub mod optimistic_update;
pub mod queued_action;
pub mod sync_notice;
pub mod sync_report;

pub use connectivity_event::ConnectivityEvent;
pub use optimistic_update::OptimisticUpdate;
pub use queued_action::{NewQueuedAction, QueuedAction, QueuedActionDraft};
pub use sync_notice::SyncNotice;
pub use sync_report::{ExhaustedAction, SkipReason, SyncOutcome, SyncReport};
