//! Offline write queue and optimistic update ledger for the workforce dashboard.
//!
//! [`ActionQueue`] persists writes made while offline and replays them once the
//! connection returns. [`OptimisticLedger`] tracks speculative changes shown to
//! the user before the server has confirmed them.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::services::{
    ActionQueue, ConflictContext, ConflictResolver, FailureOutcome, LedgerSubscription,
    OptimisticCollection, OptimisticLedger, PreferClient, PreferServer, Resolution,
    overlay_updates, spawn_reconnect_sync,
};
pub use domain::entities::{
    ConnectivityEvent, OptimisticUpdate, QueuedAction, QueuedActionDraft, SyncNotice,
    SyncOutcome, SyncReport,
};
pub use infrastructure::{
    ChannelNotifier, HttpReplayGateway, InMemoryActionStore, SharedConnectivity,
    SqliteActionStore, TracingNotifier, spawn_http_probe,
};
pub use shared::config::AppConfig;
pub use shared::error::{AppError, Result};
pub use shared::logging::init_logging;
