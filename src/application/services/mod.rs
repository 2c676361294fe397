pub mod action_queue;
pub mod optimistic_collection;
pub mod optimistic_ledger;

pub use action_queue::{ActionQueue, spawn_reconnect_sync};
pub use optimistic_collection::OptimisticCollection;
pub use optimistic_ledger::{
    ConflictContext, ConflictResolver, FailureOutcome, LedgerSubscription, OptimisticLedger,
    PreferClient, PreferServer, Resolution, overlay_updates,
};
