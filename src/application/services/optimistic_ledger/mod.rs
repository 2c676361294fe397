mod conflict;
mod ledger;
mod overlay;


pub use conflict::{ConflictContext, ConflictResolver, PreferClient, PreferServer, Resolution};
pub use ledger::{FailureOutcome, LedgerSubscription, OptimisticLedger};
pub use overlay::overlay_updates;
