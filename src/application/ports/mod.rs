pub mod action_store;
pub mod connectivity;
pub mod replay_gateway;
pub mod sync_notifier;

pub use action_store::ActionStore;
pub use connectivity::ConnectivityMonitor;
pub use replay_gateway::ReplayGateway;
pub use sync_notifier::SyncNotifier;
