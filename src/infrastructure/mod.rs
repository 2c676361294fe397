pub mod network;
pub mod notifications;
pub mod offline;

pub use network::{HttpReplayGateway, ReplayError, SharedConnectivity, spawn_http_probe};
pub use notifications::{ChannelNotifier, TracingNotifier};
pub use offline::{InMemoryActionStore, SqliteActionStore};
