pub mod connectivity;
pub mod error;
pub mod http_replay;

pub use connectivity::{SharedConnectivity, spawn_http_probe};
pub use error::ReplayError;
pub use http_replay::HttpReplayGateway;
