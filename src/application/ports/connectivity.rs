use crate::domain::entities::ConnectivityEvent;
use tokio::sync::broadcast;

pub trait ConnectivityMonitor: Send + Sync {
    fn is_online(&self) -> bool;
    /// One event per online/offline transition.
    fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent>;
}
