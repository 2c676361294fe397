use crate::application::ports::ConnectivityMonitor;
use crate::domain::entities::ConnectivityEvent;
use reqwest::Client;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const EVENT_CAPACITY: usize = 16;

/// Current online state plus a transition feed.
///
/// Hosts that receive platform network events call `set_online` directly;
/// `spawn_http_probe` drives it from reachability checks.
pub struct SharedConnectivity {
    online: AtomicBool,
    events: broadcast::Sender<ConnectivityEvent>,
}

impl SharedConnectivity {
    pub fn new(initially_online: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            online: AtomicBool::new(initially_online),
            events,
        }
    }

    /// Returns `true` if this call changed the state.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::AcqRel);
        if previous == online {
            return false;
        }

        info!(online, "Connectivity changed");
        // No receivers is fine.
        let _ = self.events.send(ConnectivityEvent::from_online(online));
        true
    }
}

impl ConnectivityMonitor for SharedConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }
}

/// Polls `url` every `interval`; any HTTP response counts as online.
pub fn spawn_http_probe(
    connectivity: Arc<SharedConnectivity>,
    client: Client,
    url: String,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let reachable = match client.head(&url).send().await {
                Ok(_) => true,
                Err(err) => {
                    debug!(error = %err, "Connectivity probe failed");
                    false
                }
            };
            connectivity.set_online(reachable);
        }
    })
}
