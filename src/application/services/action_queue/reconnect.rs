use super::queue::ActionQueue;
use crate::domain::entities::{ConnectivityEvent, SyncNotice};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Watches connectivity and runs one `sync` per offline→online transition.
pub fn spawn_reconnect_sync(queue: Arc<ActionQueue>) -> JoinHandle<()> {
    let mut events = queue.connectivity().subscribe();
    let mut online = queue.is_online();

    tokio::spawn(async move {
        loop {
            let now_online = match events.recv().await {
                Ok(event) => event.is_online(),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Connectivity watcher lagged; re-reading state");
                    queue.is_online()
                }
                Err(RecvError::Closed) => {
                    info!("Connectivity source closed; stopping reconnect watcher");
                    break;
                }
            };

            if now_online == online {
                continue;
            }
            online = now_online;

            handle_transition(&queue, ConnectivityEvent::from_online(now_online)).await;
        }
    })
}

async fn handle_transition(queue: &ActionQueue, event: ConnectivityEvent) {
    let notifier = queue.notifier();
    match event {
        ConnectivityEvent::Offline => {
            warn!("Connection lost; offline actions will be queued");
            notifier.notify(SyncNotice::ConnectionLost);
        }
        ConnectivityEvent::Online => {
            info!("Connection restored");
            notifier.notify(SyncNotice::ConnectionRestored);

            if !queue.config().auto_sync {
                return;
            }

            match queue.count().await {
                Ok(0) => {}
                Ok(pending) => notifier.notify(SyncNotice::SyncStarted { pending }),
                Err(err) => error!(error = %err, "Failed to count offline actions"),
            }

            if let Err(err) = queue.sync().await {
                error!(error = %err, "Automatic offline action sync failed");
            }
        }
    }
}
