use crate::application::ports::SyncNotifier;
use crate::domain::entities::SyncNotice;
use tokio::sync::broadcast;

/// Fans notices out to any number of UI subscribers.
pub struct ChannelNotifier {
    sender: broadcast::Sender<SyncNotice>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotice> {
        self.sender.subscribe()
    }
}

impl Default for ChannelNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl SyncNotifier for ChannelNotifier {
    fn notify(&self, notice: SyncNotice) {
        let _ = self.sender.send(notice);
    }
}
