use crate::domain::entities::SyncNotice;

pub trait SyncNotifier: Send + Sync {
    fn notify(&self, notice: SyncNotice);
}
