use crate::domain::entities::{NewQueuedAction, QueuedAction};
use crate::domain::value_objects::QueuedActionId;
use crate::shared::error::AppError;
use async_trait::async_trait;

/// Durable storage for queued actions.
///
/// `get_all` returns actions in ascending id order.
#[async_trait]
pub trait ActionStore: Send + Sync {
    async fn insert(&self, action: NewQueuedAction) -> Result<QueuedAction, AppError>;
    async fn put(&self, action: &QueuedAction) -> Result<(), AppError>;
    async fn get_all(&self) -> Result<Vec<QueuedAction>, AppError>;
    /// Returns `false` when no record had that id.
    async fn delete(&self, id: QueuedActionId) -> Result<bool, AppError>;
    async fn clear(&self) -> Result<u64, AppError>;
    async fn count(&self) -> Result<u64, AppError>;
}
