use crate::domain::entities::QueuedAction;
use crate::shared::error::AppError;
use async_trait::async_trait;

#[async_trait]
pub trait ReplayGateway: Send + Sync {
    /// Re-issues the action's request. Any error or non-success status is a failure.
    async fn replay(&self, action: &QueuedAction) -> Result<(), AppError>;
}
