use crate::application::ports::ActionStore;
use crate::domain::entities::{NewQueuedAction, QueuedAction};
use crate::domain::value_objects::QueuedActionId;
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    actions: BTreeMap<QueuedActionId, QueuedAction>,
}

/// Process-local action store for tests and hosts without a database.
#[derive(Default)]
pub struct InMemoryActionStore {
    state: Mutex<MemoryState>,
}

impl InMemoryActionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActionStore for InMemoryActionStore {
    async fn insert(&self, action: NewQueuedAction) -> Result<QueuedAction, AppError> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = QueuedActionId::new(state.next_id).map_err(AppError::Internal)?;
        let action = QueuedAction::from_new(id, action);
        state.actions.insert(id, action.clone());
        Ok(action)
    }

    async fn put(&self, action: &QueuedAction) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        match state.actions.get_mut(&action.id) {
            Some(existing) => {
                *existing = action.clone();
                Ok(())
            }
            None => Err(AppError::not_found("queued action", action.id)),
        }
    }

    async fn get_all(&self) -> Result<Vec<QueuedAction>, AppError> {
        let state = self.state.lock().await;
        Ok(state.actions.values().cloned().collect())
    }

    async fn delete(&self, id: QueuedActionId) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        Ok(state.actions.remove(&id).is_some())
    }

    async fn clear(&self) -> Result<u64, AppError> {
        let mut state = self.state.lock().await;
        let removed = state.actions.len() as u64;
        state.actions.clear();
        Ok(removed)
    }

    async fn count(&self) -> Result<u64, AppError> {
        let state = self.state.lock().await;
        Ok(state.actions.len() as u64)
    }
}
