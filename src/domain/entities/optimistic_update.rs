use crate::domain::value_objects::{
    EntityId, EntityType, MutationKind, OfflinePayload, OptimisticUpdateId, UpdateStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A speculative mutation shown to the user before the server confirms it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimisticUpdate {
    pub id: OptimisticUpdateId,
    pub kind: MutationKind,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub data: OfflinePayload,
    pub original_data: Option<OfflinePayload>,
    pub created_at: DateTime<Utc>,
    /// Tie-breaker for updates created within the same millisecond.
    pub sequence: u64,
    pub status: UpdateStatus,
    pub retry_count: u32,
    pub error: Option<String>,
}

impl OptimisticUpdate {
    pub fn is_pending(&self) -> bool {
        self.status == UpdateStatus::Pending
    }

    pub fn targets(&self, entity_type: &EntityType, entity_id: &EntityId) -> bool {
        &self.entity_type == entity_type && &self.entity_id == entity_id
    }
}
