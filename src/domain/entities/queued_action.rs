use crate::domain::value_objects::{
    EntityId, EntityType, HttpMethod, MutationKind, OfflinePayload, QueuedActionId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A persisted network mutation awaiting replay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedAction {
    pub id: QueuedActionId,
    pub kind: MutationKind,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub url: String,
    pub method: HttpMethod,
    pub body: Option<OfflinePayload>,
    pub headers: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl QueuedAction {
    pub fn from_new(id: QueuedActionId, action: NewQueuedAction) -> Self {
        Self {
            id,
            kind: action.kind,
            entity_type: action.entity_type,
            entity_id: action.entity_id,
            url: action.url,
            method: action.method,
            body: action.body,
            headers: action.headers,
            created_at: action.created_at,
            retry_count: action.retry_count,
            max_retries: action.max_retries,
        }
    }

    /// Whether one more failed replay would exhaust the action.
    pub fn is_last_attempt(&self) -> bool {
        self.retry_count + 1 >= self.max_retries
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count.min(self.max_retries);
        self
    }
}

/// A fully resolved action that has not been assigned an id yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewQueuedAction {
    pub kind: MutationKind,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub url: String,
    pub method: HttpMethod,
    pub body: Option<OfflinePayload>,
    pub headers: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
}

/// Caller input for `ActionQueue::enqueue`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedActionDraft {
    pub kind: MutationKind,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub url: String,
    pub method: HttpMethod,
    pub body: Option<OfflinePayload>,
    pub headers: BTreeMap<String, String>,
    pub max_retries: Option<u32>,
}

impl QueuedActionDraft {
    pub fn new(
        kind: MutationKind,
        entity_type: EntityType,
        entity_id: EntityId,
        method: HttpMethod,
        url: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            entity_type,
            entity_id,
            url: url.into(),
            method,
            body: None,
            headers: BTreeMap::new(),
            max_retries: None,
        }
    }

    pub fn with_body(mut self, body: OfflinePayload) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("Queued action URL cannot be empty".to_string());
        }
        if self.max_retries == Some(0) {
            return Err("Queued action max_retries must be greater than 0".to_string());
        }
        if self.headers.keys().any(|name| name.trim().is_empty()) {
            return Err("Queued action header names cannot be empty".to_string());
        }
        Ok(())
    }

    pub fn into_new(self, default_max_retries: u32, created_at: DateTime<Utc>) -> NewQueuedAction {
        NewQueuedAction {
            kind: self.kind,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            url: self.url,
            method: self.method,
            body: self.body,
            headers: self.headers,
            created_at,
            retry_count: 0,
            max_retries: self.max_retries.unwrap_or(default_max_retries),
        }
    }
}
