use super::rows::QueuedActionRow;
use crate::domain::entities::QueuedAction;
use crate::domain::value_objects::{
    EntityId, EntityType, HttpMethod, MutationKind, OfflinePayload, QueuedActionId,
};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub fn queued_action_from_row(row: QueuedActionRow) -> Result<QueuedAction, AppError> {
    let id = QueuedActionId::new(row.id).map_err(AppError::DeserializationError)?;
    let kind = row
        .kind
        .parse::<MutationKind>()
        .map_err(AppError::DeserializationError)?;
    let entity_type = EntityType::new(row.entity_type).map_err(AppError::DeserializationError)?;
    let entity_id = EntityId::new(row.entity_id).map_err(AppError::DeserializationError)?;
    let method = row
        .method
        .parse::<HttpMethod>()
        .map_err(AppError::DeserializationError)?;
    let body = row
        .body
        .as_deref()
        .map(OfflinePayload::from_json_str)
        .transpose()
        .map_err(AppError::DeserializationError)?;
    let headers: BTreeMap<String, String> = serde_json::from_str(&row.headers)
        .map_err(|err| AppError::DeserializationError(err.to_string()))?;

    Ok(QueuedAction {
        id,
        kind,
        entity_type,
        entity_id,
        url: row.url,
        method,
        body,
        headers,
        created_at: timestamp_from_millis(row.created_at)?,
        retry_count: count_from_column("retry_count", row.retry_count)?,
        max_retries: count_from_column("max_retries", row.max_retries)?,
    })
}

pub fn headers_to_json(headers: &BTreeMap<String, String>) -> Result<String, AppError> {
    serde_json::to_string(headers).map_err(|err| AppError::SerializationError(err.to_string()))
}

pub fn body_to_json(body: Option<&OfflinePayload>) -> Option<String> {
    body.map(OfflinePayload::to_json_string)
}

fn timestamp_from_millis(value: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::<Utc>::from_timestamp_millis(value)
        .ok_or_else(|| AppError::DeserializationError(format!("Invalid timestamp: {value}")))
}

fn count_from_column(column: &str, value: i64) -> Result<u32, AppError> {
    u32::try_from(value)
        .map_err(|_| AppError::DeserializationError(format!("Invalid {column}: {value}")))
}
