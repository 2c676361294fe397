use crate::domain::entities::OptimisticUpdate;
use crate::domain::value_objects::{EntityType, MutationKind};
use crate::shared::error::AppError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Overlays the pending updates for `entity_type` onto `base`.
///
/// Updates apply oldest first, so the latest write to an id wins. `base` is never
/// modified; a new collection is returned on every call.
pub fn overlay_updates<T, F>(
    base: &[T],
    updates: &[OptimisticUpdate],
    entity_type: &EntityType,
    id_of: F,
) -> Result<Vec<T>, AppError>
where
    T: Clone + Serialize + DeserializeOwned,
    F: Fn(&T) -> String,
{
    let mut relevant: Vec<&OptimisticUpdate> = updates
        .iter()
        .filter(|update| update.is_pending() && &update.entity_type == entity_type)
        .collect();
    relevant.sort_by_key(|update| (update.created_at, update.sequence));

    let mut items = base.to_vec();
    for update in relevant {
        let target = update.entity_id.as_str();
        let position = items.iter().position(|item| id_of(item) == target);

        match (update.kind, position) {
            (MutationKind::Create, None) => items.push(update.data.deserialize()?),
            (MutationKind::Create, Some(_)) => {}
            (MutationKind::Update, Some(index)) => {
                let merged = shallow_merge(&items[index], update.data.as_json())?;
                items[index] = merged;
            }
            (MutationKind::Update, None) => {}
            (MutationKind::Delete, Some(index)) => {
                items.remove(index);
            }
            (MutationKind::Delete, None) => {}
        }
    }

    Ok(items)
}

fn shallow_merge<T>(item: &T, patch: &Value) -> Result<T, AppError>
where
    T: Serialize + DeserializeOwned,
{
    let Value::Object(patch) = patch else {
        return Err(AppError::ValidationError(
            "Update payload must be a JSON object".to_string(),
        ));
    };

    let mut value =
        serde_json::to_value(item).map_err(|err| AppError::SerializationError(err.to_string()))?;
    let Value::Object(fields) = &mut value else {
        return Err(AppError::ValidationError(
            "Only object entities can be patched".to_string(),
        ));
    };
    for (key, field) in patch {
        fields.insert(key.clone(), field.clone());
    }

    serde_json::from_value(value).map_err(|err| AppError::DeserializationError(err.to_string()))
}
