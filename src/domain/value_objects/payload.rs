use crate::shared::error::AppError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON body carried by queued actions and optimistic updates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "Value", into = "Value")]
pub struct OfflinePayload(Value);

impl OfflinePayload {
    pub fn new(value: Value) -> Result<Self, String> {
        Self::validate(&value)?;
        Ok(Self(value))
    }

    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| format!("Invalid JSON payload: {e}"))?;
        Self::new(value)
    }

    /// Serializes a typed entity into a payload.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, AppError> {
        let value = serde_json::to_value(value)
            .map_err(|err| AppError::SerializationError(err.to_string()))?;
        Self::new(value).map_err(AppError::ValidationError)
    }

    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_value(self.0.clone())
            .map_err(|err| AppError::DeserializationError(err.to_string()))
    }

    pub fn empty_object() -> Self {
        Self(Value::Object(serde_json::Map::new()))
    }

    pub fn is_object(&self) -> bool {
        self.0.is_object()
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    pub fn to_json_string(&self) -> String {
        self.0.to_string()
    }

    fn validate(value: &Value) -> Result<(), String> {
        if value.is_null() {
            return Err("Offline payload cannot be null".to_string());
        }
        Ok(())
    }
}

impl From<OfflinePayload> for Value {
    fn from(payload: OfflinePayload) -> Self {
        payload.0
    }
}

impl TryFrom<Value> for OfflinePayload {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
