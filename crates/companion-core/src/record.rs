//! Store document representation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::CoreError;

/// Collection names used by the mobile app backend.
pub mod collections {
    /// Registered app users and staff accounts.
    pub const USERS: &str = "users";
    /// Emergency calls placed from the app.
    pub const EMERGENCY_CALLS: &str = "emergencyCalls";
    /// Messages reported as possible scams.
    pub const SCAM_REPORTS: &str = "scamReports";
    /// Health providers listed in the app.
    pub const DOCTORS: &str = "doctors";
    /// Police, fire, and hospital service stations.
    pub const STATIONS: &str = "stations";
    /// Published safety news.
    pub const NEWS: &str = "news";
    /// Emergency hotline directory.
    pub const HOTLINES: &str = "hotlines";
    /// Device telemetry, including location shares.
    pub const ACTIVITY_LOGS: &str = "activity_logs";
    /// Remote device commands awaiting pickup by the device.
    pub const DEVICE_COMMANDS: &str = "device_commands";
    /// Append-only audit trail of outbound device commands.
    pub const DEVICE_COMMAND_AUDIT: &str = "device_command_audit";
}

/// One document mirrored from a store collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned document identifier.
    pub id: String,
    /// Owning collection name.
    pub collection: String,
    /// Raw document fields.
    pub fields: Map<String, Value>,
}

impl Record {
    /// Creates a validated record.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyRecordId`] or
    /// [`CoreError::EmptyCollectionName`] for blank identifiers.
    pub fn new(
        collection: impl Into<String>,
        id: impl Into<String>,
        fields: Map<String, Value>,
    ) -> Result<Self, CoreError> {
        let collection = collection.into();
        if collection.trim().is_empty() {
            return Err(CoreError::EmptyCollectionName);
        }

        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::EmptyRecordId);
        }

        Ok(Self {
            id,
            collection,
            fields,
        })
    }

    /// Builds a record from a raw store document.
    ///
    /// # Errors
    /// Returns [`CoreError::NotAnObject`] when `document` is not a JSON object.
    pub fn from_document(
        collection: impl Into<String>,
        id: impl Into<String>,
        document: Value,
    ) -> Result<Self, CoreError> {
        let id = id.into();
        match document {
            Value::Object(fields) => Self::new(collection, id, fields),
            other => Err(CoreError::NotAnObject {
                id,
                kind: value_kind(&other),
            }),
        }
    }

    /// Returns a raw field value.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns the first present field among `names`.
    pub fn first_field(&self, names: &[&str]) -> Option<&Value> {
        names
            .iter()
            .find_map(|name| self.fields.get(*name).filter(|value| !value.is_null()))
    }

    /// Returns a trimmed, non-blank string field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Returns the first non-blank string field among `names`.
    pub fn first_text(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.text(name))
    }

    /// Returns a numeric field, accepting numeric strings.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(value_as_f64)
    }

    /// Returns the document fields with the id folded back in.
    pub fn to_document(&self) -> Value {
        let mut fields = self.fields.clone();
        fields.insert("id".to_string(), Value::String(self.id.clone()));
        Value::Object(fields)
    }
}

/// Reads a finite number from a JSON number or numeric string.
pub(crate) fn value_as_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    number.is_finite().then_some(number)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn rejects_non_object_documents() {
        let error = Record::from_document("users", "u1", json!([1, 2])).unwrap_err();
        assert_eq!(
            error,
            CoreError::NotAnObject {
                id: "u1".to_string(),
                kind: "array"
            }
        );
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let record =
            Record::from_document("activity_logs", "a1", json!({"battery": " 42 "})).unwrap();
        assert_eq!(record.number("battery"), Some(42.0));
    }
}
