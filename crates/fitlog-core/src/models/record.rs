//! Generic domain record model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A generic synchronized entity (profile, workout completion, meal
/// completion, body measurement, nutrition entry).
///
/// The required keys (`id`, `owner_id`, `updated_at`) are typed; every
/// remaining field stays in the domain-specific JSON payload, validated
/// only at the remote-store boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRecord {
    /// Unique item identifier
    pub id: String,
    /// Owning user identifier
    pub owner_id: String,
    /// Last modification time (Unix ms); zero when the remote row never
    /// carried one, which the conflict tie-break resolves toward remote
    #[serde(default)]
    pub updated_at: i64,
    /// Domain-specific payload fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl DomainRecord {
    /// Create an empty record stamped with the current time.
    pub fn new(id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            updated_at: crate::util::timestamp_now_ms(),
            fields: Map::new(),
        }
    }

    /// Validate a raw JSON value into a record at the store boundary.
    ///
    /// Rejects values that are not objects or that are missing a
    /// non-empty `id`/`owner_id`. A missing `updated_at` is tolerated
    /// and treated as zero (the conflict tie-break then favors remote).
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::Corruption(format!(
                "expected a JSON object record, got {}",
                type_name(&value)
            )));
        }

        let record: Self = serde_json::from_value(value)
            .map_err(|error| Error::Corruption(format!("malformed record: {error}")))?;

        if record.id.trim().is_empty() {
            return Err(Error::Corruption("record has an empty id".to_string()));
        }
        if record.owner_id.trim().is_empty() {
            return Err(Error::Corruption(format!(
                "record '{}' has an empty owner_id",
                record.id
            )));
        }

        Ok(record)
    }

    /// Serialize to a JSON value for the remote-store boundary.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Read a payload field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Write a payload field and bump `updated_at`.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
        self.touch();
    }

    /// Bump `updated_at` to the current time.
    pub fn touch(&mut self) {
        self.updated_at = crate::util::timestamp_now_ms();
    }

    /// Builder-style payload field assignment (does not bump `updated_at`).
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Builder-style timestamp assignment.
    #[must_use]
    pub const fn with_updated_at(mut self, updated_at: i64) -> Self {
        self.updated_at = updated_at;
        self
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
