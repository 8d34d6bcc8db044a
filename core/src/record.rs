//! Typed configuration records and their field-copy policies.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::category::{Category, RecordKind};
use crate::error::{ApiError, SyncError};
use crate::types::{
    ActivityType, CustomField, NewActivityType, NewCustomField, NewStatus, ResourceRecord, Status,
};

/// Opportunity status type used when the source record has none.
const DEFAULT_STATUS_TYPE: &str = "active";

/// A validated record of one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigRecord {
    CustomField(CustomField),
    ActivityType(ActivityType),
    Status(Status),
}

impl ConfigRecord {
    /// Validate a raw record against the category's required fields.
    pub fn ingest(category: Category, record: &ResourceRecord) -> Result<Self, SyncError> {
        let malformed = |reason: String| SyncError::MalformedRecord {
            category,
            reason: match record.id() {
                Some(id) => format!("record {id}: {reason}"),
                None => reason,
            },
        };
        let value = Value::Object(record.fields().clone());
        let typed = match category.kind() {
            RecordKind::CustomField => serde_json::from_value(value).map(ConfigRecord::CustomField),
            RecordKind::ActivityType => {
                serde_json::from_value(value).map(ConfigRecord::ActivityType)
            }
            RecordKind::Status => serde_json::from_value(value).map(ConfigRecord::Status),
        }
        .map_err(|e| malformed(e.to_string()))?;

        if typed.id().trim().is_empty() {
            return Err(malformed("empty id".to_string()));
        }
        if typed.natural_key().trim().is_empty() {
            return Err(malformed(format!("empty {}", category.identity_field())));
        }
        Ok(typed)
    }

    /// Server-assigned id in the environment the record came from.
    pub fn id(&self) -> &str {
        match self {
            ConfigRecord::CustomField(field) => &field.id,
            ConfigRecord::ActivityType(activity_type) => &activity_type.id,
            ConfigRecord::Status(status) => &status.id,
        }
    }

    /// Raw value of the identity field (`name` or `label`).
    pub fn natural_key(&self) -> &str {
        match self {
            ConfigRecord::CustomField(field) => &field.name,
            ConfigRecord::ActivityType(activity_type) => &activity_type.name,
            ConfigRecord::Status(status) => &status.label,
        }
    }

    /// Fields copied from the source record, with references rewritten.
    fn payload(&self, refs: &ReferenceMap) -> Result<Map<String, Value>, PayloadError> {
        match self {
            ConfigRecord::CustomField(field) => {
                let custom_activity_type_id = match &field.custom_activity_type_id {
                    Some(source_id) => Some(
                        refs.resolve(Category::CustomActivityType, source_id)
                            .ok_or_else(|| PayloadError::UnmappedReference {
                                category: Category::CustomActivityType,
                                source_id: source_id.clone(),
                            })?
                            .to_string(),
                    ),
                    None => None,
                };
                to_fields(&NewCustomField {
                    name: field.name.clone(),
                    field_type: field.field_type.clone(),
                    description: non_empty(&field.description),
                    choices: field.choices.clone().unwrap_or_default(),
                    accepts_multiple_values: field.accepts_multiple_values.unwrap_or(false),
                    required: field.required.unwrap_or(false),
                    editable_with_roles: field.editable_with_roles.clone().unwrap_or_default(),
                    referenced_custom_type_id: field.referenced_custom_type_id.clone(),
                    back_reference_is_visible: field.back_reference_is_visible,
                    custom_activity_type_id,
                })
            }
            ConfigRecord::ActivityType(activity_type) => to_fields(&NewActivityType {
                name: activity_type.name.clone(),
                description: non_empty(&activity_type.description),
                api_create_only: activity_type.api_create_only,
                editable_with_roles: activity_type.editable_with_roles.clone().unwrap_or_default(),
            }),
            ConfigRecord::Status(status) => to_fields(&NewStatus {
                label: status.label.clone(),
                status_type: status.status_type.clone(),
            }),
        }
    }

    /// Build the fields sent to `create` in the target collection of
    /// `category`.
    pub fn create_payload(
        &self,
        category: Category,
        refs: &ReferenceMap,
    ) -> Result<Map<String, Value>, PayloadError> {
        match (category, self) {
            (Category::ActivityCustomField, ConfigRecord::CustomField(field))
                if field.custom_activity_type_id.is_none() =>
            {
                Err(PayloadError::MissingReference {
                    field: "custom_activity_type_id",
                })
            }
            (Category::OpportunityStatus, ConfigRecord::Status(status)) => {
                let mut fields = self.payload(refs)?;
                if status.status_type.is_none() {
                    fields.insert("type".to_string(), Value::from(DEFAULT_STATUS_TYPE));
                }
                Ok(fields)
            }
            _ => self.payload(refs),
        }
    }
}

/// Why a create payload could not be built. The item is skipped, not sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("no {field} on source record")]
    MissingReference { field: &'static str },

    #[error("{category} {source_id} has no counterpart in target")]
    UnmappedReference { category: Category, source_id: String },

    #[error(transparent)]
    Encode(#[from] ApiError),
}

/// Source id to target id, per category, for records known to exist on both
/// sides.
#[derive(Debug, Clone, Default)]
pub struct ReferenceMap {
    ids: HashMap<(Category, String), String>,
}

impl ReferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, category: Category, source_id: &str, target_id: &str) {
        self.ids
            .insert((category, source_id.to_string()), target_id.to_string());
    }

    pub fn resolve(&self, category: Category, source_id: &str) -> Option<&str> {
        self.ids
            .get(&(category, source_id.to_string()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.is_empty()).cloned()
}

fn to_fields<T: Serialize>(payload: &T) -> Result<Map<String, Value>, PayloadError> {
    match serde_json::to_value(payload) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(ApiError::Serialization(format!("expected object, got {other}")).into()),
        Err(e) => Err(ApiError::Serialization(e.to_string()).into()),
    }
}
