//! Wire DTOs for the CRM configuration endpoints.
//!
//! # Design
//! `ResourceRecord` is the raw, loosely-typed object the API returns and the
//! form snapshots are archived in. The typed structs below are what the sync
//! engine actually works with; each one spells out which fields are required
//! so ingestion can reject a bad record up front. The `New*` structs are the
//! create payloads, omitting empty optional fields the way the API expects.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One remote object exactly as the API returned it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceRecord(Map<String, Value>);

impl ResourceRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Server-assigned id, if present and a string.
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ResourceRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// One page of a list response.
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    pub data: Vec<ResourceRecord>,
    #[serde(default)]
    pub has_more: bool,
}

/// A custom field definition (lead, contact, opportunity, activity, shared).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub description: Option<String>,
    pub choices: Option<Vec<String>>,
    pub accepts_multiple_values: Option<bool>,
    pub required: Option<bool>,
    pub editable_with_roles: Option<Vec<String>>,
    pub referenced_custom_type_id: Option<String>,
    pub back_reference_is_visible: Option<bool>,
    pub custom_activity_type_id: Option<String>,
}

/// A custom activity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityType {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub api_create_only: Option<bool>,
    pub editable_with_roles: Option<Vec<String>>,
}

/// A lead or opportunity status. Only opportunity statuses carry `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub status_type: Option<String>,
}

/// Create payload for a custom field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCustomField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub accepts_multiple_values: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub editable_with_roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referenced_custom_type_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_reference_is_visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_activity_type_id: Option<String>,
}

/// Create payload for a custom activity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewActivityType {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_create_only: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub editable_with_roles: Vec<String>,
}

/// Create payload for a status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewStatus {
    pub label: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub status_type: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}
