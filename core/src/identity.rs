//! Natural-key resolution.
//!
//! Server ids differ per environment, so records are matched across
//! environments by the value of their category's identity field. Matching is
//! exact: no case folding, no trimming.
//!
//! Some categories are only unique within a parent record (activity custom
//! fields within their activity type). Their key is qualified by the
//! parent's name, looked up in the same environment through `ScopeNames`.

use std::collections::HashMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::category::Category;
use crate::error::{SyncError, SyncResult};
use crate::record::ConfigRecord;
use crate::snapshot::Snapshot;
use crate::types::ResourceRecord;

/// Environment-independent key of a record within its category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    scope: Option<String>,
    name: String,
}

impl IdentityKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            scope: None,
            name: name.into(),
        }
    }

    /// Key of a record that is only unique within the parent named `scope`.
    pub fn scoped(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{scope} / {}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl Serialize for IdentityKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<&str> for IdentityKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Names of one environment's parent records, by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeNames {
    names: HashMap<String, String>,
}

impl ScopeNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every record of a parent category snapshot.
    pub fn from_snapshot(snapshot: &Snapshot) -> SyncResult<Self> {
        let mut names = Self::new();
        for record in snapshot.ingest()? {
            names.insert(record.id(), record.natural_key());
        }
        Ok(names)
    }

    pub fn insert(&mut self, id: &str, name: &str) {
        self.names.insert(id.to_string(), name.to_string());
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }
}

impl ConfigRecord {
    /// Key of this record in `category`. Scoped categories resolve their
    /// parent through `scope`; a missing or unknown parent is malformed.
    pub fn identity(&self, category: Category, scope: &ScopeNames) -> SyncResult<IdentityKey> {
        let (Some(_), ConfigRecord::CustomField(field)) = (category.identity_scope(), self) else {
            return Ok(IdentityKey::new(self.natural_key()));
        };
        let malformed = |reason: String| SyncError::MalformedRecord {
            category,
            reason: format!("record {}: {reason}", field.id),
        };
        let parent_id = field
            .custom_activity_type_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| malformed("no custom_activity_type_id".to_string()))?;
        let parent = scope
            .get(parent_id)
            .ok_or_else(|| malformed(format!("unknown custom activity type {parent_id}")))?;
        Ok(IdentityKey::scoped(parent, &field.name))
    }
}

/// Resolve the identity of a raw record. Fails with `MalformedRecord` when
/// the record does not carry the category's required fields or its parent
/// cannot be found in `scope`.
pub fn identity(
    category: Category,
    record: &ResourceRecord,
    scope: &ScopeNames,
) -> SyncResult<IdentityKey> {
    ConfigRecord::ingest(category, record)?.identity(category, scope)
}
