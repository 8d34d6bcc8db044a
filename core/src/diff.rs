//! Diff engine: partitions two snapshots of one category into records to
//! create, records to delete and records present on both sides.
//!
//! # Design
//! Identities are indexed per side and duplicates halt the category instead
//! of being deduped. Output order follows snapshot order (source order for
//! creates and matches, target order for deletes) so reports are stable
//! across runs. Scoped categories resolve parent names on each side from
//! that side's own `ScopeNames`.

use std::collections::HashMap;

use crate::category::Category;
use crate::error::{SyncError, SyncResult};
use crate::identity::{IdentityKey, ScopeNames};
use crate::record::ConfigRecord;
use crate::snapshot::Snapshot;

/// A record with its resolved identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyed {
    pub identity: IdentityKey,
    pub record: ConfigRecord,
}

/// A record present in both environments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matched {
    pub identity: IdentityKey,
    pub source: ConfigRecord,
    pub target: ConfigRecord,
}

/// Create/delete difference between a source and a target snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub category: Category,
    /// Source records whose identity is absent from the target.
    pub to_create: Vec<Keyed>,
    /// Target records whose identity is absent from the source.
    pub to_delete: Vec<Keyed>,
    pub unchanged: Vec<Matched>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }

    pub fn create_keys(&self) -> Vec<IdentityKey> {
        self.to_create.iter().map(|k| k.identity.clone()).collect()
    }

    pub fn delete_keys(&self) -> Vec<IdentityKey> {
        self.to_delete.iter().map(|k| k.identity.clone()).collect()
    }

    pub fn unchanged_keys(&self) -> Vec<IdentityKey> {
        self.unchanged.iter().map(|m| m.identity.clone()).collect()
    }
}

/// Compute the `ChangeSet` turning `target` into `source` for a category
/// whose identity needs no scope.
pub fn diff(source: &Snapshot, target: &Snapshot) -> SyncResult<ChangeSet> {
    let none = ScopeNames::new();
    diff_scoped(source, &none, target, &none)
}

/// Compute the `ChangeSet` turning `target` into `source`, resolving scoped
/// identities through each side's parent names.
pub fn diff_scoped(
    source: &Snapshot,
    source_scope: &ScopeNames,
    target: &Snapshot,
    target_scope: &ScopeNames,
) -> SyncResult<ChangeSet> {
    let category = source.category();
    debug_assert_eq!(category, target.category());

    let source_records = keyed(category, source, source_scope)?;
    let target_records = keyed(category, target, target_scope)?;
    let source_index = index(category, source.environment(), &source_records)?;
    let target_index = index(category, target.environment(), &target_records)?;

    let mut to_create = Vec::new();
    let mut unchanged = Vec::new();
    for entry in &source_records {
        match target_index.get(&entry.identity) {
            Some(&position) => unchanged.push(Matched {
                identity: entry.identity.clone(),
                source: entry.record.clone(),
                target: target_records[position].record.clone(),
            }),
            None => to_create.push(entry.clone()),
        }
    }

    let to_delete = target_records
        .iter()
        .filter(|entry| !source_index.contains_key(&entry.identity))
        .cloned()
        .collect();

    Ok(ChangeSet {
        category,
        to_create,
        to_delete,
        unchanged,
    })
}

fn keyed(category: Category, snapshot: &Snapshot, scope: &ScopeNames) -> SyncResult<Vec<Keyed>> {
    snapshot
        .ingest()?
        .into_iter()
        .map(|record| -> SyncResult<Keyed> {
            Ok(Keyed {
                identity: record.identity(category, scope)?,
                record,
            })
        })
        .collect()
}

/// Map identity to position, refusing duplicates.
fn index(
    category: Category,
    environment: &str,
    records: &[Keyed],
) -> SyncResult<HashMap<IdentityKey, usize>> {
    let mut index = HashMap::with_capacity(records.len());
    for (position, entry) in records.iter().enumerate() {
        if index.contains_key(&entry.identity) {
            return Err(SyncError::DuplicateIdentity {
                category,
                environment: environment.to_string(),
                key: entry.identity.to_string(),
            });
        }
        index.insert(entry.identity.clone(), position);
    }
    Ok(index)
}
