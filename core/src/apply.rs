//! Apply engine: realizes a `ChangeSet` in the target environment.
//!
//! # Design
//! Best-effort batch with per-item results. Every planned item is attempted
//! (or explicitly skipped) and gets its own `ItemOutcome`; an API error on
//! one item never stops the rest. Creates run before deletes, each in
//! changeset order.

use tracing::{info, warn};

use crate::diff::{ChangeSet, Keyed};
use crate::record::ReferenceMap;
use crate::report::{Action, ItemOutcome, ItemResult};
use crate::resource::ResourceClient;

/// Switches that restrict what the apply engine may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyPolicy {
    /// Run-wide switch on top of each category's own deletion flag.
    pub allow_deletes: bool,
}

impl Default for ApplyPolicy {
    fn default() -> Self {
        Self {
            allow_deletes: true,
        }
    }
}

/// Seed `refs` with the source-to-target id pairs of matched records.
pub fn record_matches(changes: &ChangeSet, refs: &mut ReferenceMap) {
    for matched in &changes.unchanged {
        refs.record(changes.category, matched.source.id(), matched.target.id());
    }
}

/// Outcomes for a plan that is not going to be applied.
pub fn pending(changes: &ChangeSet) -> Vec<ItemOutcome> {
    let creates = changes
        .to_create
        .iter()
        .map(|entry| outcome(entry, Action::Create, ItemResult::Pending));
    let deletes = changes
        .to_delete
        .iter()
        .map(|entry| outcome(entry, Action::Delete, ItemResult::Pending));
    creates.chain(deletes).collect()
}

/// Apply `changes` to `target`, recording created ids in `refs`.
pub fn apply(
    changes: &ChangeSet,
    target: &dyn ResourceClient,
    refs: &mut ReferenceMap,
    policy: ApplyPolicy,
) -> Vec<ItemOutcome> {
    let category = changes.category;
    let resource = category.resource();
    let mut outcomes = Vec::with_capacity(changes.to_create.len() + changes.to_delete.len());

    for entry in &changes.to_create {
        let (identity, record) = (&entry.identity, &entry.record);
        let result = match record.create_payload(category, refs) {
            Err(e) => {
                warn!(%category, %identity, reason = %e, "skipping create");
                ItemResult::Skipped {
                    reason: e.to_string(),
                }
            }
            Ok(fields) => match target.create(resource, &fields) {
                Ok(created) => match created.id() {
                    Some(id) => {
                        info!(%category, %identity, id, "created");
                        refs.record(category, record.id(), id);
                        ItemResult::Created { id: id.to_string() }
                    }
                    None => {
                        warn!(%category, %identity, "create response carried no id");
                        ItemResult::Failed {
                            error: "create response carried no id".to_string(),
                        }
                    }
                },
                Err(e) => {
                    warn!(%category, %identity, error = %e, transient = e.is_transient(), "create failed");
                    ItemResult::Failed {
                        error: e.to_string(),
                    }
                }
            },
        };
        outcomes.push(outcome(entry, Action::Create, result));
    }

    for entry in &changes.to_delete {
        let (identity, record) = (&entry.identity, &entry.record);
        let result = if !category.allows_deletion() {
            ItemResult::Skipped {
                reason: format!("deletion not permitted for {category}"),
            }
        } else if !policy.allow_deletes {
            ItemResult::Skipped {
                reason: "deletion disabled for this run".to_string(),
            }
        } else {
            match target.delete(resource, record.id()) {
                Ok(()) => {
                    info!(%category, %identity, id = record.id(), "deleted");
                    ItemResult::Deleted {
                        id: record.id().to_string(),
                    }
                }
                Err(e) => {
                    warn!(%category, %identity, error = %e, transient = e.is_transient(), "delete failed");
                    ItemResult::Failed {
                        error: e.to_string(),
                    }
                }
            }
        };
        outcomes.push(outcome(entry, Action::Delete, result));
    }

    outcomes
}

fn outcome(entry: &Keyed, action: Action, result: ItemResult) -> ItemOutcome {
    ItemOutcome {
        identity: entry.identity.clone(),
        action,
        origin_id: entry.record.id().to_string(),
        result,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;

    use serde_json::{json, Map, Value};

    use super::*;
    use crate::category::Category;
    use crate::diff::{diff, diff_scoped};
    use crate::error::ApiError;
    use crate::identity::ScopeNames;
    use crate::snapshot::Snapshot;
    use crate::types::ResourceRecord;

    /// Records calls and fails the ones named in `fail`.
    #[derive(Default)]
    struct FakeTarget {
        fail: HashSet<String>,
        created: RefCell<Vec<Map<String, Value>>>,
        deleted: RefCell<Vec<String>>,
    }

    impl ResourceClient for FakeTarget {
        fn list(&self, _resource: &str) -> Result<Vec<ResourceRecord>, ApiError> {
            Ok(Vec::new())
        }

        fn create(
            &self,
            _resource: &str,
            fields: &Map<String, Value>,
        ) -> Result<ResourceRecord, ApiError> {
            let key = fields
                .get("label")
                .or_else(|| fields.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if self.fail.contains(&key) {
                return Err(ApiError::Transport("connection reset".to_string()));
            }
            self.created.borrow_mut().push(fields.clone());
            let mut record = fields.clone();
            record.insert("id".to_string(), Value::from(format!("new_{key}")));
            Ok(ResourceRecord::new(record))
        }

        fn delete(&self, _resource: &str, id: &str) -> Result<(), ApiError> {
            if self.fail.contains(id) {
                return Err(ApiError::NotFound);
            }
            self.deleted.borrow_mut().push(id.to_string());
            Ok(())
        }
    }

    fn snapshot(env: &str, category: Category, records: Vec<Value>) -> Snapshot {
        let records = records
            .into_iter()
            .map(|r| serde_json::from_value(r).unwrap())
            .collect();
        Snapshot::capture(env, category, records)
    }

    fn statuses(env: &str, labels: &[&str]) -> Snapshot {
        snapshot(
            env,
            Category::LeadStatus,
            labels
                .iter()
                .map(|l| json!({"id": format!("{env}_{l}"), "label": l}))
                .collect(),
        )
    }

    #[test]
    fn one_failed_create_does_not_stop_the_batch() {
        let changes = diff(&statuses("prod", &["A", "B", "C", "D", "E"]), &statuses("dev", &[])).unwrap();
        let target = FakeTarget {
            fail: HashSet::from(["C".to_string()]),
            ..Default::default()
        };
        let outcomes = apply(&changes, &target, &mut ReferenceMap::new(), ApplyPolicy::default());

        assert_eq!(outcomes.len(), 5);
        let failed: Vec<_> = outcomes
            .iter()
            .filter(|o| matches!(o.result, ItemResult::Failed { .. }))
            .map(|o| o.identity.to_string())
            .collect();
        assert_eq!(failed, vec!["C"]);
        let created = outcomes
            .iter()
            .filter(|o| matches!(o.result, ItemResult::Created { .. }))
            .count();
        assert_eq!(created, 4);
        assert_eq!(target.created.borrow().len(), 4);
    }

    #[test]
    fn deletes_use_target_ids_when_permitted() {
        let changes = diff(&statuses("prod", &["Won"]), &statuses("dev", &["Won", "Archived"])).unwrap();
        let target = FakeTarget::default();
        let outcomes = apply(&changes, &target, &mut ReferenceMap::new(), ApplyPolicy::default());

        assert_eq!(*target.deleted.borrow(), vec!["dev_Archived".to_string()]);
        assert_eq!(
            outcomes[0].result,
            ItemResult::Deleted {
                id: "dev_Archived".to_string()
            }
        );
    }

    #[test]
    fn failed_delete_is_recorded() {
        let changes = diff(&statuses("prod", &[]), &statuses("dev", &["Gone", "Old"])).unwrap();
        let target = FakeTarget {
            fail: HashSet::from(["dev_Gone".to_string()]),
            ..Default::default()
        };
        let outcomes = apply(&changes, &target, &mut ReferenceMap::new(), ApplyPolicy::default());
        assert!(matches!(outcomes[0].result, ItemResult::Failed { .. }));
        assert!(matches!(outcomes[1].result, ItemResult::Deleted { .. }));
    }

    #[test]
    fn run_wide_switch_blocks_deletes() {
        let changes = diff(&statuses("prod", &[]), &statuses("dev", &["Archived"])).unwrap();
        let target = FakeTarget::default();
        let outcomes = apply(
            &changes,
            &target,
            &mut ReferenceMap::new(),
            ApplyPolicy {
                allow_deletes: false,
            },
        );
        assert!(target.deleted.borrow().is_empty());
        assert!(matches!(outcomes[0].result, ItemResult::Skipped { .. }));
    }

    #[test]
    fn non_deletable_category_is_never_deleted() {
        let source = snapshot("prod", Category::LeadCustomField, Vec::new());
        let target_snapshot = snapshot(
            "dev",
            Category::LeadCustomField,
            vec![json!({"id":"cf_1","name":"Legacy","type":"text"})],
        );
        let changes = diff(&source, &target_snapshot).unwrap();
        let target = FakeTarget::default();
        let outcomes = apply(&changes, &target, &mut ReferenceMap::new(), ApplyPolicy::default());
        assert!(target.deleted.borrow().is_empty());
        assert_eq!(
            outcomes[0].result,
            ItemResult::Skipped {
                reason: "deletion not permitted for lead-custom-field".to_string()
            }
        );
    }

    #[test]
    fn created_activity_types_feed_activity_fields() {
        let mut refs = ReferenceMap::new();
        let target = FakeTarget::default();

        let types = diff(
            &snapshot(
                "prod",
                Category::CustomActivityType,
                vec![json!({"id":"actitype_prod","name":"Demo"})],
            ),
            &snapshot("dev", Category::CustomActivityType, Vec::new()),
        )
        .unwrap();
        record_matches(&types, &mut refs);
        apply(&types, &target, &mut refs, ApplyPolicy::default());
        assert_eq!(
            refs.resolve(Category::CustomActivityType, "actitype_prod"),
            Some("new_Demo")
        );

        let source_types = ScopeNames::from_snapshot(&snapshot(
            "prod",
            Category::CustomActivityType,
            vec![json!({"id":"actitype_prod","name":"Demo"}), json!({"id":"actitype_gone","name":"Retired"})],
        ))
        .unwrap();
        let fields = diff_scoped(
            &snapshot(
                "prod",
                Category::ActivityCustomField,
                vec![
                    json!({"id":"cf_1","name":"Outcome","type":"text","custom_activity_type_id":"actitype_prod"}),
                    json!({"id":"cf_2","name":"Orphan","type":"text","custom_activity_type_id":"actitype_gone"}),
                ],
            ),
            &source_types,
            &snapshot("dev", Category::ActivityCustomField, Vec::new()),
            &ScopeNames::new(),
        )
        .unwrap();
        let outcomes = apply(&fields, &target, &mut refs, ApplyPolicy::default());

        assert!(matches!(outcomes[0].result, ItemResult::Created { .. }));
        // The second type was never created in the target, so its field has
        // no id to point at.
        assert!(matches!(outcomes[1].result, ItemResult::Skipped { .. }));
        assert_eq!(outcomes[0].identity.to_string(), "Demo / Outcome");
        let sent = target.created.borrow();
        assert_eq!(sent.last().unwrap()["custom_activity_type_id"], json!("new_Demo"));
    }

    #[test]
    fn matched_records_seed_reference_map() {
        let changes = diff(
            &snapshot(
                "prod",
                Category::CustomActivityType,
                vec![json!({"id":"actitype_prod","name":"Demo"})],
            ),
            &snapshot(
                "dev",
                Category::CustomActivityType,
                vec![json!({"id":"actitype_dev","name":"Demo"})],
            ),
        )
        .unwrap();
        let mut refs = ReferenceMap::new();
        record_matches(&changes, &mut refs);
        assert_eq!(
            refs.resolve(Category::CustomActivityType, "actitype_prod"),
            Some("actitype_dev")
        );
    }

    #[test]
    fn pending_lists_creates_then_deletes() {
        let changes = diff(&statuses("prod", &["New"]), &statuses("dev", &["Old"])).unwrap();
        let outcomes = pending(&changes);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].action, Action::Create);
        assert_eq!(outcomes[0].origin_id, "prod_New");
        assert_eq!(outcomes[1].action, Action::Delete);
        assert_eq!(outcomes[1].origin_id, "dev_Old");
        assert!(outcomes.iter().all(|o| o.result == ItemResult::Pending));
    }
}
