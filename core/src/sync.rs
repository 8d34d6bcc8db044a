//! Sync orchestrator.
//!
//! # Design
//! A run moves through `Fetching -> Diffing -> Applying -> Reporting -> Done`.
//! Failures are scoped to a category: a category whose snapshots cannot be
//! fetched, or whose records are malformed or duplicated, is reported as
//! failed and left out of `Applying` while every other category proceeds.
//! Categories are always visited in declared dependency order, and a
//! category whose identity is scoped by another (activity custom fields by
//! their activity type) fails if that other category could not be fetched.
//!
//! The run is split into `plan` and `apply` so a host can show the plan and
//! ask for confirmation before touching the target.

use std::fmt;

use chrono::Utc;
use tracing::{info, warn};

use crate::apply::{self, ApplyPolicy};
use crate::category::{dependency_order, Category, SYNC_ORDER};
use crate::diff::{diff, diff_scoped, ChangeSet};
use crate::error::{SyncError, SyncResult};
use crate::identity::ScopeNames;
use crate::record::ReferenceMap;
use crate::report::{CategoryReport, CategoryStatus, ChangeReport, Stage};
use crate::resource::ResourceClient;
use crate::snapshot::{Snapshot, SnapshotStore};

/// Explicit configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Label of the environment copied from, e.g. `prod`.
    pub source: String,
    /// Label of the environment converged, e.g. `dev`.
    pub target: String,
    /// Categories to sync; dependencies are added automatically. Empty
    /// means all.
    pub categories: Vec<Category>,
    pub policy: ApplyPolicy,
}

impl SyncConfig {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            categories: SYNC_ORDER.to_vec(),
            policy: ApplyPolicy::default(),
        }
    }

    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_policy(mut self, policy: ApplyPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Run-level state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Fetching,
    Diffing,
    Applying,
    Reporting,
    Done,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of `Fetching` and `Diffing` for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedCategory {
    Ready(ChangeSet),
    Failed(CategoryReport),
}

impl PlannedCategory {
    pub fn category(&self) -> Category {
        match self {
            PlannedCategory::Ready(changes) => changes.category,
            PlannedCategory::Failed(report) => report.category,
        }
    }
}

/// Every selected category's changeset (or failure), in dependency order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub source: String,
    pub target: String,
    pub categories: Vec<PlannedCategory>,
}

impl SyncPlan {
    /// True when nothing needs creating or deleting anywhere.
    pub fn is_empty(&self) -> bool {
        self.changesets().all(ChangeSet::is_empty)
    }

    pub fn changesets(&self) -> impl Iterator<Item = &ChangeSet> {
        self.categories.iter().filter_map(|planned| match planned {
            PlannedCategory::Ready(changes) => Some(changes),
            PlannedCategory::Failed(_) => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = Category> + '_ {
        self.categories.iter().filter_map(|planned| match planned {
            PlannedCategory::Failed(report) => Some(report.category),
            PlannedCategory::Ready(_) => None,
        })
    }

    /// Dry-run report: every planned item is `Pending`.
    pub fn to_report(&self) -> ChangeReport {
        let categories = self
            .categories
            .iter()
            .map(|planned| match planned {
                PlannedCategory::Ready(changes) => CategoryReport {
                    category: changes.category,
                    status: CategoryStatus::Planned,
                    unchanged: changes.unchanged_keys(),
                    items: apply::pending(changes),
                },
                PlannedCategory::Failed(report) => report.clone(),
            })
            .collect();
        ChangeReport {
            source: self.source.clone(),
            target: self.target.clone(),
            dry_run: true,
            generated_at: Utc::now(),
            categories,
        }
    }
}

/// Source and target snapshots of one category, or why they are missing.
type Fetched = Result<(Snapshot, Snapshot), CategoryReport>;

/// Diff one category, resolving its identity scope from the snapshots
/// fetched for the scope category in the same run.
fn diff_pair(
    category: Category,
    source: &Snapshot,
    target: &Snapshot,
    fetched: &[(Category, Fetched)],
) -> SyncResult<ChangeSet> {
    let Some(dependency) = category.identity_scope() else {
        return diff(source, target);
    };
    let (source_scope, target_scope) = fetched
        .iter()
        .find(|(fetched_category, _)| *fetched_category == dependency)
        .and_then(|(_, pair)| pair.as_ref().ok())
        .ok_or(SyncError::DependencyUnavailable {
            category,
            dependency,
        })?;
    diff_scoped(
        source,
        &ScopeNames::from_snapshot(source_scope)?,
        target,
        &ScopeNames::from_snapshot(target_scope)?,
    )
}

/// Drives one sync run between two already-authenticated clients.
pub struct Orchestrator<'a> {
    config: SyncConfig,
    source: &'a dyn ResourceClient,
    target: &'a dyn ResourceClient,
    store: &'a dyn SnapshotStore,
    state: SyncState,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: SyncConfig,
        source: &'a dyn ResourceClient,
        target: &'a dyn ResourceClient,
        store: &'a dyn SnapshotStore,
    ) -> Self {
        Self {
            config,
            source,
            target,
            store,
            state: SyncState::Idle,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Fetch, archive and diff every selected category.
    pub fn plan(&mut self) -> SyncPlan {
        let order = dependency_order(&self.config.categories);

        self.transition(SyncState::Fetching);
        let fetched: Vec<_> = order
            .iter()
            .map(|&category| (category, self.fetch_pair(category)))
            .collect();

        self.transition(SyncState::Diffing);
        let categories = fetched
            .iter()
            .map(|&(category, ref pair)| match pair {
                Err(report) => PlannedCategory::Failed(report.clone()),
                Ok((source, target)) => match diff_pair(category, source, target, &fetched) {
                    Ok(changes) => {
                        info!(
                            %category,
                            create = changes.to_create.len(),
                            delete = changes.to_delete.len(),
                            unchanged = changes.unchanged.len(),
                            "diffed"
                        );
                        PlannedCategory::Ready(changes)
                    }
                    Err(e) => {
                        warn!(%category, error = %e, "category failed while diffing");
                        PlannedCategory::Failed(CategoryReport::failed(
                            category,
                            Stage::Diffing,
                            e.to_string(),
                        ))
                    }
                },
            })
            .collect();

        SyncPlan {
            source: self.config.source.clone(),
            target: self.config.target.clone(),
            categories,
        }
    }

    /// Realize `plan` in the target and build the change report.
    pub fn apply(&mut self, plan: SyncPlan) -> ChangeReport {
        self.transition(SyncState::Applying);
        let mut refs = ReferenceMap::new();
        let categories = plan
            .categories
            .into_iter()
            .map(|planned| match planned {
                PlannedCategory::Failed(report) => report,
                PlannedCategory::Ready(changes) => {
                    apply::record_matches(&changes, &mut refs);
                    let items = apply::apply(&changes, self.target, &mut refs, self.config.policy);
                    CategoryReport {
                        category: changes.category,
                        status: CategoryStatus::Applied,
                        unchanged: changes.unchanged_keys(),
                        items,
                    }
                }
            })
            .collect();

        self.transition(SyncState::Reporting);
        let report = ChangeReport {
            source: plan.source,
            target: plan.target,
            dry_run: false,
            generated_at: Utc::now(),
            categories,
        };
        self.transition(SyncState::Done);
        report
    }

    /// Plan without applying.
    pub fn dry_run(&mut self) -> ChangeReport {
        let plan = self.plan();
        self.transition(SyncState::Reporting);
        let report = plan.to_report();
        self.transition(SyncState::Done);
        report
    }

    /// Plan and apply in one go.
    pub fn run(&mut self) -> ChangeReport {
        let plan = self.plan();
        self.apply(plan)
    }

    fn transition(&mut self, next: SyncState) {
        info!(from = %self.state, to = %next, "sync state");
        self.state = next;
    }

    fn fetch_pair(&self, category: Category) -> Fetched {
        let source = self.fetch(self.source, &self.config.source, category)?;
        let target = self.fetch(self.target, &self.config.target, category)?;
        Ok((source, target))
    }

    fn fetch(
        &self,
        client: &dyn ResourceClient,
        environment: &str,
        category: Category,
    ) -> Result<Snapshot, CategoryReport> {
        let records = client.list(category.resource()).map_err(|source| {
            let e = SyncError::Api {
                environment: environment.to_string(),
                source,
            };
            warn!(%category, error = %e, "category failed while fetching");
            CategoryReport::failed(category, Stage::Fetching, e.to_string())
        })?;
        info!(%category, environment, records = records.len(), "fetched");

        let snapshot = Snapshot::capture(environment, category, records);
        if let Err(e) = self.store.save(&snapshot) {
            warn!(%category, environment, error = %e, "could not archive snapshot");
        }
        Ok(snapshot)
    }
}
