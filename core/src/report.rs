//! Change report: per-category, per-item outcomes of a sync run and a plain
//! text rendering of them.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::category::Category;
use crate::identity::IdentityKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Delete,
}

/// What happened to one planned change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemResult {
    /// Planned but not applied (dry run).
    Pending,
    Created { id: String },
    Deleted { id: String },
    /// Not attempted, e.g. deletion disabled or an unresolvable reference.
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub identity: IdentityKey,
    pub action: Action,
    /// Id of the record acted upon, in the environment it was read from:
    /// the source for creates, the target for deletes.
    pub origin_id: String,
    #[serde(flatten)]
    pub result: ItemResult,
}

/// Stage at which a category was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetching,
    Diffing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CategoryStatus {
    Planned,
    Applied,
    Failed { stage: Stage, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryReport {
    pub category: Category,
    pub status: CategoryStatus,
    /// Identities present on both sides, left as they are.
    pub unchanged: Vec<IdentityKey>,
    pub items: Vec<ItemOutcome>,
}

impl CategoryReport {
    pub fn failed(category: Category, stage: Stage, error: String) -> Self {
        Self {
            category,
            status: CategoryStatus::Failed { stage, error },
            unchanged: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, CategoryStatus::Failed { .. })
    }

    fn matching<'a>(
        &'a self,
        keep: impl Fn(&ItemResult) -> bool + 'a,
    ) -> impl Iterator<Item = &'a ItemOutcome> + 'a {
        self.items.iter().filter(move |item| keep(&item.result))
    }

    pub fn created(&self) -> impl Iterator<Item = &ItemOutcome> + '_ {
        self.matching(|r| matches!(r, ItemResult::Created { .. }))
    }

    pub fn deleted(&self) -> impl Iterator<Item = &ItemOutcome> + '_ {
        self.matching(|r| matches!(r, ItemResult::Deleted { .. }))
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ItemOutcome> + '_ {
        self.matching(|r| matches!(r, ItemResult::Skipped { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> + '_ {
        self.matching(|r| matches!(r, ItemResult::Failed { .. }))
    }

    pub fn pending(&self) -> impl Iterator<Item = &ItemOutcome> + '_ {
        self.matching(|r| matches!(r, ItemResult::Pending))
    }
}

/// Aggregate outcome of one sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeReport {
    pub source: String,
    pub target: String,
    pub dry_run: bool,
    pub generated_at: DateTime<Utc>,
    pub categories: Vec<CategoryReport>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub unchanged: usize,
    pub created: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub pending: usize,
    pub failed_categories: usize,
}

impl ChangeReport {
    pub fn category(&self, category: Category) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.category == category)
    }

    pub fn totals(&self) -> Totals {
        self.categories
            .iter()
            .fold(Totals::default(), |mut totals, category| {
                totals.unchanged += category.unchanged.len();
                totals.created += category.created().count();
                totals.deleted += category.deleted().count();
                totals.skipped += category.skipped().count();
                totals.failed += category.failures().count();
                totals.pending += category.pending().count();
                totals.failed_categories += usize::from(category.is_failed());
                totals
            })
    }

    /// True when any category or any item failed.
    pub fn has_failures(&self) -> bool {
        let totals = self.totals();
        totals.failed > 0 || totals.failed_categories > 0
    }
}

const RULE: &str = "==================================================";

/// Render a human-readable summary of `report`.
pub fn render(report: &ChangeReport) -> String {
    let mut out = String::new();
    let verb = if report.dry_run { "PLAN" } else { "RESULTS" };
    for category in &report.categories {
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(
            out,
            "{} {verb} ({} -> {})",
            category.category.title().to_uppercase(),
            report.source,
            report.target
        );
        let _ = writeln!(out, "{RULE}");

        if let CategoryStatus::Failed { stage, error } = &category.status {
            let stage = match stage {
                Stage::Fetching => "fetching",
                Stage::Diffing => "diffing",
            };
            let _ = writeln!(out, "FAILED while {stage}: {error}");
            let _ = writeln!(out);
            continue;
        }

        let _ = writeln!(out, "Unchanged: {}", category.unchanged.len());
        for identity in &category.unchanged {
            let _ = writeln!(out, "  - {identity}");
        }
        let pending_creates = category.pending().filter(|i| i.action == Action::Create);
        let pending_deletes = category.pending().filter(|i| i.action == Action::Delete);
        section(&mut out, "To create", pending_creates);
        section(&mut out, "To delete", pending_deletes);
        section(&mut out, "Created", category.created());
        section(&mut out, "Deleted", category.deleted());
        section(&mut out, "Skipped", category.skipped());
        section(&mut out, "Failed", category.failures());
        let _ = writeln!(out);
    }

    let totals = report.totals();
    if report.dry_run {
        let _ = writeln!(
            out,
            "Planned {} change(s); {} unchanged, {} failed categor{}",
            totals.pending,
            totals.unchanged,
            totals.failed_categories,
            if totals.failed_categories == 1 { "y" } else { "ies" }
        );
    } else {
        let _ = writeln!(
            out,
            "Created {}, deleted {}, skipped {}, failed {}; {} unchanged, {} failed categor{}",
            totals.created,
            totals.deleted,
            totals.skipped,
            totals.failed,
            totals.unchanged,
            totals.failed_categories,
            if totals.failed_categories == 1 { "y" } else { "ies" }
        );
    }
    out
}

fn section<'a>(out: &mut String, title: &str, items: impl Iterator<Item = &'a ItemOutcome>) {
    let lines: Vec<String> = items.map(describe).collect();
    if lines.is_empty() {
        return;
    }
    let _ = writeln!(out, "{title}: {}", lines.len());
    for line in lines {
        let _ = writeln!(out, "{line}");
    }
}

fn describe(item: &ItemOutcome) -> String {
    let identity = &item.identity;
    match &item.result {
        ItemResult::Pending => match item.action {
            Action::Create => format!("  - {identity}"),
            Action::Delete => format!("  - {identity} ({})", item.origin_id),
        },
        ItemResult::Created { id } | ItemResult::Deleted { id } => format!("  - {identity}: {id}"),
        ItemResult::Skipped { reason } => format!("  - {identity}: {reason}"),
        ItemResult::Failed { error } => format!("  - {identity}: {error}"),
    }
}
