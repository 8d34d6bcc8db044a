//! Catalogue of synchronized configuration categories.
//!
//! # Design
//! Each `Category` knows its REST collection, which field carries its
//! natural identity, whether deletion in the target is allowed and which
//! other categories it references. `SYNC_ORDER` is the declared dependency
//! order; the orchestrator never reorders it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A kind of configuration object copied between environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    LeadCustomField,
    ContactCustomField,
    OpportunityCustomField,
    SharedCustomField,
    CustomActivityType,
    ActivityCustomField,
    LeadStatus,
    OpportunityStatus,
}

/// Shape of the records a category holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    CustomField,
    ActivityType,
    Status,
}

/// Declared processing order. Every category appears after the categories it
/// depends on.
pub const SYNC_ORDER: [Category; 8] = [
    Category::LeadCustomField,
    Category::ContactCustomField,
    Category::OpportunityCustomField,
    Category::SharedCustomField,
    Category::CustomActivityType,
    Category::ActivityCustomField,
    Category::LeadStatus,
    Category::OpportunityStatus,
];

impl Category {
    pub fn all() -> &'static [Category] {
        &SYNC_ORDER
    }

    /// Stable kebab-case name used on the command line and in archive paths.
    pub fn slug(&self) -> &'static str {
        match self {
            Category::LeadCustomField => "lead-custom-field",
            Category::ContactCustomField => "contact-custom-field",
            Category::OpportunityCustomField => "opportunity-custom-field",
            Category::SharedCustomField => "shared-custom-field",
            Category::CustomActivityType => "custom-activity-type",
            Category::ActivityCustomField => "activity-custom-field",
            Category::LeadStatus => "lead-status",
            Category::OpportunityStatus => "opportunity-status",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Category::LeadCustomField => "Lead Custom Fields",
            Category::ContactCustomField => "Contact Custom Fields",
            Category::OpportunityCustomField => "Opportunity Custom Fields",
            Category::SharedCustomField => "Shared Custom Fields",
            Category::CustomActivityType => "Custom Activity Types",
            Category::ActivityCustomField => "Activity Custom Fields",
            Category::LeadStatus => "Lead Statuses",
            Category::OpportunityStatus => "Opportunity Statuses",
        }
    }

    /// Collection path relative to the API base URL, with trailing slash.
    pub fn resource(&self) -> &'static str {
        match self {
            Category::LeadCustomField => "custom_field/lead/",
            Category::ContactCustomField => "custom_field/contact/",
            Category::OpportunityCustomField => "custom_field/opportunity/",
            Category::SharedCustomField => "custom_field/shared/",
            Category::CustomActivityType => "custom_activity/",
            Category::ActivityCustomField => "custom_field/activity/",
            Category::LeadStatus => "status/lead/",
            Category::OpportunityStatus => "status/opportunity/",
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Category::LeadCustomField
            | Category::ContactCustomField
            | Category::OpportunityCustomField
            | Category::SharedCustomField
            | Category::ActivityCustomField => RecordKind::CustomField,
            Category::CustomActivityType => RecordKind::ActivityType,
            Category::LeadStatus | Category::OpportunityStatus => RecordKind::Status,
        }
    }

    /// Field holding the environment-independent natural key.
    pub fn identity_field(&self) -> &'static str {
        match self.kind() {
            RecordKind::CustomField | RecordKind::ActivityType => "name",
            RecordKind::Status => "label",
        }
    }

    /// Whether records missing from the source may be deleted in the target.
    ///
    /// Only statuses are confirmed safe to delete; everything else stays
    /// non-deletable until proven otherwise since historical data may
    /// reference it.
    pub fn allows_deletion(&self) -> bool {
        matches!(self, Category::LeadStatus | Category::OpportunityStatus)
    }

    /// Category whose record, referenced by id, qualifies this category's
    /// identity. Activity custom fields are only unique within their
    /// activity type.
    pub fn identity_scope(&self) -> Option<Category> {
        match self {
            Category::ActivityCustomField => Some(Category::CustomActivityType),
            _ => None,
        }
    }

    /// Categories whose target ids this category's records reference.
    pub fn depends_on(&self) -> &'static [Category] {
        match self {
            Category::ActivityCustomField => &[Category::CustomActivityType],
            _ => &[],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown category {0:?}")]
pub struct ParseCategoryError(String);

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        SYNC_ORDER
            .iter()
            .copied()
            .find(|category| category.slug() == wanted)
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

/// Expand `selected` with every transitive dependency and return the result
/// in declared `SYNC_ORDER`. An empty selection means every category.
pub fn dependency_order(selected: &[Category]) -> Vec<Category> {
    if selected.is_empty() {
        return SYNC_ORDER.to_vec();
    }
    let mut wanted: Vec<Category> = selected.to_vec();
    let mut cursor = 0;
    while cursor < wanted.len() {
        for dep in wanted[cursor].depends_on() {
            if !wanted.contains(dep) {
                wanted.push(*dep);
            }
        }
        cursor += 1;
    }
    SYNC_ORDER
        .iter()
        .copied()
        .filter(|category| wanted.contains(category))
        .collect()
}
