//! Configuration sync between two environments of a CRM.
//!
//! # Overview
//! Copies custom fields, custom activity types and statuses from a source
//! environment (typically production) to a target environment (typically
//! development). For each category the two sides are fetched and archived,
//! matched by a natural identity key, and the target is converged with
//! best-effort creates and deletes.
//!
//! # Design
//! - `CloseClient` builds `HttpRequest`s and parses `HttpResponse`s without
//!   touching the network; the host supplies a `Transport`.
//! - The engine sees only the `ResourceClient` and `SnapshotStore` seams.
//! - Errors are scoped per category or per item; a run always ends with a
//!   `ChangeReport`.

pub mod apply;
pub mod category;
pub mod client;
pub mod diff;
pub mod error;
pub mod http;
pub mod identity;
pub mod record;
pub mod report;
pub mod resource;
pub mod snapshot;
pub mod sync;
pub mod types;

pub use apply::ApplyPolicy;
pub use category::{dependency_order, Category, ParseCategoryError, SYNC_ORDER};
pub use client::{CloseClient, DEFAULT_BASE_URL};
pub use diff::{diff, diff_scoped, ChangeSet};
pub use error::{ApiError, SyncError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use identity::{identity, IdentityKey, ScopeNames};
pub use record::{ConfigRecord, ReferenceMap};
pub use report::{render, ChangeReport, ItemResult};
pub use resource::{HttpResourceClient, ResourceClient};
pub use snapshot::{run_id, FsSnapshotStore, MemorySnapshotStore, Snapshot, SnapshotStore};
pub use sync::{Orchestrator, PlannedCategory, SyncConfig, SyncPlan, SyncState};
pub use types::ResourceRecord;
