use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const API_PREFIX: &str = "/api/v1";

const DEFAULT_LIMIT: usize = 100;
const CUSTOM_FIELD_KINDS: [&str; 5] = ["lead", "contact", "opportunity", "activity", "shared"];
const STATUS_KINDS: [&str; 2] = ["lead", "opportunity"];
const ACTIVITY_TYPES: &str = "custom_activity";

/// In-memory collections keyed by path without prefix or trailing slash,
/// e.g. `custom_field/lead` or `status/opportunity`.
#[derive(Debug, Default)]
pub struct Store {
    collections: HashMap<String, Vec<Map<String, Value>>>,
    rejected: HashSet<String>,
}

impl Store {
    /// Replace a collection. Records without an `id` get one.
    pub fn seed(&mut self, collection: &str, records: Vec<Value>) {
        let prefix = id_prefix(collection);
        let records = records
            .into_iter()
            .filter_map(|value| match value {
                Value::Object(mut record) => {
                    record
                        .entry("id")
                        .or_insert_with(|| Value::from(new_id(prefix)));
                    Some(record)
                }
                _ => None,
            })
            .collect();
        self.collections.insert(collection.to_string(), records);
    }

    pub fn records(&self, collection: &str) -> Vec<Value> {
        self.collections
            .get(collection)
            .map(|records| records.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    /// Values of `field` across a collection, in stored order.
    pub fn names(&self, collection: &str, field: &str) -> Vec<String> {
        self.collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter_map(|r| r.get(field).and_then(Value::as_str).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Make every create carrying this name or label fail with 500.
    pub fn reject_creates_named(&mut self, name: &str) {
        self.rejected.insert(name.to_string());
    }
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "_skip")]
    pub skip: Option<usize>,
    #[serde(rename = "_limit")]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub data: Vec<Value>,
    pub has_more: bool,
}

pub fn app() -> Router {
    app_with(Db::default())
}

pub fn app_with(db: Db) -> Router {
    Router::new()
        .route(
            &api_path("custom_field/{kind}/"),
            get(list_custom_fields).post(create_custom_field),
        )
        .route(&api_path("custom_field/{kind}/{id}/"), delete(delete_custom_field))
        .route(
            &api_path("custom_activity/"),
            get(list_activity_types).post(create_activity_type),
        )
        .route(&api_path("custom_activity/{id}/"), delete(delete_activity_type))
        .route(&api_path("status/{kind}/"), get(list_statuses).post(create_status))
        .route(&api_path("status/{kind}/{id}/"), delete(delete_status))
        .with_state(db)
}

/// Route path of a collection under `API_PREFIX`.
pub fn api_path(path: &str) -> String {
    format!("{API_PREFIX}/{path}")
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, Db::default()).await
}

pub async fn run_with(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(db)).await
}

// --- handlers ---

async fn list_custom_fields(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(kind): Path<String>,
    Query(query): Query<ListQuery>,
) -> Response {
    let collection = custom_field_collection(&kind);
    guarded(&headers, collection, |c| list(&db, c, query)).await
}

async fn create_custom_field(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(kind): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let collection = custom_field_collection(&kind);
    guarded(&headers, collection, |c| create(&db, c, body)).await
}

async fn delete_custom_field(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, String)>,
) -> Response {
    let collection = custom_field_collection(&kind);
    guarded(&headers, collection, |c| remove(&db, c, id)).await
}

async fn list_activity_types(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    guarded(&headers, Some(ACTIVITY_TYPES.to_string()), |c| list(&db, c, query)).await
}

async fn create_activity_type(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    guarded(&headers, Some(ACTIVITY_TYPES.to_string()), |c| create(&db, c, body)).await
}

async fn delete_activity_type(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    guarded(&headers, Some(ACTIVITY_TYPES.to_string()), |c| remove(&db, c, id)).await
}

async fn list_statuses(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(kind): Path<String>,
    Query(query): Query<ListQuery>,
) -> Response {
    let collection = status_collection(&kind);
    guarded(&headers, collection, |c| list(&db, c, query)).await
}

async fn create_status(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(kind): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let collection = status_collection(&kind);
    guarded(&headers, collection, |c| create(&db, c, body)).await
}

async fn delete_status(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, String)>,
) -> Response {
    let collection = status_collection(&kind);
    guarded(&headers, collection, |c| remove(&db, c, id)).await
}

// --- collection operations ---

/// Reject unauthenticated requests and unknown collections before running
/// `op`.
async fn guarded<F, Fut>(headers: &HeaderMap, collection: Option<String>, op: F) -> Response
where
    F: FnOnce(String) -> Fut,
    Fut: std::future::Future<Output = Response>,
{
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "));
    if !authorized {
        return error(StatusCode::UNAUTHORIZED, "missing API key");
    }
    match collection {
        Some(collection) => op(collection).await,
        None => error(StatusCode::NOT_FOUND, "unknown collection"),
    }
}

async fn list(db: &Db, collection: String, query: ListQuery) -> Response {
    let store = db.read().await;
    let records = store
        .collections
        .get(&collection)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let skip = query.skip.unwrap_or(0).min(records.len());
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let end = skip.saturating_add(limit).min(records.len());
    let page = ListResponse {
        data: records[skip..end].iter().cloned().map(Value::Object).collect(),
        has_more: end < records.len(),
    };
    (StatusCode::OK, Json(page)).into_response()
}

async fn create(db: &Db, collection: String, body: Value) -> Response {
    let Value::Object(mut record) = body else {
        return error(StatusCode::BAD_REQUEST, "expected a JSON object");
    };
    let key_field = identity_field(&collection);
    let Some(key) = record
        .get(key_field)
        .and_then(Value::as_str)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
    else {
        return error(StatusCode::BAD_REQUEST, &format!("{key_field} is required"));
    };
    if collection.starts_with("custom_field/") && !record.contains_key("type") {
        return error(StatusCode::BAD_REQUEST, "type is required");
    }

    let mut store = db.write().await;
    if store.rejected.contains(&key) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "simulated failure");
    }
    if collection == "custom_field/activity" {
        let type_id = record.get("custom_activity_type_id").and_then(Value::as_str);
        let known = type_id.is_some_and(|id| {
            store
                .collections
                .get(ACTIVITY_TYPES)
                .is_some_and(|types| types.iter().any(|t| t.get("id").and_then(Value::as_str) == Some(id)))
        });
        if !known {
            return error(StatusCode::BAD_REQUEST, "unknown custom_activity_type_id");
        }
    }
    // Activity fields are unique per activity type, everything else per
    // collection.
    let scope = scope_field(&collection);
    let records = store.collections.entry(collection.clone()).or_default();
    if records.iter().any(|r| {
        r.get(key_field).and_then(Value::as_str) == Some(key.as_str())
            && scope.is_none_or(|field| r.get(field) == record.get(field))
    }) {
        return error(StatusCode::BAD_REQUEST, &format!("{key_field} already exists"));
    }
    record.insert("id".to_string(), Value::from(new_id(id_prefix(&collection))));
    records.push(record.clone());
    (StatusCode::OK, Json(Value::Object(record))).into_response()
}

async fn remove(db: &Db, collection: String, id: String) -> Response {
    let mut store = db.write().await;
    let Some(records) = store.collections.get_mut(&collection) else {
        return error(StatusCode::NOT_FOUND, "not found");
    };
    let before = records.len();
    records.retain(|r| r.get("id").and_then(Value::as_str) != Some(id.as_str()));
    if records.len() == before {
        return error(StatusCode::NOT_FOUND, "not found");
    }
    (StatusCode::OK, Json(json!({}))).into_response()
}

// --- helpers ---

fn custom_field_collection(kind: &str) -> Option<String> {
    CUSTOM_FIELD_KINDS
        .contains(&kind)
        .then(|| format!("custom_field/{kind}"))
}

fn status_collection(kind: &str) -> Option<String> {
    STATUS_KINDS.contains(&kind).then(|| format!("status/{kind}"))
}

fn identity_field(collection: &str) -> &'static str {
    if collection.starts_with("status/") {
        "label"
    } else {
        "name"
    }
}

fn scope_field(collection: &str) -> Option<&'static str> {
    (collection == "custom_field/activity").then_some("custom_activity_type_id")
}

fn id_prefix(collection: &str) -> &'static str {
    if collection.starts_with("status/") {
        "stat_"
    } else if collection == ACTIVITY_TYPES {
        "actitype_"
    } else {
        "cf_"
    }
}

fn new_id(prefix: &str) -> String {
    format!("{prefix}{}", Uuid::new_v4().simple())
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
