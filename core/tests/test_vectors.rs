//! Verify build/parse methods against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector file describes inputs, expected requests, simulated responses,
//! and expected parse results (or errors). Comparing parsed JSON (not raw
//! strings) avoids false negatives from field-ordering differences.

use crmsync_core::{ApiError, CloseClient, HttpMethod, HttpRequest, HttpResponse, ResourceRecord};
use serde_json::{Map, Value};

const BASE_URL: &str = "http://localhost:3000/api/v1";

fn client() -> CloseClient {
    CloseClient::new(BASE_URL, "api_key")
}

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn check_request(name: &str, req: &HttpRequest, expected: &Value) {
    assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
    assert_eq!(req.path, format!("{BASE_URL}{}", expected["path"].as_str().unwrap()), "{name}: path");

    let expected_headers: Vec<(String, String)> = expected["headers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| {
            let arr = h.as_array().unwrap();
            (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
        })
        .collect();
    assert_eq!(req.headers, expected_headers, "{name}: headers");

    match expected.get("body") {
        Some(body) => {
            let req_body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
            assert_eq!(&req_body, body, "{name}: body");
        }
        None => assert!(req.body.is_none(), "{name}: body should be None"),
    }
}

fn simulated(case: &Value) -> HttpResponse {
    let sim = &case["simulated_response"];
    HttpResponse {
        status: sim["status"].as_u64().unwrap() as u16,
        headers: Vec::new(),
        body: sim["body"].as_str().unwrap().to_string(),
    }
}

/// Either `"NotFound"` or `{"Http": status}`.
fn check_error(name: &str, err: ApiError, expected: &Value) {
    match expected {
        Value::String(s) if s == "NotFound" => {
            assert!(matches!(err, ApiError::NotFound), "{name}: expected NotFound, got {err:?}")
        }
        Value::Object(o) if o.contains_key("Http") => {
            let want = o["Http"].as_u64().unwrap() as u16;
            match err {
                ApiError::Http { status, .. } => assert_eq!(status, want, "{name}: status"),
                other => panic!("{name}: expected Http error, got {other:?}"),
            }
        }
        other => panic!("{name}: unknown expected_error: {other}"),
    }
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

#[test]
fn list_test_vectors() {
    let raw = include_str!("../../test-vectors/list.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let resource = case["input_resource"].as_str().unwrap();
        let skip = case["input_skip"].as_u64().unwrap() as usize;

        let req = c.build_list(resource, skip);
        check_request(name, &req, &case["expected_request"]);

        let result = c.parse_list(simulated(case));
        if let Some(expected_error) = case.get("expected_error") {
            check_error(name, result.unwrap_err(), expected_error);
        } else {
            let page = result.unwrap();
            let expected = &case["expected_result"];
            let records: Vec<ResourceRecord> =
                serde_json::from_value(expected["data"].clone()).unwrap();
            assert_eq!(page.data, records, "{name}: records");
            assert_eq!(page.has_more, expected["has_more"].as_bool().unwrap(), "{name}: has_more");
        }
    }
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[test]
fn create_test_vectors() {
    let raw = include_str!("../../test-vectors/create.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let resource = case["input_resource"].as_str().unwrap();
        let input: Map<String, Value> = serde_json::from_value(case["input"].clone()).unwrap();

        let req = c.build_create(resource, &input).unwrap();
        check_request(name, &req, &case["expected_request"]);

        let result = c.parse_create(simulated(case));
        if let Some(expected_error) = case.get("expected_error") {
            check_error(name, result.unwrap_err(), expected_error);
        } else {
            let expected: ResourceRecord =
                serde_json::from_value(case["expected_result"].clone()).unwrap();
            assert_eq!(result.unwrap(), expected, "{name}: parsed result");
        }
    }
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[test]
fn delete_test_vectors() {
    let raw = include_str!("../../test-vectors/delete.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let resource = case["input_resource"].as_str().unwrap();
        let id = case["input_id"].as_str().unwrap();

        let req = c.build_delete(resource, id);
        check_request(name, &req, &case["expected_request"]);

        let result = c.parse_delete(simulated(case));
        if let Some(expected_error) = case.get("expected_error") {
            check_error(name, result.unwrap_err(), expected_error);
        } else {
            assert!(result.is_ok(), "{name}: expected success");
        }
    }
}
