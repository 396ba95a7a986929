//! In-process apiserver for driving watch loops in tests

use kube::client::Body;
use serde_json::json;

pub(crate) type ApiServer = tower_test::mock::Handle<http::Request<Body>, http::Response<Body>>;

/// Client whose requests are answered through the returned handle
pub(crate) fn mock_client() -> (kube::Client, ApiServer) {
    let (service, handle) = tower_test::mock::pair::<http::Request<Body>, http::Response<Body>>();
    (kube::Client::new(service, "default"), handle)
}

pub(crate) fn json_response(value: serde_json::Value) -> http::Response<Body> {
    http::Response::builder()
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&value).unwrap()))
        .unwrap()
}

pub(crate) fn text_response(text: &str) -> http::Response<Body> {
    http::Response::builder()
        .body(Body::from(text.as_bytes().to_vec()))
        .unwrap()
}

/// `Status` failure as the apiserver sends it
pub(crate) fn status_response(reason: &str, code: u16) -> http::Response<Body> {
    let body = json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": format!("{} error", reason),
        "reason": reason,
        "code": code,
    });
    http::Response::builder()
        .status(code)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

pub(crate) fn list(kind: &str, items: Vec<serde_json::Value>) -> serde_json::Value {
    json!({
        "apiVersion": "v1",
        "kind": kind,
        "metadata": { "resourceVersion": "1" },
        "items": items,
    })
}

pub(crate) fn is_watch(req: &http::Request<Body>) -> bool {
    req.uri().query().unwrap_or_default().contains("watch=true")
}
