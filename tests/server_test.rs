use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wdcaption::{captioner::Captioner, server, service::TagService};

mod common;
use common::{test_image, to_base64_png, FakeCaptioner, Reply};

const LIMIT: usize = 1024 * 1024;

fn app(wd: Reply, vlm: Reply) -> axum::Router {
    app_with_limit(wd, vlm, LIMIT)
}

fn app_with_limit(wd: Reply, vlm: Reply, body_limit: usize) -> axum::Router {
    let wd: Arc<dyn Captioner> = Arc::new(FakeCaptioner::new("WD", wd));
    let vlm: Arc<dyn Captioner> = Arc::new(FakeCaptioner::new("VLM", vlm));
    server::router(Arc::new(TagService::new(wd, Some(vlm), false)), body_limit)
}

async fn post(app: axum::Router, body: impl Into<Body>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/tag_image")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), LIMIT).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_tag_image_success() {
    let body = json!({
        "image_base64": to_base64_png(&test_image(16, 16)),
        "category": "sdxl",
        "format": "png",
    });
    let (status, value) = post(app(Reply::Caption("1girl, solo"), Reply::Caption("a cat")), body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value, json!({"code": 0, "msg": "success", "data": {"caption": "1girl, solo"}}));
}

#[tokio::test]
async fn test_tag_image_defaults_to_sdxl() {
    let body = json!({ "image_base64": to_base64_png(&test_image(16, 16)) });
    let (_, value) = post(app(Reply::Caption("1girl"), Reply::Caption("a cat")), body.to_string()).await;
    assert_eq!(value["data"]["caption"], "1girl");
}

#[tokio::test]
async fn test_tag_image_flux() {
    let body = json!({
        "image_base64": to_base64_png(&test_image(16, 16)),
        "category": "flux",
    });
    let (_, value) = post(app(Reply::Caption("1girl"), Reply::Caption("a cat")), body.to_string()).await;
    assert_eq!(value["data"]["caption"], "a cat");
}

#[tokio::test]
async fn test_tag_image_bad_base64() {
    let body = json!({ "image_base64": "@@@@", "category": "sdxl" });
    let (status, value) = post(app(Reply::Caption("1girl"), Reply::Caption("a cat")), body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["code"], -1);
    assert_eq!(value["data"], json!({}));
    assert!(value["msg"].as_str().unwrap().starts_with("image decode failed"));
}

#[tokio::test]
async fn test_tag_image_backend_failure() {
    let body = json!({
        "image_base64": to_base64_png(&test_image(16, 16)),
        "category": "flux",
    });
    let (status, value) = post(app(Reply::Caption("1girl"), Reply::Fail("upstream down")), body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["code"], -1);
    assert!(value["msg"].as_str().unwrap().contains("upstream down"));
}

#[tokio::test]
async fn test_tag_image_malformed_json() {
    let (status, value) = post(app(Reply::Caption("1girl"), Reply::Caption("a cat")), "{not json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["code"], -1);
    assert!(value["msg"].as_str().unwrap().starts_with("invalid request"));

    let (_, value) = post(app(Reply::Caption("1girl"), Reply::Caption("a cat")), r#"{"category": "sdxl"}"#).await;
    assert_eq!(value["code"], -1);
}

#[tokio::test]
async fn test_tag_image_body_too_large() {
    let body = json!({
        "image_base64": "A".repeat(4096),
        "category": "sdxl",
    });
    let app = app_with_limit(Reply::Caption("1girl"), Reply::Caption("a cat"), 1024);
    let (status, value) = post(app, body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["code"], -1);
    assert_eq!(value["data"], json!({}));
    assert!(value["msg"].as_str().unwrap().starts_with("invalid request"), "{value}");
}
