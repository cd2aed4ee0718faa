use std::sync::Arc;

use wdcaption::{
    captioner::Captioner,
    service::{TagRequest, TagService, CODE_FAILURE, CODE_SUCCESS},
};

mod common;
use common::{test_image, to_base64_png, FakeCaptioner, Reply};

fn service(
    wd: &Arc<FakeCaptioner>,
    vlm: Option<&Arc<FakeCaptioner>>,
    fallback_to_wd: bool,
) -> TagService {
    TagService::new(
        wd.clone() as Arc<dyn Captioner>,
        vlm.map(|v| v.clone() as Arc<dyn Captioner>),
        fallback_to_wd,
    )
}

#[tokio::test]
async fn test_invalid_base64_skips_models() {
    let wd = Arc::new(FakeCaptioner::new("WD", Reply::Caption("1girl")));
    let vlm = Arc::new(FakeCaptioner::new("VLM", Reply::Caption("a cat")));
    let service = service(&wd, Some(&vlm), true);

    for category in ["sdxl", "flux"] {
        let response = service.tag(&TagRequest::new("%%% not base64 %%%", category)).await;
        assert_eq!(response.code, CODE_FAILURE);
        assert!(response.msg.starts_with("image decode failed"), "{}", response.msg);
        assert_eq!(response.data, serde_json::json!({}));
    }
    assert_eq!(wd.calls(), 0);
    assert_eq!(vlm.calls(), 0);
}

#[tokio::test]
async fn test_valid_base64_of_non_image_skips_models() {
    let wd = Arc::new(FakeCaptioner::new("WD", Reply::Caption("1girl")));
    let service = service(&wd, None, true);

    let response = service.tag(&TagRequest::new("aGVsbG8gd29ybGQ=", "sdxl")).await;
    assert_eq!(response.code, CODE_FAILURE);
    assert!(response.msg.contains("cannot identify image file"), "{}", response.msg);
    assert_eq!(wd.calls(), 0);
}

#[tokio::test]
async fn test_sdxl_uses_wd() {
    let wd = Arc::new(FakeCaptioner::new("WD", Reply::Caption("1girl, solo")));
    let vlm = Arc::new(FakeCaptioner::new("VLM", Reply::Caption("a cat")));
    let service = service(&wd, Some(&vlm), true);

    let response = service
        .tag(&TagRequest::new(to_base64_png(&test_image(8, 8)), "sdxl"))
        .await;
    assert_eq!(response.code, CODE_SUCCESS);
    assert_eq!(response.msg, "success");
    assert_eq!(response.caption(), Some("1girl, solo"));
    assert_eq!((wd.calls(), vlm.calls()), (1, 0));
}

#[tokio::test]
async fn test_unknown_category_uses_wd() {
    let wd = Arc::new(FakeCaptioner::new("WD", Reply::Caption("1girl")));
    let vlm = Arc::new(FakeCaptioner::new("VLM", Reply::Caption("a cat")));
    let service = service(&wd, Some(&vlm), true);

    let response = service
        .tag(&TagRequest::new(to_base64_png(&test_image(8, 8)), "sd15"))
        .await;
    assert_eq!(response.caption(), Some("1girl"));
    assert_eq!((wd.calls(), vlm.calls()), (1, 0));
}

#[tokio::test]
async fn test_flux_uses_vlm() {
    let wd = Arc::new(FakeCaptioner::new("WD", Reply::Caption("1girl")));
    let vlm = Arc::new(FakeCaptioner::new("VLM", Reply::Caption("a cat on a sofa")));
    let service = service(&wd, Some(&vlm), true);

    let response = service
        .tag(&TagRequest::new(to_base64_png(&test_image(8, 8)), "flux"))
        .await;
    assert_eq!(response.caption(), Some("a cat on a sofa"));
    assert_eq!((wd.calls(), vlm.calls()), (0, 1));
}

#[tokio::test]
async fn test_empty_caption_is_failure() {
    let image = to_base64_png(&test_image(8, 8));

    let wd = Arc::new(FakeCaptioner::new("WD", Reply::Caption("")));
    let response = service(&wd, None, true).tag(&TagRequest::new(image.clone(), "sdxl")).await;
    assert_eq!(response.code, CODE_FAILURE);
    assert!(response.msg.starts_with("WD model processing failed"), "{}", response.msg);

    let wd = Arc::new(FakeCaptioner::new("WD", Reply::Caption("1girl")));
    let vlm = Arc::new(FakeCaptioner::new("VLM", Reply::Caption("   ")));
    let response = service(&wd, Some(&vlm), false).tag(&TagRequest::new(image, "flux")).await;
    assert_eq!(response.code, CODE_FAILURE);
    assert!(response.msg.starts_with("VLM model processing failed"), "{}", response.msg);
    assert_eq!(wd.calls(), 0);
}

#[tokio::test]
async fn test_vlm_failure_falls_back_to_wd() {
    let wd = Arc::new(FakeCaptioner::new("WD", Reply::Caption("1girl, solo")));
    let vlm = Arc::new(FakeCaptioner::new("VLM", Reply::Fail("timeout")));
    let service = service(&wd, Some(&vlm), true);

    let response = service
        .tag(&TagRequest::new(to_base64_png(&test_image(8, 8)), "flux"))
        .await;
    assert_eq!(response.caption(), Some("1girl, solo"));
    assert_eq!((wd.calls(), vlm.calls()), (1, 1));
}

#[tokio::test]
async fn test_vlm_failure_without_fallback() {
    let wd = Arc::new(FakeCaptioner::new("WD", Reply::Caption("1girl")));
    let vlm = Arc::new(FakeCaptioner::new("VLM", Reply::Fail("timeout")));
    let service = service(&wd, Some(&vlm), false);

    let response = service
        .tag(&TagRequest::new(to_base64_png(&test_image(8, 8)), "flux"))
        .await;
    assert_eq!(response.code, CODE_FAILURE);
    assert!(response.msg.contains("timeout"), "{}", response.msg);
    assert_eq!(wd.calls(), 0);
}

#[tokio::test]
async fn test_both_backends_failing() {
    let wd = Arc::new(FakeCaptioner::new("WD", Reply::Fail("no model")));
    let vlm = Arc::new(FakeCaptioner::new("VLM", Reply::Fail("timeout")));
    let service = service(&wd, Some(&vlm), true);

    let response = service
        .tag(&TagRequest::new(to_base64_png(&test_image(8, 8)), "flux"))
        .await;
    assert_eq!(response.code, CODE_FAILURE);
    assert!(response.msg.starts_with("WD model processing failed"), "{}", response.msg);
}

#[tokio::test]
async fn test_flux_without_vlm_configured() {
    let wd = Arc::new(FakeCaptioner::new("WD", Reply::Caption("1girl")));
    let image = to_base64_png(&test_image(8, 8));

    let response = service(&wd, None, true).tag(&TagRequest::new(image.clone(), "flux")).await;
    assert_eq!(response.caption(), Some("1girl"));

    let response = service(&wd, None, false).tag(&TagRequest::new(image, "flux")).await;
    assert_eq!(response.code, CODE_FAILURE);
    assert!(response.msg.contains("not configured"));
}
