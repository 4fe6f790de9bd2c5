mod support;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use pdfrelay::{
    domain::envelope::{FailureKind, ResponseEnvelope},
    infra::http::{HttpState, build_router},
};
use support::{FAKE_PDF, FakeLauncher, PageScript, pipeline};
use tower::ServiceExt;

fn router() -> (axum::Router, Arc<support::Recorder>) {
    let (pipeline, recorder) = pipeline(FakeLauncher::new(PageScript::default()));
    let router = build_router(HttpState {
        pipeline: Arc::new(pipeline),
    });
    (router, recorder)
}

fn json_request(path: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn envelope(response: axum::response::Response) -> ResponseEnvelope {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("envelope json")
}

#[tokio::test]
async fn render_route_returns_success_envelope() {
    let (router, recorder) = router();

    let response = router
        .oneshot(json_request(
            "/render",
            r#"{"value":"<p>hello</p>","type":"string","format":"html"}"#,
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let envelope = envelope(response).await;
    assert!(envelope.is_success());
    assert_eq!(envelope.pdf_bytes().as_deref(), Some(FAKE_PDF));
    assert_eq!(recorder.closes(), 1);
}

#[tokio::test]
async fn root_route_reports_validation_failures_with_ok_status() {
    let (router, recorder) = router();

    let response = router
        .oneshot(json_request("/", r#"{"value":"x","type":"ftp"}"#))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let envelope = envelope(response).await;
    assert_eq!(envelope.message, "Invalid type specified.");
    assert_eq!(envelope.kind, Some(FailureKind::Validation));
    assert_eq!(recorder.launches(), 0);
}

#[tokio::test]
async fn malformed_body_is_a_validation_failure() {
    let (router, recorder) = router();

    let response = router
        .oneshot(json_request("/render", "{not json"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let envelope = envelope(response).await;
    assert_eq!(envelope.kind, Some(FailureKind::Validation));
    assert!(envelope.message.starts_with("Invalid request body"));
    assert!(envelope.data.pdf.is_none());
    assert_eq!(recorder.launches(), 0);
}

#[tokio::test]
async fn healthz_answers_no_content() {
    let (router, _recorder) = router();

    let response = router
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
