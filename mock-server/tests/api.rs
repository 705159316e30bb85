use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Echo, MAX_BODY_BYTES};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

// --- echo ---

#[tokio::test]
async fn echo_get_reports_query_and_headers() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/api/echo?page=2&q=rust")
                .header("X-Trace", "abc")
                .header(http::header::COOKIE, "sid=1")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "GET");
    assert_eq!(echo.path, "/api/echo");
    assert_eq!(echo.query.as_deref(), Some("page=2&q=rust"));
    assert_eq!(echo.headers["x-trace"], "abc");
    assert_eq!(echo.headers["cookie"], "sid=1");
    assert!(echo.body.is_empty());
}

#[tokio::test]
async fn echo_post_returns_body_verbatim() {
    let resp = app()
        .oneshot(json_request("POST", "/api/echo", r#"{"level":5}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.body, r#"{"level":5}"#);
    assert_eq!(echo.headers["content-type"], "application/json");
    assert!(echo.query.is_none());
}

#[tokio::test]
async fn echo_accepts_every_method() {
    for method in ["PUT", "PATCH", "DELETE", "OPTIONS"] {
        let resp = app()
            .oneshot(json_request(method, "/api/echo", "{}"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "{method}");
        let echo: Echo = body_json(resp).await;
        assert_eq!(echo.method, method);
    }
}

#[tokio::test]
async fn echo_ids_are_unique() {
    let first: Echo = body_json(app().oneshot(json_request("GET", "/api/echo", "")).await.unwrap()).await;
    let second: Echo = body_json(app().oneshot(json_request("GET", "/api/echo", "")).await.unwrap()).await;
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn oversized_body_returns_413() {
    let body = "x".repeat(MAX_BODY_BYTES + 1);
    let resp = app()
        .oneshot(json_request("POST", "/api/echo", &body))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

// --- status ---

#[tokio::test]
async fn status_route_answers_with_requested_code() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/api/status/418")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["status"], 418);
}

#[tokio::test]
async fn status_route_rejects_invalid_code() {
    for uri in ["/api/status/1000", "/api/status/teapot"] {
        let resp = app()
            .oneshot(Request::builder().uri(uri).body(String::new()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn unknown_route_is_404() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/todos")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(body_bytes(resp).await.is_empty());
}
