use axum::http::{self, Request, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http_body_util::BodyExt;
use mock_server::{app, app_with, state, View, APP_TOKEN, PASSWORD, USERNAME};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn authorization() -> String {
    format!("Basic {}", STANDARD.encode(format!("{USERNAME}:{PASSWORD}")))
}

fn get(uri: &str) -> Request<String> {
    Request::builder()
        .uri(uri)
        .header("x-app-token", APP_TOKEN)
        .header(http::header::AUTHORIZATION, authorization())
        .body(String::new())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-app-token", APP_TOKEN)
        .header(http::header::AUTHORIZATION, authorization())
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

// --- auth ---

#[tokio::test]
async fn missing_app_token_returns_401_with_error_object() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/users/demo/views.json")
                .header(http::header::AUTHORIZATION, authorization())
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = body_json(resp).await;
    assert!(body.get("error").is_some());
}

#[tokio::test]
async fn wrong_password_returns_401() {
    let bad = format!("Basic {}", STANDARD.encode(format!("{USERNAME}:nope")));
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/notice")
                .header("x-app-token", APP_TOKEN)
                .header(http::header::AUTHORIZATION, bad)
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- views ---

#[tokio::test]
async fn user_views_are_listed_as_array() {
    let resp = app().oneshot(get("/users/demo/views.json")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let views: Vec<View> = body_json(resp).await;
    let ids: Vec<&str> = views.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, ["abcd-1234", "wxyz-9876"]);
}

#[tokio::test]
async fn unknown_user_has_no_views() {
    let resp = app().oneshot(get("/users/nobody/views.json")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let views: Vec<View> = body_json(resp).await;
    assert!(views.is_empty());
}

#[tokio::test]
async fn get_view_returns_object() {
    let resp = app().oneshot(get("/views/abcd-1234.json")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let view: View = body_json(resp).await;
    assert_eq!(view.name, "Crimes 2010");
}

#[tokio::test]
async fn missing_view_returns_404_error_object() {
    let resp = app().oneshot(get("/views/none-0000.json")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "not_found");
}

// --- rows ---

#[tokio::test]
async fn append_row_then_list() {
    let db = state();

    let resp = app_with(db.clone())
        .oneshot(json_request("POST", "/views/wxyz-9876/rows.json", r#"{"permit":"B-1"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let row: serde_json::Value = body_json(resp).await;
    assert_eq!(row["permit"], "B-1");
    assert!(row[":id"].is_string());

    let resp = app_with(db)
        .oneshot(get("/views/wxyz-9876/rows.json"))
        .await
        .unwrap();
    let rows: Vec<serde_json::Value> = body_json(resp).await;
    assert_eq!(rows.len(), 1);
}

// --- batches ---

#[tokio::test]
async fn batch_applies_requests_in_order() {
    let db = state();
    let envelope = r#"{"requests":[
        {"url":"/views/abcd-1234/rows.json","requestType":"POST","body":"{\"n\":1}"},
        {"url":"/views/abcd-1234/rows.json","requestType":"POST","body":"{\"n\":2}"},
        {"url":"/nowhere","requestType":"POST","body":"{}"}
    ]}"#;

    let resp = app_with(db.clone())
        .oneshot(json_request("POST", "/batches", envelope))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let results: Vec<serde_json::Value> = body_json(resp).await;
    let statuses: Vec<u64> = results.iter().map(|r| r["status"].as_u64().unwrap()).collect();
    assert_eq!(statuses, [200, 200, 404]);

    let state = db.read().await;
    let rows = &state.rows["abcd-1234"];
    assert_eq!(rows[0]["n"], 1);
    assert_eq!(rows[1]["n"], 2);
    assert_eq!(state.batches.len(), 1);
}

#[tokio::test]
async fn unsupported_request_type_is_200_with_error() {
    let db = state();
    let envelope = r#"{"requests":[{"url":"/views/abcd-1234/rows.json","requestType":"TRACE","body":"{}"}]}"#;

    let resp = app_with(db.clone())
        .oneshot(json_request("POST", "/batches", envelope))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["error"], "unsupported requestType TRACE");
    assert!(db.read().await.rows["abcd-1234"].is_empty());
}

#[tokio::test]
async fn failing_batch_hook_rejects_then_recovers() {
    let db = state();
    db.write().await.fail_next_batches(1);
    let envelope = r#"{"requests":[{"url":"/views/abcd-1234/rows.json","requestType":"POST","body":"{}"}]}"#;

    let resp = app_with(db.clone())
        .oneshot(json_request("POST", "/batches", envelope))
        .await
        .unwrap();
    let body: serde_json::Value = body_json(resp).await;
    assert!(body.get("error").is_some());

    let resp = app_with(db.clone())
        .oneshot(json_request("POST", "/batches", envelope))
        .await
        .unwrap();
    let results: Vec<serde_json::Value> = body_json(resp).await;
    assert_eq!(results.len(), 1);

    let state = db.read().await;
    assert_eq!(state.batches.len(), 2);
    assert_eq!(state.rows["abcd-1234"].len(), 1);
}

// --- odd shapes ---

#[tokio::test]
async fn notice_is_plain_text() {
    let resp = app().oneshot(get("/notice")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_bytes(resp).await;
    assert!(body.starts_with(b"Scheduled maintenance"));
}

#[tokio::test]
async fn empty_has_no_body() {
    let resp = app().oneshot(get("/empty")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn status_route_echoes_code() {
    let resp = app().oneshot(get("/status/503")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}
