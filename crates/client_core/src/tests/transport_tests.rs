use super::*;
use anyhow::Result;
use axum::{
    extract::{Multipart, Query},
    http::{HeaderMap, StatusCode as HttpStatus},
    response::IntoResponse,
    routing::{get, patch, post, put},
    Json, Router,
};
use serde_json::json;
use shared::domain::Role;
use std::collections::HashMap;
use tokio::net::TcpListener;

use crate::session::Session;

fn signed_in(token: &str) -> Arc<SessionContext> {
    Arc::new(SessionContext::new(Some(Session {
        access_token: token.to_string(),
        refresh_token: None,
        username: "asha".to_string(),
        user_id: Some(3),
        role: Role::Admin,
        first_name: None,
        last_name: None,
        profile: None,
    })))
}

async fn echo_query(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Json(json!({ "auth": auth, "query": query }))
}

async fn reject_token() -> impl IntoResponse {
    (
        HttpStatus::UNAUTHORIZED,
        Json(json!({ "detail": "Given token not valid for any token type" })),
    )
}

async fn reject_fields() -> impl IntoResponse {
    (
        HttpStatus::BAD_REQUEST,
        Json(json!({ "email": ["Enter a valid email address."] })),
    )
}

async fn no_content() -> HttpStatus {
    HttpStatus::NO_CONTENT
}

async fn crash() -> impl IntoResponse {
    (HttpStatus::INTERNAL_SERVER_ERROR, "boom")
}

async fn echo_multipart(mut multipart: Multipart) -> Json<Value> {
    let mut fields = serde_json::Map::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.unwrap_or_default();
        let value = match file_name {
            Some(file_name) => json!({ "file_name": file_name, "len": bytes.len() }),
            None => json!(String::from_utf8_lossy(&bytes)),
        };
        fields.insert(name, value);
    }
    Json(Value::Object(fields))
}

async fn spawn_api_server() -> Result<Url> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/api/leave/", get(echo_query))
        .route("/api/expired/", get(reject_token))
        .route("/api/employees/3/", put(reject_fields))
        .route("/api/update-leave-status/7/", patch(no_content))
        .route("/api/holidays/", post(echo_multipart))
        .route("/api/broken/", get(crash));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    // No trailing slash: the transport must still keep `/api`.
    Ok(Url::parse(&format!("http://{addr}/api"))?)
}

async fn transport(token: &str) -> HttpTransport {
    let base = spawn_api_server().await.expect("spawn server");
    HttpTransport::new(base, signed_in(token), Some(Duration::from_secs(5))).expect("client")
}

#[tokio::test]
async fn get_sends_bearer_token_and_query() {
    let transport = transport("tok-123").await;
    let body = transport
        .get(
            "leave/",
            &[
                ("page".to_string(), "2".to_string()),
                ("search".to_string(), "asha".to_string()),
            ],
        )
        .await
        .expect("get succeeds");

    assert_eq!(body["auth"], "Bearer tok-123");
    assert_eq!(body["query"]["page"], "2");
    assert_eq!(body["query"]["search"], "asha");
}

#[tokio::test]
async fn get_without_session_sends_no_token() {
    let base = spawn_api_server().await.expect("spawn server");
    let transport = HttpTransport::new(base, Arc::new(SessionContext::default()), None)
        .expect("client");
    let body = transport.get("/leave/", &[]).await.expect("get succeeds");
    assert!(body["auth"].is_null());
}

#[tokio::test]
async fn unauthorized_maps_to_auth_failure() {
    let transport = transport("expired").await;
    let err = transport.get("expired/", &[]).await.expect_err("401");
    assert_eq!(
        err,
        TransportError::Unauthorized("Given token not valid for any token type".to_string())
    );
}

#[tokio::test]
async fn bad_request_keeps_field_errors() {
    let transport = transport("tok").await;
    let err = transport
        .send(
            Method::Put,
            "employees/3/",
            RequestBody::Json(json!({ "email": "nope" })),
        )
        .await
        .expect_err("400");

    let TransportError::Validation(api) = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert_eq!(
        api.field("email"),
        Some(&["Enter a valid email address.".to_string()][..])
    );
}

#[tokio::test]
async fn empty_success_body_is_null() {
    let transport = transport("tok").await;
    let body = transport
        .send(
            Method::Patch,
            "update-leave-status/7/",
            RequestBody::Json(json!({ "status": "Approved" })),
        )
        .await
        .expect("patch succeeds");
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn server_error_carries_status() {
    let transport = transport("tok").await;
    let err = transport.get("broken/", &[]).await.expect_err("500");
    assert_eq!(
        err,
        TransportError::Status {
            status: 500,
            message: "boom".to_string(),
        }
    );
}

#[tokio::test]
async fn multipart_sends_text_and_file_parts() {
    let transport = transport("tok").await;
    let form = MultipartForm::new()
        .text("name", "Diwali")
        .text("date", "2024-11-01")
        .file(FilePart::new(
            "holiday_image",
            "lamp.png",
            "image/png",
            vec![0u8; 16],
        ));
    let body = transport
        .send(Method::Post, "holidays/", RequestBody::Multipart(form))
        .await
        .expect("post succeeds");

    assert_eq!(body["name"], "Diwali");
    assert_eq!(body["date"], "2024-11-01");
    assert_eq!(body["holiday_image"]["file_name"], "lamp.png");
    assert_eq!(body["holiday_image"]["len"], 16);
}

#[test]
fn form_from_fields_skips_nulls_and_replaced_fields() {
    let fields = json!({
        "first_name": "Asha",
        "is_staff": false,
        "profile": "old.png",
        "bio": null,
        "tags": ["a"],
    });
    let form = MultipartForm::from_fields(
        &fields,
        vec![FilePart::new("profile", "new.png", "image/png", vec![1])],
    );

    let names: Vec<&str> = form.text.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["first_name", "is_staff"]);
    assert_eq!(form.text[1].1, "false");
    assert_eq!(form.files.len(), 1);
}

#[test]
fn base_url_gains_trailing_slash() {
    let url = normalize_base_url(Url::parse("http://localhost:8000/api").expect("url"));
    assert_eq!(url.as_str(), "http://localhost:8000/api/");
    let url = normalize_base_url(Url::parse("http://localhost:8000/api/").expect("url"));
    assert_eq!(url.as_str(), "http://localhost:8000/api/");
}
