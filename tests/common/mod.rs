#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, delete, get, post},
    Json, Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::sync::Notify;

use cmp_console::client::ApiClient;
use cmp_console::config::ClientConfig;
use cmp_console::session::{MemorySession, SessionStore};

/// Rows served by the data element list unless the query says otherwise.
pub const DATA_ELEMENTS: usize = 45;

/// Parks requests to `/gated/...` that carry `gate=hold` until released.
#[derive(Default)]
pub struct Gate {
    /// Signalled once a held request has reached the handler.
    pub arrived: Notify,
    pub release: Notify,
}

/// In-process stand-in for the CMP backend, bound to a free local port.
/// It lives as long as the test's runtime.
pub struct MockBackend {
    pub base_url: String,
    pub gate: Arc<Gate>,
}

impl MockBackend {
    pub async fn start() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        let gate = Arc::new(Gate::default());
        let routes = backend_routes(gate.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, routes).await;
        });

        Ok(Self {
            base_url: format!("http://{}", addr),
            gate,
        })
    }

    /// Points at a free port nothing listens on.
    pub fn unreachable() -> Self {
        let port = portpicker::pick_unused_port().expect("free port");
        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            gate: Arc::new(Gate::default()),
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            df_id: None,
            request_timeout_secs: 5,
            upload_chunk_bytes: 16,
        }
    }

    pub fn client(&self, token: Option<&str>) -> ApiClient {
        self.client_with(self.client_config(), token)
    }

    pub fn client_with(&self, config: ClientConfig, token: Option<&str>) -> ApiClient {
        let session: Arc<dyn SessionStore> = match token {
            Some(token) => Arc::new(MemorySession::with_token(token)),
            None => Arc::new(MemorySession::new()),
        };
        ApiClient::new(&config, session).expect("client builds")
    }
}

/// Unsigned-looking JWT whose `exp` is `offset_secs` from now.
pub fn token(offset_secs: i64) -> String {
    encode(
        &Header::default(),
        &json!({
            "sub": "42",
            "email": "dpo@example.com",
            "user_roles": ["role-admin"],
            "exp": Utc::now().timestamp() + offset_secs,
        }),
        &EncodingKey::from_secret(b"backend-secret"),
    )
    .expect("token encodes")
}

fn backend_routes(gate: Arc<Gate>) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/check-access/*path", get(check_access))
        .route("/auth/get-my-permissions", get(permissions))
        .route("/auth/batch-check-access", get(batch_check_access))
        .route("/data-elements/get-all-data-element", get(data_elements))
        .route("/gated/data-elements", get(gated_data_elements))
        .route("/echo", any(echo))
        .route("/errors/message", get(|| async { (StatusCode::BAD_REQUEST, Json(json!({"message": "X"}))) }))
        .route(
            "/errors/detail",
            get(|| async { (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"detail": "Unprocessable"}))) }),
        )
        .route(
            "/errors/plain",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, [(header::CONTENT_TYPE, "text/plain")], "boom") }),
        )
        .route("/items/:id", delete(|| async { StatusCode::NO_CONTENT }))
        .route("/text", get(|| async { ([(header::CONTENT_TYPE, "text/plain")], "hello") }))
        .route(
            "/files/report",
            get(|| async { ([(header::CONTENT_TYPE, "application/pdf")], vec![0u8, 159, 146, 150]) }),
        )
        .route("/upload", post(upload))
        .route("/upload/plain", post(|| async { ([(header::CONTENT_TYPE, "text/plain")], "stored") }))
        .route(
            "/upload/reject",
            post(|| async { (StatusCode::PAYLOAD_TOO_LARGE, Json(json!({"message": "File too large"}))) }),
        )
        .with_state(gate)
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn query_pairs(raw: &Option<String>) -> Vec<(String, String)> {
    raw.as_deref()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

fn query_value(pairs: &[(String, String)], key: &str) -> Option<String> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
}

async fn login(Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    if body["password"] != "secret" {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Invalid credentials"}))).into_response();
    }
    Json(json!({
        "access_token": token(3600),
        "token_type": "bearer",
        "is_password_reseted": email != "reset@example.com",
        "is_org_configured": email != "fresh@example.com",
        "is_invited_user": false,
    }))
    .into_response()
}

async fn check_access(headers: HeaderMap, Path(path): Path<String>) -> Response {
    if bearer(&headers).is_none() {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Not authenticated"}))).into_response();
    }
    let path = format!("/{}", path.trim_start_matches('/'));
    if path.contains("explode") {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"detail": "Server Error"}))).into_response();
    }
    Json(json!({"access": allowed(&path), "path": path, "action": "read"})).into_response()
}

fn allowed(path: &str) -> bool {
    path == "/apps" || path.starts_with("/apps/data-element")
}

async fn batch_check_access(RawQuery(raw): RawQuery) -> Json<Value> {
    let pairs = query_pairs(&raw);
    let action = query_value(&pairs, "action").unwrap_or_else(|| "read".to_string());
    let access: serde_json::Map<String, Value> = query_value(&pairs, "paths")
        .unwrap_or_default()
        .split(',')
        .filter(|p| !p.is_empty())
        .map(|p| (p.to_string(), Value::Bool(allowed(p))))
        .collect();
    Json(json!({"access": access, "action": action}))
}

async fn permissions() -> Json<Value> {
    Json(json!({
        "permissions": [
            {"role": "public", "path": "/apps/get-started", "action": "read"},
            {"role": "role-admin", "path": "/apps/data-element", "action": "read"},
            {"role": "role-admin", "path": "/apps/data-element", "action": "write"},
        ]
    }))
}

/// `current_page`/`data_per_page` list. `total` and `delay_ms` in the query
/// shape the answer.
async fn data_elements(headers: HeaderMap, RawQuery(raw): RawQuery) -> Response {
    if bearer(&headers).is_none() {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Not authenticated"}))).into_response();
    }
    let pairs = query_pairs(&raw);
    let number = |key: &str, default: usize| {
        query_value(&pairs, key)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(default)
    };

    let delay = number("delay_ms", 0);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay as u64)).await;
    }

    let total = number("total", DATA_ELEMENTS);
    let page = number("current_page", 1).max(1);
    let size = number("data_per_page", 20).max(1);
    let total_pages = total.div_ceil(size);

    let start = (page - 1) * size;
    let rows: Vec<Value> = (start..(start + size).min(total))
        .map(|i| {
            json!({
                "de_id": format!("de-{}", i + 1),
                "de_name": format!("element-{}", i + 1),
                "de_data_type": if i % 3 == 0 { Value::Null } else { json!("string") },
                "is_core_identifier": i % 2 == 0,
                "de_status": "published",
            })
        })
        .collect();

    Json(json!({
        "data_elements": rows,
        "total_pages": total_pages,
        "current_page": page,
        "data_per_page": size,
    }))
    .into_response()
}

async fn gated_data_elements(State(gate): State<Arc<Gate>>, headers: HeaderMap, raw: RawQuery) -> Response {
    if query_value(&query_pairs(&raw.0), "gate").as_deref() == Some("hold") {
        gate.arrived.notify_one();
        gate.release.notified().await;
    }
    data_elements(headers, raw).await
}

async fn echo(method: Method, headers: HeaderMap, RawQuery(raw): RawQuery, body: Bytes) -> Json<Value> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    Json(json!({
        "method": method.as_str(),
        "authorization": header("authorization"),
        "df_id": header("df-id"),
        "content_type": header("content-type"),
        "accept": header("accept"),
        "x_trace": header("x-trace"),
        "query": raw,
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn upload(headers: HeaderMap, body: Bytes) -> Json<Value> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let text = String::from_utf8_lossy(&body);
    Json(json!({
        "multipart": content_type.starts_with("multipart/form-data"),
        "received": body.len(),
        "has_file": text.contains("filename=\"consents.csv\""),
        "has_purpose": text.contains("name=\"purpose\""),
        "authorized": bearer(&headers).is_some(),
    }))
}
