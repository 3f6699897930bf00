use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use cmp_console::config::AppConfig;
use cmp_console::error::ApiError;
use cmp_console::handlers::ConsoleState;
use cmp_console::middleware::access::batch_check;
use cmp_console::middleware::{AccessChecker, Action, HttpAccessChecker, PermissionSet};
use cmp_console::session::SessionCookie;

mod common;
use common::{token, MockBackend};

/// Checker with a canned answer; `None` fails like an unreachable backend.
struct Canned {
    answer: Option<bool>,
    calls: AtomicUsize,
}

impl Canned {
    fn new(answer: Option<bool>) -> Arc<Self> {
        Arc::new(Self {
            answer,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccessChecker for Canned {
    async fn check(&self, _token: &str, _path: &str) -> Result<bool, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.ok_or_else(|| ApiError::Transport("connection refused".to_string()))
    }
}

fn console(backend: &MockBackend, checker: Arc<dyn AccessChecker>) -> Router {
    let mut config = AppConfig::development();
    config.client = backend.client_config();
    config.server.enable_cors = false;
    let client = backend.client(None);
    cmp_console::app(ConsoleState::new(client, config), checker)
}

fn get(path: &str, cookies: &[(SessionCookie, &str)]) -> Request<Body> {
    let mut request = Request::builder().uri(path);
    if !cookies.is_empty() {
        let line: Vec<String> = cookies
            .iter()
            .map(|(cookie, value)| format!("{}={}", cookie.name(), value))
            .collect();
        request = request.header(header::COOKIE, line.join("; "));
    }
    request.body(Body::empty()).expect("request builds")
}

fn location(response: &Response) -> Option<&str> {
    response.headers().get(header::LOCATION)?.to_str().ok()
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}

async fn json_body(response: Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn expired_token_redirects_to_login_and_clears_cookies() -> Result<()> {
    let backend = MockBackend::start().await?;
    let checker = Canned::new(Some(true));
    let app = console(&backend, checker.clone());

    let expired = token(-60);
    let response = app
        .oneshot(get("/apps/data-element", &[(SessionCookie::AccessToken, &expired)]))
        .await?;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/login"));
    let cleared = set_cookies(&response);
    assert_eq!(cleared.len(), SessionCookie::ALL.len());
    assert!(cleared.iter().all(|c| c.contains("Max-Age=0")));
    assert!(cleared.iter().any(|c| c.starts_with("access_token=;")));
    assert_eq!(checker.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn missing_or_garbage_token_redirects_to_login() -> Result<()> {
    let backend = MockBackend::start().await?;
    let app = console(&backend, Canned::new(Some(true)));

    let response = app.clone().oneshot(get("/apps", &[])).await?;
    assert_eq!(location(&response), Some("/login"));

    let response = app
        .oneshot(get("/apps", &[(SessionCookie::AccessToken, "not-a-jwt")]))
        .await?;
    assert_eq!(location(&response), Some("/login"));
    Ok(())
}

#[tokio::test]
async fn login_page_is_reachable_without_a_session() -> Result<()> {
    let backend = MockBackend::start().await?;
    let app = console(&backend, Canned::new(Some(true)));

    let response = app.oneshot(get("/login", &[])).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?["data"]["page"], "login");
    Ok(())
}

#[tokio::test]
async fn public_prefixes_skip_every_check() -> Result<()> {
    let backend = MockBackend::start().await?;
    let checker = Canned::new(Some(false));
    let app = console(&backend, checker.clone());

    // Passes the guard; there is no page behind it here.
    let response = app.oneshot(get("/accept-invite/abc", &[])).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(checker.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn denied_or_failed_access_check_goes_to_unauthorized() -> Result<()> {
    let backend = MockBackend::start().await?;
    let valid = token(600);

    for answer in [Some(false), None] {
        let checker = Canned::new(answer);
        let app = console(&backend, checker.clone());
        let response = app
            .oneshot(get("/apps/grievances", &[(SessionCookie::AccessToken, &valid)]))
            .await?;

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), Some("/unauthorized"));
        assert!(set_cookies(&response).is_empty());
        assert_eq!(checker.calls(), 1);
    }
    Ok(())
}

#[tokio::test]
async fn onboarding_flags_take_priority_over_access() -> Result<()> {
    let backend = MockBackend::start().await?;
    let valid = token(600);
    let checker = Canned::new(Some(true));
    let app = console(&backend, checker.clone());

    let response = app
        .clone()
        .oneshot(get(
            "/apps/data-element",
            &[(SessionCookie::AccessToken, &valid), (SessionCookie::IsNotOrgSetup, "true")],
        ))
        .await?;
    assert_eq!(location(&response), Some("/org-setup"));

    let response = app
        .oneshot(get(
            "/apps/data-element",
            &[(SessionCookie::AccessToken, &valid), (SessionCookie::IsNotPasswordSet, "true")],
        ))
        .await?;
    assert_eq!(location(&response), Some("/reset-password"));
    assert_eq!(checker.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn signed_in_user_is_sent_from_login_to_landing() -> Result<()> {
    let backend = MockBackend::start().await?;
    let valid = token(600);
    let app = console(&backend, Canned::new(Some(true)));

    for path in ["/login", "/"] {
        let response = app
            .clone()
            .oneshot(get(path, &[(SessionCookie::AccessToken, &valid)]))
            .await?;
        assert_eq!(location(&response), Some("/apps"), "from {}", path);
    }
    Ok(())
}

#[tokio::test]
async fn allowed_list_page_returns_a_table_view() -> Result<()> {
    let backend = MockBackend::start().await?;
    let valid = token(600);
    let app = console(&backend, Canned::new(Some(true)));

    let response = app
        .oneshot(get(
            "/apps/data-element?page=9&rows_per_page=10",
            &[(SessionCookie::AccessToken, &valid), (SessionCookie::Email, "dpo%40example.com")],
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await?;
    let view = &body["data"];
    assert_eq!(view["title"], "Data Elements");
    assert_eq!(view["body"]["kind"], "rows");
    // 45 rows at 10 per page: page 9 is pulled back to page 5.
    assert_eq!(view["pagination"]["current_page"], 5);
    assert_eq!(view["pagination"]["total_pages"], 5);
    assert_eq!(view["rows"].as_array().map(Vec::len), Some(5));
    assert_eq!(view["rows"][0]["serial"], 41);
    Ok(())
}

#[tokio::test]
async fn landing_reads_browser_written_email_cookie() -> Result<()> {
    let backend = MockBackend::start().await?;
    let valid = token(600);
    let app = console(&backend, Canned::new(Some(true)));

    let response = app
        .oneshot(get(
            "/apps",
            &[(SessionCookie::AccessToken, &valid), (SessionCookie::Email, "qa+dpo@example.com")],
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?["data"]["email"], "qa+dpo@example.com");
    Ok(())
}

#[tokio::test]
async fn unknown_list_page_is_not_found() -> Result<()> {
    let backend = MockBackend::start().await?;
    let valid = token(600);
    let app = console(&backend, Canned::new(Some(true)));

    let response = app
        .oneshot(get("/apps/no-such-page", &[(SessionCookie::AccessToken, &valid)]))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await?;
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn bad_page_size_is_rejected() -> Result<()> {
    let backend = MockBackend::start().await?;
    let valid = token(600);
    let app = console(&backend, Canned::new(Some(true)));

    let response = app
        .oneshot(get("/apps/data-element?rows_per_page=7", &[(SessionCookie::AccessToken, &valid)]))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await?["code"], "INVALID_REQUEST");
    Ok(())
}

#[tokio::test]
async fn backend_access_check_guards_real_paths() -> Result<()> {
    let backend = MockBackend::start().await?;
    let valid = token(600);
    let checker = HttpAccessChecker::new(backend.client(None), "/auth/check-access");
    let app = console(&backend, Arc::new(checker));

    let allowed = app
        .clone()
        .oneshot(get("/apps/data-element", &[(SessionCookie::AccessToken, &valid)]))
        .await?;
    assert_eq!(allowed.status(), StatusCode::OK);

    let denied = app
        .clone()
        .oneshot(get("/apps/grievances", &[(SessionCookie::AccessToken, &valid)]))
        .await?;
    assert_eq!(location(&denied), Some("/unauthorized"));

    // The backend failing counts as a denial.
    let failed = app
        .oneshot(get("/apps/explode", &[(SessionCookie::AccessToken, &valid)]))
        .await?;
    assert_eq!(location(&failed), Some("/unauthorized"));
    Ok(())
}

#[tokio::test]
async fn service_routes_are_not_guarded() -> Result<()> {
    let backend = MockBackend::start().await?;
    let app = console(&backend, Canned::new(Some(false)));

    let health = app.clone().oneshot(get("/health", &[])).await?;
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(json_body(health).await?["data"]["status"], "ok");

    let info = app.clone().oneshot(get("/info", &[])).await?;
    assert_eq!(info.status(), StatusCode::OK);
    assert_eq!(json_body(info).await?["data"]["backend"], backend.base_url.as_str());

    let logout = app
        .oneshot(Request::post("/logout").body(Body::empty())?)
        .await?;
    assert_eq!(logout.status(), StatusCode::OK);
    assert_eq!(set_cookies(&logout).len(), SessionCookie::ALL.len());
    Ok(())
}

#[tokio::test]
async fn health_reports_an_unreachable_backend() -> Result<()> {
    let backend = MockBackend::unreachable();
    let app = console(&backend, Canned::new(Some(true)));

    let response = app.oneshot(get("/health", &[])).await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await?["data"]["status"], "degraded");
    Ok(())
}

fn login_request(email: &str, password: &str) -> Result<Request<Body>> {
    Ok(Request::post("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"email": email, "password": password}).to_string()))?)
}

#[tokio::test]
async fn login_sets_session_cookies_and_next_step() -> Result<()> {
    let backend = MockBackend::start().await?;
    let app = console(&backend, Canned::new(Some(true)));

    let response = app.clone().oneshot(login_request("dpo@example.com", "secret")?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("access_token=ey")));
    assert!(cookies.iter().any(|c| c.starts_with("email=dpo@example.com;")));
    assert!(cookies.iter().any(|c| c.starts_with("isNotOrgSetup=;") && c.contains("Max-Age=0")));
    let body = json_body(response).await?;
    assert_eq!(body["data"]["outcome"], "ready");
    assert_eq!(body["data"]["redirect"], "/apps");

    let response = app.oneshot(login_request("fresh@example.com", "secret")?).await?;
    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("isNotOrgSetup=true")));
    let body = json_body(response).await?;
    assert_eq!(body["data"]["outcome"], "org_setup");
    assert_eq!(body["data"]["redirect"], "/org-setup");
    Ok(())
}

#[tokio::test]
async fn rejected_login_keeps_the_backend_message() -> Result<()> {
    let backend = MockBackend::start().await?;
    let app = console(&backend, Canned::new(Some(true)));

    let response = app.oneshot(login_request("dpo@example.com", "wrong")?).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await?;
    assert_eq!(body["message"], "Invalid credentials");
    assert_eq!(body["status"], 401);
    assert_eq!(body["code"], "UNAUTHORIZED");
    Ok(())
}

#[tokio::test]
async fn access_helpers_read_permissions_and_batches() -> Result<()> {
    let backend = MockBackend::start().await?;
    let client = backend.client(Some(&token(600)));

    let permissions = PermissionSet::fetch(&client).await?;
    assert!(permissions.can_write("/apps/data-element/de-1"));
    assert!(!permissions.can_write("/apps/get-started/step-2"));
    assert!(permissions.can_read("/apps/get-started/step-2"));

    let paths = vec!["/apps/data-element".to_string(), "/apps/grievances".to_string()];
    let batch = batch_check(&client, &paths, Action::Read).await?;
    assert_eq!(batch.get("/apps/data-element"), Some(&true));
    assert_eq!(batch.get("/apps/grievances"), Some(&false));
    Ok(())
}
