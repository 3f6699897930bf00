use axum::{
    extract::Extension,
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::ConsoleState;
use crate::auth::{self, LoginOutcome};
use crate::config::GuardConfig;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::session::{clear_cookie_header, set_cookie_header, MemorySession, Session, SessionCookie, SessionStore};

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

fn next_path(config: &GuardConfig, outcome: LoginOutcome) -> &str {
    match outcome {
        LoginOutcome::ResetPassword => &config.password_reset_path,
        LoginOutcome::OrgSetup => &config.org_setup_path,
        LoginOutcome::Ready => &config.landing_path,
    }
}

/// POST /login - Exchange credentials for session cookies
///
/// Expected Output:
/// ```json
/// { "success": true, "data": { "outcome": "org_setup", "redirect": "/org-setup" } }
/// ```
pub async fn login(Extension(state): Extension<ConsoleState>, Json(form): Json<LoginForm>) -> Result<Response, ApiError> {
    if form.email.trim().is_empty() || form.password.is_empty() {
        return Err(ApiError::InvalidRequest("email and password are required".to_string()));
    }

    let answer = auth::login(&state.client, form.email.trim(), &form.password).await?;

    let cookies = MemorySession::new();
    cookies.set(SessionCookie::Email, form.email.trim())?;
    let outcome = answer.store(&cookies)?;

    let guard = &state.config.guard;
    let redirect = next_path(guard, outcome);
    tracing::info!("Login for {} succeeded, next: {}", form.email.trim(), redirect);

    let mut headers = HeaderMap::new();
    for cookie in SessionCookie::ALL {
        let line = match cookies.get(cookie) {
            Some(value) => set_cookie_header(cookie, &value, guard.secure_cookies),
            None => clear_cookie_header(cookie, guard.secure_cookies),
        };
        if let Ok(value) = HeaderValue::from_str(&line) {
            headers.append(header::SET_COOKIE, value);
        }
    }

    let body = ApiResponse::success(json!({
        "outcome": outcome,
        "redirect": redirect,
    }));
    Ok((headers, body).into_response())
}

/// POST /logout - Expire every session cookie
pub async fn logout(Extension(state): Extension<ConsoleState>) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    for cookie in SessionCookie::ALL {
        if let Ok(value) = HeaderValue::from_str(&clear_cookie_header(cookie, state.config.guard.secure_cookies)) {
            headers.append(header::SET_COOKIE, value);
        }
    }
    let redirect = state.config.guard.login_path.clone();
    (headers, ApiResponse::success(json!({ "redirect": redirect })))
}

fn page(name: &str, session: Option<&Session>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "page": name,
        "email": session.and_then(|s| s.email.clone()),
    })))
}

/// GET /login
pub async fn login_page() -> ApiResult<Value> {
    page("login", None)
}

/// GET /unauthorized
pub async fn unauthorized_page(session: Option<Extension<Session>>) -> ApiResult<Value> {
    page("unauthorized", session.as_ref().map(|Extension(s)| s))
}

/// GET /org-setup
pub async fn org_setup_page(session: Option<Extension<Session>>) -> ApiResult<Value> {
    page("org-setup", session.as_ref().map(|Extension(s)| s))
}

/// GET /reset-password
pub async fn reset_password_page(session: Option<Extension<Session>>) -> ApiResult<Value> {
    page("reset-password", session.as_ref().map(|Extension(s)| s))
}
