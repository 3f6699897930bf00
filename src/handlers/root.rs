use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde_json::{json, Value};

use super::ConsoleState;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /info - Service description
pub async fn info(Extension(state): Extension<ConsoleState>) -> ApiResult<Value> {
    let config = &state.config;
    Ok(ApiResponse::success(json!({
        "name": "CMP Console",
        "version": env!("CARGO_PKG_VERSION"),
        "app": config.app,
        "backend": state.client.base_url(),
        "endpoints": {
            "login": format!("{} (public)", config.guard.login_path),
            "logout": "/logout (public)",
            "apps": format!("{} (guarded)", config.guard.app_prefix),
            "lists": format!("{}/<page> (guarded, ?page=&rows_per_page=&search=&<filter>=)", config.guard.app_prefix),
        }
    })))
}

/// GET /health - Liveness plus backend reachability
///
/// The backend answering at all (even with an error status) counts as up;
/// only a transport failure marks the console degraded.
pub async fn health(Extension(state): Extension<ConsoleState>) -> impl IntoResponse {
    let now = Utc::now();
    match state.client.call_full("/", Default::default()).await {
        Err(e) if e.status() == 0 => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "backend unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "backend_error": e.to_string(),
                }
            })),
        ),
        _ => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "backend": "ok",
                }
            })),
        ),
    }
}
