use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;

use super::access::AccessChecker;
use crate::auth;
use crate::config::GuardConfig;
use crate::session::{clear_cookie_header, Session, SessionCookie};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect { location: String, clear_session: bool },
}

impl GuardDecision {
    fn redirect(location: &str) -> Self {
        GuardDecision::Redirect {
            location: location.to_string(),
            clear_session: false,
        }
    }
}

/// State shared by every request passing through [`route_guard`].
#[derive(Clone)]
pub struct GuardState {
    pub config: Arc<GuardConfig>,
    pub checker: Arc<dyn AccessChecker>,
}

impl GuardState {
    pub fn new(config: GuardConfig, checker: Arc<dyn AccessChecker>) -> Self {
        Self {
            config: Arc::new(config),
            checker,
        }
    }
}

fn under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    path == prefix || path.starts_with(&format!("{}/", prefix))
}

/// Decide what happens to a navigation to `path`, in priority order.
///
/// `now` is seconds since the epoch. The token is only decoded locally to
/// catch expiry early; the access check against the backend is the
/// authorization decision and fails closed.
pub async fn evaluate(
    config: &GuardConfig,
    session: &Session,
    path: &str,
    now: i64,
    checker: &dyn AccessChecker,
) -> GuardDecision {
    if config.public_prefixes.iter().any(|prefix| under(path, prefix)) {
        return GuardDecision::Allow;
    }

    let token = match session.bearer_token() {
        Some(token) => match auth::check_expiry_at(token, now) {
            Ok(_) => Some(token),
            Err(e) => {
                tracing::info!("Session token rejected on {}: {}", path, e);
                None
            }
        },
        None => None,
    };

    let Some(token) = token else {
        if path == config.login_path {
            return GuardDecision::Allow;
        }
        return GuardDecision::Redirect {
            location: config.login_path.clone(),
            clear_session: true,
        };
    };

    let in_app = under(path, &config.app_prefix);

    if in_app && session.is_not_org_setup {
        return GuardDecision::redirect(&config.org_setup_path);
    }

    if in_app && session.is_not_password_set {
        return GuardDecision::redirect(&config.password_reset_path);
    }

    if in_app {
        return match checker.check(token, path).await {
            Ok(true) => GuardDecision::Allow,
            Ok(false) => {
                tracing::warn!("Access denied to {}", path);
                GuardDecision::redirect(&config.unauthorized_path)
            }
            Err(e) => {
                tracing::warn!("Access check for {} failed: {}", path, e);
                GuardDecision::redirect(&config.unauthorized_path)
            }
        };
    }

    if path == config.login_path || path == "/" {
        return GuardDecision::redirect(&config.landing_path);
    }

    GuardDecision::Allow
}

/// Route guard middleware. Allowed requests carry their [`Session`] as an
/// extension for handlers to use.
pub async fn route_guard(State(state): State<GuardState>, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let session = Session::from_headers(request.headers());
    let now = Utc::now().timestamp();

    match evaluate(&state.config, &session, &path, now, state.checker.as_ref()).await {
        GuardDecision::Allow => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        GuardDecision::Redirect {
            location,
            clear_session,
        } => {
            tracing::debug!("Redirecting {} to {}", path, location);
            let mut response = Redirect::temporary(&location).into_response();
            if clear_session {
                for cookie in SessionCookie::ALL {
                    if let Ok(value) = HeaderValue::from_str(&clear_cookie_header(cookie, state.config.secure_cookies)) {
                        response.headers_mut().append(header::SET_COOKIE, value);
                    }
                }
            }
            response
        }
    }
}
