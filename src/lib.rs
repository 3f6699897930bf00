pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod debounce;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod resource;
pub mod session;
pub mod table;

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use handlers::ConsoleState;
use middleware::{route_guard, AccessChecker, GuardState};

/// Console router: guarded pages and lists, plus the unguarded service routes.
pub fn app(state: ConsoleState, checker: Arc<dyn AccessChecker>) -> Router {
    let config = state.config.clone();
    let guard = GuardState::new(config.guard.clone(), checker);
    let app_prefix = config.guard.app_prefix.trim_end_matches('/');

    let guarded = Router::new()
        .route(&config.guard.login_path, get(handlers::session::login_page).post(handlers::session::login))
        .route(&config.guard.unauthorized_path, get(handlers::session::unauthorized_page))
        .route(&config.guard.org_setup_path, get(handlers::session::org_setup_page))
        .route(&config.guard.password_reset_path, get(handlers::session::reset_password_page))
        .route(app_prefix, get(handlers::apps::landing))
        .route(&format!("{}/*page", app_prefix), get(handlers::apps::list))
        // Every other path still passes the guard; unknown ones end in 404.
        .fallback(|| async { axum::http::StatusCode::NOT_FOUND })
        .layer(from_fn_with_state(guard, route_guard));

    let mut router = Router::new()
        .route("/health", get(handlers::root::health))
        .route("/info", get(handlers::root::info))
        .route("/logout", post(handlers::session::logout))
        .merge(guarded)
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http());

    if config.server.enable_cors {
        router = router.layer(cors_layer(&config.server.cors_origins));
    }
    router
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()).collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_credentials(true)
}
