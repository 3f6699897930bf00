use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use cmp_console::client::ApiClient;
use cmp_console::handlers::ConsoleState;
use cmp_console::middleware::HttpAccessChecker;
use cmp_console::session::MemorySession;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so NEXT_PUBLIC_ADMIN_URL and CMP_* apply locally.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = cmp_console::config::config().clone();
    tracing::info!(
        "Starting CMP console in {:?} mode for the {:?} app, backend {}",
        config.environment,
        config.app,
        config.client.base_url
    );

    // Handlers act for each caller through `for_token`; the base client has no session.
    let client = ApiClient::new(&config.client, Arc::new(MemorySession::new()))?;
    let checker = Arc::new(HttpAccessChecker::new(client.clone(), config.guard.access_check_endpoint.clone()));

    let port = config.server.port;
    let app = cmp_console::app(ConsoleState::new(client, config), checker);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;

    tracing::info!("CMP console listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
