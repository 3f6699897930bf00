use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub app: AppVariant,
    pub client: ClientConfig,
    pub guard: GuardConfig,
    pub table: TableConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Which front-end this console stands in for. The portal variant talks to
/// the customer backend and sends the tenant header on every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppVariant {
    Admin,
    Portal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    /// Sent as `df-id` when present.
    pub df_id: Option<String>,
    pub request_timeout_secs: u64,
    pub upload_chunk_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    pub login_path: String,
    pub org_setup_path: String,
    pub password_reset_path: String,
    pub unauthorized_path: String,
    pub landing_path: String,
    /// Paths under this prefix need an authenticated, provisioned and authorized session.
    pub app_prefix: String,
    pub public_prefixes: Vec<String>,
    pub access_check_endpoint: String,
    pub secure_cookies: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    pub default_rows_per_page: u32,
    pub rows_per_page_options: Vec<u32>,
    pub search_debounce_ms: u64,
    pub visible_pages: u32,
    pub skeleton_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl TableConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            org_setup_path: "/org-setup".to_string(),
            password_reset_path: "/reset-password".to_string(),
            unauthorized_path: "/unauthorized".to_string(),
            landing_path: "/apps".to_string(),
            app_prefix: "/apps".to_string(),
            public_prefixes: vec!["/accept-invite".to_string(), "/set-password".to_string()],
            access_check_endpoint: "/auth/check-access".to_string(),
            secure_cookies: false,
        }
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            default_rows_per_page: 20,
            rows_per_page_options: vec![10, 20, 50, 100],
            search_debounce_ms: 500,
            visible_pages: 3,
            skeleton_rows: 20,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("CMP_APP") {
            self.app = match v.as_str() {
                "portal" | "customer" => AppVariant::Portal,
                _ => AppVariant::Admin,
            };
        }

        // Client overrides
        let variant_url = match self.app {
            AppVariant::Admin => env::var("NEXT_PUBLIC_ADMIN_URL"),
            AppVariant::Portal => env::var("NEXT_PUBLIC_CUSTOMER_URL"),
        };
        if let Ok(v) = variant_url {
            self.client.base_url = v;
        }
        if let Ok(v) = env::var("CMP_BASE_URL") {
            self.client.base_url = v;
        }
        if self.app == AppVariant::Portal {
            self.client.df_id = env::var("NEXT_PUBLIC_DF_ID").ok().filter(|v| !v.is_empty());
        }
        if let Ok(v) = env::var("CMP_REQUEST_TIMEOUT_SECS") {
            self.client.request_timeout_secs = v.parse().unwrap_or(self.client.request_timeout_secs);
        }
        if let Ok(v) = env::var("CMP_UPLOAD_CHUNK_BYTES") {
            self.client.upload_chunk_bytes = v.parse().unwrap_or(self.client.upload_chunk_bytes);
        }

        // Guard overrides
        if let Ok(v) = env::var("CMP_LOGIN_PATH") {
            self.guard.login_path = v;
        }
        if let Ok(v) = env::var("CMP_LANDING_PATH") {
            self.guard.landing_path = v;
        }
        if let Ok(v) = env::var("CMP_APP_PREFIX") {
            self.guard.app_prefix = v;
        }
        if let Ok(v) = env::var("CMP_PUBLIC_PREFIXES") {
            self.guard.public_prefixes = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("CMP_SECURE_COOKIES") {
            self.guard.secure_cookies = v.parse().unwrap_or(self.guard.secure_cookies);
        }

        // Table overrides
        if let Ok(v) = env::var("CMP_DEFAULT_ROWS_PER_PAGE") {
            self.table.default_rows_per_page = v.parse().unwrap_or(self.table.default_rows_per_page);
        }
        if let Ok(v) = env::var("CMP_SEARCH_DEBOUNCE_MS") {
            self.table.search_debounce_ms = v.parse().unwrap_or(self.table.search_debounce_ms);
        }

        // Server overrides
        if let Some(port) = env::var("CMP_CONSOLE_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }
        if let Ok(v) = env::var("CMP_CORS_ORIGINS") {
            self.server.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        self
    }

    /// Local defaults, before any environment override.
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            app: AppVariant::Admin,
            client: ClientConfig {
                base_url: "http://localhost:8000".to_string(),
                df_id: None,
                request_timeout_secs: 30,
                upload_chunk_bytes: 64 * 1024,
            },
            guard: GuardConfig::default(),
            table: TableConfig::default(),
            server: ServerConfig {
                port: 3000,
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string()],
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            app: AppVariant::Admin,
            client: ClientConfig {
                base_url: "https://staging-api.example.com".to_string(),
                df_id: None,
                request_timeout_secs: 15,
                upload_chunk_bytes: 64 * 1024,
            },
            guard: GuardConfig {
                secure_cookies: true,
                ..GuardConfig::default()
            },
            table: TableConfig::default(),
            server: ServerConfig {
                port: 3000,
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            app: AppVariant::Admin,
            client: ClientConfig {
                base_url: "https://api.example.com".to_string(),
                df_id: None,
                request_timeout_secs: 10,
                upload_chunk_bytes: 256 * 1024,
            },
            guard: GuardConfig {
                secure_cookies: true,
                ..GuardConfig::default()
            },
            table: TableConfig::default(),
            server: ServerConfig {
                port: 3000,
                enable_cors: false,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}
