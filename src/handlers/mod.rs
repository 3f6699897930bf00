// Console handlers
//
// Public: service info, health, login/logout and the guard's landing pages.
// Apps: everything under the app prefix; the route guard has already
// authorized the path before these run.

pub mod apps;
pub mod root;
pub mod session;

use std::sync::Arc;

use crate::client::ApiClient;
use crate::config::AppConfig;

/// Shared by all handlers through an `Extension` layer.
#[derive(Clone, Debug)]
pub struct ConsoleState {
    /// Backend client without a session; handlers act for the caller via
    /// [`ApiClient::for_token`].
    pub client: ApiClient,
    pub config: Arc<AppConfig>,
}

impl ConsoleState {
    pub fn new(client: ApiClient, config: AppConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }
}
