use std::env;

/// Startup configuration, read from the environment exactly once. Nothing
/// else in the crate touches ambient environment state.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Namespace the deployment runs under; shown in logs only.
    pub app_id: String,
    /// Name of the shared result collection.
    pub results_collection: String,
    /// Pre-issued auth token; when absent the store mints an anonymous uid.
    pub initial_auth_token: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            app_id: env::var("TALLY_APP_ID").unwrap_or_else(|_| "default-app-id".to_string()),
            results_collection: env::var("TALLY_RESULTS_COLLECTION")
                .unwrap_or_else(|_| "results".to_string()),
            initial_auth_token: env::var("TALLY_AUTH_TOKEN").ok(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_id: "default-app-id".to_string(),
            results_collection: "results".to_string(),
            initial_auth_token: None,
        }
    }
}
