use std::sync::Arc;

use hookline_events::WebhookSystem;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: the config is behind an `Arc` and every webhook
/// service holds its dependencies behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (JWT settings are read by the auth extractor).
    pub config: Arc<ServerConfig>,
    /// Subscription registry, delivery engine, bus and retry scheduler.
    pub webhooks: WebhookSystem,
}
