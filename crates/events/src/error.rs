use hookline_core::error::CoreError;
use hookline_core::secrets::SecretError;

/// Errors surfaced by the webhook services.
///
/// Failures of an individual delivery attempt are never reported through
/// this type; they end up on the delivery record instead.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Publishing an unregistered event type while strict mode is on.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}
