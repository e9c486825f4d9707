use crate::config::ValidationError;

/// Core error type for the relay.
///
/// Adapter crates map their specific errors into this type so the lifecycle
/// can treat every failure the same way (startup-fatal vs service-fatal).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("messaging error: {0}")]
    Messaging(String),

    #[error("{service} failed: {reason}")]
    Service {
        service: &'static str,
        reason: String,
    },
}

impl Error {
    pub fn service(service: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::Service {
            service,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
