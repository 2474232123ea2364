//! Error types for the client.

/// Failures reported through the `error` event.
///
/// None of these are fatal: the client keeps retrying until closed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("VAC host not resolved")]
    HostUnresolved,

    #[error("VAC token required")]
    TokenMissing,

    #[error("transport error: {0}")]
    Transport(String),
}

/// Why a frame was not sent.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("not connected")]
    NotConnected,

    #[error("client closed")]
    Closed,

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("outbound queue full")]
    Backpressure,

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(&'static str),
}

/// Errors loading a static config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
