//! Crate-level error types.
//!
//! [`MirrorError`] unifies every error source (configuration, TLS,
//! WebSocket, JSON, filesystem) behind a single enum so callers can match
//! on the variant they care about while still using the `?` operator.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// Command-line or environment configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Certificates or keys could not be loaded into a TLS client config.
    #[error("tls error: {0}")]
    Tls(String),

    /// A WebSocket operation (connect, send, receive) failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An inbound frame could not be interpreted as a protocol message.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Reading or writing a snapshot file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
