//! Connection manager for the backend event source.
//!
//! Owns the single WebSocket to the backend: alternates between two
//! candidate addresses, detects connect timeouts, sends the handshake
//! sequence, and reconnects on a fixed interval with a long cooldown once
//! the attempt budget is spent. Lifecycle changes and inbound frames are
//! delivered as [`ConnectionEvent`]s.

pub mod endpoint;
pub(crate) mod machine;
pub mod manager;
mod pumps;
pub mod types;

pub use endpoint::Endpoint;
pub use manager::ConnectionManager;
pub use types::{ConnectionConfig, ConnectionEvent, ConnectionState};

/// Errors from the connection layer.
///
/// These never reach callers of [`ConnectionManager`]: the driver turns
/// them into state transitions and `send` turns them into `false`.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("connection not open")]
    NotOpen,

    #[error("send buffer full")]
    Backpressure,
}
