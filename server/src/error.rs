use crate::room::RoomId;
use thiserror::Error;

/// Errors surfaced by the server runtime
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Room {0} is no longer running")]
    RoomClosed(RoomId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Server is shutting down")]
    Shutdown,
}
