//! Errors for AIS viewer
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AisViewerError {
    #[error("Serialization error")]
    SerdeError(#[from] serde_json::Error),

    #[error("Configuration error")]
    ConfigError(#[from] config::ConfigError),

    #[error("WebSocket error")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("IO error")]
    IoError(#[from] std::io::Error),

    #[error("Invalid MMSI: {0}")]
    InvalidMmsi(String),

    #[error("Invalid data age: {0} minutes")]
    InvalidAge(u8),

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },
}
