//! Error types for the loopdata service

use crate::units::{Unit, UnitGroup};

/// Errors that can occur in the loopdata service
#[derive(Debug, thiserror::Error)]
pub enum LoopDataError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Unknown observation: {0}")]
    UnknownObservation(String),

    #[error("Cannot convert {from} within {group}")]
    Conversion { from: Unit, group: UnitGroup },

    #[error("Calendar error: {0}")]
    Calendar(String),

    #[error("Historical store error: {0}")]
    History(String),

    #[error("Packet error: {0}")]
    Packet(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for loopdata operations
pub type Result<T> = std::result::Result<T, LoopDataError>;
