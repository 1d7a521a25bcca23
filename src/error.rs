//! Error types for the screening flow

use thiserror::Error;

/// Errors that can occur while running a screening session
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Stored session record is corrupt: {0}")]
    CorruptRecord(String),

    #[error("Invalid questionnaire form: {0}")]
    InvalidForm(String),

    #[error("Sensor unavailable: {0}")]
    SensorUnavailable(String),

    #[error("No screening session in progress")]
    NoSession,

    #[error("Stage {stage} does not accept {input}")]
    UnexpectedInput { stage: String, input: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown activity: {0}")]
    UnknownActivity(String),

    #[error("Screening {0} is complete; its record is read-only")]
    RecordClosed(String),
}
