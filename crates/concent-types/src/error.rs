use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConcentError {
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("Signature verification failed")]
    SignatureVerification,

    #[error("Message timestamp {timestamp} is too far in the future (tolerance {tolerance}s)")]
    MessageFromFuture { timestamp: i64, tolerance: i64 },

    #[error("Message timestamp {timestamp} is older than the maximum age ({max_age}s)")]
    MessageTooOld { timestamp: i64, max_age: i64 },

    #[error("Unsupported protocol version: client uses {client}, Concent uses {concent}")]
    UnsupportedProtocolVersion { client: String, concent: String },

    #[error("Subtask {subtask_id} already reached final state {state}")]
    SubtaskAlreadyFinished { subtask_id: String, state: String },

    #[error("No applicable transition from {state} for {message_type}: {reason}")]
    NoApplicableTransition {
        state: String,
        message_type: String,
        reason: String,
    },

    #[error("Unknown subtask: {0}")]
    UnknownSubtask(String),

    #[error("Concurrent creation of subtask {0}")]
    CreationConflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Payment backend error: {0}")]
    Payment(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ConcentError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConcentError>;
