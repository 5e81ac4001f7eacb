use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Transport-level failure: connection refused, DNS failure, timeout.
    #[error("Network error: {0}")]
    Network(String),

    /// The backing store or remote service refused the operation because a
    /// capacity or usage limit was reached.
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Audio output error: {0}")]
    Audio(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the error came from the transport rather than the remote peer.
    pub fn is_network(&self) -> bool {
        matches!(self, BridgeError::Network(_))
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, BridgeError::QuotaExceeded(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
