use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Narration error: {0}")]
    Narration(#[from] core_narration::NarrationError),

    #[error("Storage error: {0}")]
    Storage(#[from] bridge_traits::BridgeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<core_runtime::Error> for CoreError {
    fn from(err: core_runtime::Error) -> Self {
        match err {
            core_runtime::Error::CapabilityMissing {
                capability,
                message,
            } => CoreError::CapabilityMissing {
                capability,
                message,
            },
            core_runtime::Error::Config(msg) => CoreError::Config(msg),
            core_runtime::Error::Internal(msg) => CoreError::InitializationFailed(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
