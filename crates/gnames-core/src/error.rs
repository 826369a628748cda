use thiserror::Error;

/// Infrastructure failures from attachment, image loading and configuration.
///
/// A search never produces one of these; see `SearchFailure`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("No running process matches {0}")]
    ProcessNotFound(String),

    #[error("Cannot attach to process: {0}")]
    ProcessOpenFailed(String),

    #[error("Main module not found: {0}")]
    ModuleNotFound(String),

    #[error("Memory read failed at {address:#x}: {message}")]
    MemoryReadFailed { address: u64, message: String },

    #[error("Invalid byte pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid search configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Missing file, as opposed to an unreadable or malformed one
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    pub(crate) fn read_failed(address: u64, message: impl Into<String>) -> Self {
        Error::MemoryReadFailed {
            address,
            message: message.into(),
        }
    }
}
