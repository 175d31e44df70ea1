use thiserror::Error;

/// Domain-typed ERP failures. Transport details collapse into the variant the
/// orchestrator actually branches on.
#[derive(Debug, Error)]
pub enum ErpError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("authentication rejected by ERP")]
    Auth,

    #[error("ERP request timed out")]
    Timeout,

    #[error("ERP transport error: {0}")]
    Transport(String),

    #[error("ERP response parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ErpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ErpError::Timeout
        } else if err.is_decode() {
            ErpError::Parse(err.to_string())
        } else {
            ErpError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ErpError {
    fn from(err: serde_json::Error) -> Self {
        ErpError::Parse(err.to_string())
    }
}

/// Write-back failure after the concurrency-token retry loop gave up.
/// Non-fatal to the verification outcome by contract.
#[derive(Debug, Error)]
#[error("ERP write-back failed after {attempts} attempt(s): {source}")]
pub struct WriteBackError {
    pub attempts: u32,
    #[source]
    pub source: ErpError,
}

pub type Result<T> = std::result::Result<T, ErpError>;
