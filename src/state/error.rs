use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Blob store error: {0}")]
    Blob(#[from] object_store::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request not found: {0}")]
    RequestNotFound(uuid::Uuid),

    #[error("Document not found: {0}/{1}")]
    DocumentNotFound(String, String),

    #[error("Illegal status transition for request {id}: {from} -> {to}")]
    IllegalTransition {
        id: uuid::Uuid,
        from: String,
        to: String,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;
