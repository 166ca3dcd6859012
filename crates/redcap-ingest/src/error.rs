use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("record fetch failed: {0}")]
    Fetch(String),
    #[error("export is not a JSON array of records")]
    NotAnArray,
}

pub type Result<T> = std::result::Result<T, IngestError>;
