use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown collection: {0}")]
    UnknownCollection(String),
    #[error("satellite {0} not found")]
    NotFound(u32),
    #[error("invalid tle ({name}): {message}")]
    InvalidTle { name: String, message: String },
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
