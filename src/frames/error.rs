use thiserror::Error;

use super::types::Frame;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("target frame {0} requires an observer in the transform context")]
    MissingObserver(Frame),
    #[error("degenerate geometry: {0}")]
    Degenerate(String),
}
