use thiserror::Error;

use crate::frames::TransformError;
use crate::propagate::PropagationError;

#[derive(Debug, Error)]
pub enum PassError {
    #[error("propagation error: {0}")]
    Propagation(#[from] PropagationError),
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),
    #[error("sample step must be positive, got {0}")]
    InvalidStep(chrono::Duration),
}
