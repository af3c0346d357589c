use thiserror::Error;

/// Propagation failure modes. The runtime degeneracies mirror the named
/// SGP4 error conditions one-to-one so callers can react to each, rather
/// than receiving one collapsed "propagation failed". Degeneracies caught
/// while deriving the model constants (decayed orbits, out-of-range epoch
/// eccentricity) surface as `Elements`.
#[derive(Debug, Error)]
pub enum PropagationError {
    #[error("eccentricity out of range: {0}")]
    OutOfRangeEccentricity(String),
    #[error("perturbed eccentricity out of range: {0}")]
    OutOfRangePerturbedEccentricity(String),
    #[error("negative semi-latus rectum (decayed orbit): {0}")]
    NegativeSemiLatusRectum(String),
    #[error("invalid elements: {0}")]
    Elements(String),
    #[error("timestamp not representable relative to epoch: {0}")]
    Epoch(String),
}

impl From<sgp4::Error> for PropagationError {
    fn from(err: sgp4::Error) -> Self {
        let message = err.to_string();
        match err {
            sgp4::Error::OutOfRangeEccentricity { .. } => {
                PropagationError::OutOfRangeEccentricity(message)
            }
            sgp4::Error::OutOfRangePerturbedEccentricity { .. } => {
                PropagationError::OutOfRangePerturbedEccentricity(message)
            }
            sgp4::Error::NegativeSemiLatusRectum { .. } => {
                PropagationError::NegativeSemiLatusRectum(message)
            }
        }
    }
}
