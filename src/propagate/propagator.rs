use chrono::{DateTime, Utc};
use sgp4::Constants;

use crate::elements::ElementSet;
use crate::frames::{Frame, StateVector};

use super::error::PropagationError;

/// Propagate an element set to an instant. Pure and deterministic: no state
/// survives between calls, identical inputs yield identical output. The
/// result is tagged with the model's native TEME inertial frame; callers
/// wanting another frame go through the transform engine.
///
/// Accuracy degrades with distance from the element epoch (roughly two
/// weeks of useful validity); inputs outside that window are not rejected.
pub fn propagate(set: &ElementSet, at: DateTime<Utc>) -> Result<StateVector, PropagationError> {
    let constants = Constants::from_elements(&set.elements)
        .map_err(|e| PropagationError::Elements(e.to_string()))?;

    let minutes = set
        .elements
        .datetime_to_minutes_since_epoch(&at.naive_utc())
        .map_err(|e| PropagationError::Epoch(e.to_string()))?;

    let prediction = constants.propagate(minutes)?;

    Ok(StateVector::new(
        Frame::Teme,
        at,
        prediction.position,
        prediction.velocity,
    ))
}
