use chrono::{DateTime, Utc};
use serde::Serialize;

/// A predicted visibility interval for one (object, observer) pair.
#[derive(Debug, Clone, Serialize)]
pub struct PassEvent {
    pub norad_id: u32,
    pub satellite: String,
    /// Acquisition of signal (rise). Clipped to the window start when the
    /// object was already up, see `already_risen`.
    pub aos: DateTime<Utc>,
    /// Loss of signal (set). Clipped to the window end when the pass was
    /// still in progress, see `still_up`.
    pub los: DateTime<Utc>,
    /// Time of closest approach (maximum elevation).
    pub tca: DateTime<Utc>,
    pub max_elevation_deg: f64,
    pub aos_azimuth_deg: f64,
    pub los_azimuth_deg: f64,
    pub duration_seconds: i64,
    pub already_risen: bool,
    pub still_up: bool,
}
