mod error;
mod transform;
mod types;

pub use error::TransformError;
pub use transform::{transform, Context};
pub use types::{Frame, Observer, StateVector};

/// Earth rotation rate, rad/s.
pub const EARTH_ROTATION_RAD_S: f64 = 7.292_115e-5;

/// WGS-84 equatorial radius, km.
pub const WGS84_A_KM: f64 = 6378.137;

/// WGS-84 first eccentricity squared.
pub const WGS84_E2: f64 = 0.006_694_379_990_14;
