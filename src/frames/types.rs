use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{WGS84_A_KM, WGS84_E2};

/// Reference frames the transform engine speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frame {
    /// True-equator mean-equinox-of-date inertial frame, native to SGP4.
    Teme,
    /// Earth-centred Earth-fixed rotating frame (WGS-84 aligned).
    Ecef,
    /// Geodetic latitude/longitude/altitude; position is
    /// `[lat_deg, lon_deg, alt_km]`, velocity stays Earth-fixed Cartesian.
    Geodetic,
    /// Observer-relative east-north-up local tangent frame.
    Enu,
    /// Observer-relative north-east-down local tangent frame.
    Ned,
}

impl Frame {
    pub fn requires_observer(&self) -> bool {
        matches!(self, Frame::Enu | Frame::Ned)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Frame::Teme => "teme",
            Frame::Ecef => "ecef",
            Frame::Geodetic => "geodetic",
            Frame::Enu => "enu",
            Frame::Ned => "ned",
        };
        f.write_str(name)
    }
}

impl FromStr for Frame {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "teme" | "eci" => Ok(Frame::Teme),
            "ecef" => Ok(Frame::Ecef),
            "geodetic" | "lla" => Ok(Frame::Geodetic),
            "enu" => Ok(Frame::Enu),
            "ned" => Ok(Frame::Ned),
            other => Err(format!("unknown frame: {}", other)),
        }
    }
}

/// Derived observer-relative scalars, present only for ENU/NED output.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LookAngles {
    pub range_km: f64,
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
    pub range_rate_km_s: f64,
}

/// Position and velocity in a named frame at an instant. Transient: never
/// persisted, owned by the caller for the duration of one computation. A
/// state vector without its frame/instant tags is meaningless, so they
/// travel together.
#[derive(Debug, Clone, Serialize)]
pub struct StateVector {
    pub frame: Frame,
    pub at: DateTime<Utc>,
    pub position_km: [f64; 3],
    pub velocity_km_s: [f64; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub look: Option<LookAngles>,
}

impl StateVector {
    pub fn new(
        frame: Frame,
        at: DateTime<Utc>,
        position_km: [f64; 3],
        velocity_km_s: [f64; 3],
    ) -> Self {
        Self {
            frame,
            at,
            position_km,
            velocity_km_s,
            look: None,
        }
    }
}

/// A ground location used to compute observer-relative state. Supplied by
/// the caller per request; nothing long-lived is held by the core.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Observer {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    #[serde(default)]
    pub altitude_m: f64,
    #[serde(default = "default_min_elevation")]
    pub min_elevation_deg: f64,
}

fn default_min_elevation() -> f64 {
    10.0
}

impl Observer {
    pub fn new(latitude_deg: f64, longitude_deg: f64, altitude_m: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            altitude_m,
            min_elevation_deg: default_min_elevation(),
        }
    }

    pub fn with_min_elevation(mut self, min_elevation_deg: f64) -> Self {
        self.min_elevation_deg = min_elevation_deg;
        self
    }

    /// Parse a `"lat, lon"` coordinate pair, with an optional altitude.
    pub fn from_coordinates(coordinates: &str, altitude_m: Option<f64>) -> Option<Self> {
        let parts: Vec<_> = coordinates.split(',').map(|s| s.trim()).collect();
        if parts.len() < 2 {
            return None;
        }
        let lat = parts[0].parse().ok()?;
        let lon = parts[1].parse().ok()?;
        Some(Self::new(lat, lon, altitude_m.unwrap_or(0.0)))
    }

    pub fn lat_rad(&self) -> f64 {
        self.latitude_deg.to_radians()
    }

    pub fn lon_rad(&self) -> f64 {
        self.longitude_deg.to_radians()
    }

    pub fn position_ecef_km(&self) -> [f64; 3] {
        let lat = self.lat_rad();
        let lon = self.lon_rad();
        let sin_lat = lat.sin();
        let n = WGS84_A_KM / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        let alt_km = self.altitude_m / 1000.0;
        [
            (n + alt_km) * lat.cos() * lon.cos(),
            (n + alt_km) * lat.cos() * lon.sin(),
            (n * (1.0 - WGS84_E2) + alt_km) * sin_lat,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_names_round_trip() {
        for frame in [Frame::Teme, Frame::Ecef, Frame::Geodetic, Frame::Enu, Frame::Ned] {
            assert_eq!(frame.to_string().parse::<Frame>().unwrap(), frame);
        }
        assert_eq!("ECI".parse::<Frame>().unwrap(), Frame::Teme);
        assert!("barycentric".parse::<Frame>().is_err());
    }

    #[test]
    fn observer_parses_coordinate_pairs() {
        let obs = Observer::from_coordinates("52.0, 13.5", Some(80.0)).unwrap();
        assert_eq!(obs.latitude_deg, 52.0);
        assert_eq!(obs.longitude_deg, 13.5);
        assert_eq!(obs.altitude_m, 80.0);
        assert!(Observer::from_coordinates("52.0", None).is_none());
    }

    #[test]
    fn equatorial_observer_sits_on_the_equatorial_radius() {
        let obs = Observer::new(0.0, 0.0, 0.0);
        let pos = obs.position_ecef_km();
        assert!((pos[0] - WGS84_A_KM).abs() < 1e-6);
        assert!(pos[1].abs() < 1e-9);
        assert!(pos[2].abs() < 1e-9);
    }
}
