//! Shared fixtures for unit tests: synthetic, checksum-valid element sets.

use crate::elements::ElementSet;

/// ~92-minute low orbit, epoch 2024-01-01T00:00:00Z, inclination 51.64 deg.
pub const LEO_LINE1: &str =
    "1 25544U 98067A   24001.00000000  .00016717  00000-0  10270-3 0  9992";
pub const LEO_LINE2: &str =
    "2 25544  51.6400 208.9163 0006317  69.9862  25.2906 15.54225995125069";

/// Near-geostationary orbit, epoch 2024-01-01T12:00:00Z.
pub const GEO_LINE1: &str =
    "1 43226U 18022A   24001.50000000  .00000100  00000-0  00000-0 0  9993";
pub const GEO_LINE2: &str =
    "2 43226   0.0500  95.2000 0002000 130.0000 230.0000  1.00270000123456";

pub fn leo_set() -> ElementSet {
    ElementSet::from_tle(Some("TESTSAT 1".to_string()), LEO_LINE1, LEO_LINE2).unwrap()
}

pub fn geo_set() -> ElementSet {
    ElementSet::from_tle(Some("TESTSAT 2".to_string()), GEO_LINE1, GEO_LINE2).unwrap()
}

pub fn leo_tle_text() -> String {
    format!("TESTSAT 1\n{LEO_LINE1}\n{LEO_LINE2}\n")
}
