use chrono::{DateTime, Utc};
use sgp4::Elements;

use super::error::StoreError;

/// One object's orbital-element snapshot. Immutable once stored; a refresh
/// inserts a superseding set for the same catalog identifier.
#[derive(Debug)]
pub struct ElementSet {
    pub norad_id: u32,
    pub name: String,
    pub line1: String,
    pub line2: String,
    pub elements: Elements,
}

impl ElementSet {
    /// Parse a two-line element set, with an optional leading name line.
    pub fn from_tle(
        name: Option<String>,
        line1: &str,
        line2: &str,
    ) -> Result<Self, StoreError> {
        let elements = Elements::from_tle(name.clone(), line1.as_bytes(), line2.as_bytes())
            .map_err(|e| StoreError::InvalidTle {
                name: name.clone().unwrap_or_else(|| "unnamed".to_string()),
                message: e.to_string(),
            })?;

        let name = elements
            .object_name
            .clone()
            .unwrap_or_else(|| format!("NORAD {}", elements.norad_id));

        Ok(Self {
            norad_id: elements.norad_id as u32,
            name,
            line1: line1.to_string(),
            line2: line2.to_string(),
            elements,
        })
    }

    /// The reference instant the elements apply to.
    pub fn epoch(&self) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(self.elements.datetime, Utc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{LEO_LINE1, LEO_LINE2};

    #[test]
    fn parses_tle_with_name() {
        let set =
            ElementSet::from_tle(Some("TESTSAT 1".to_string()), LEO_LINE1, LEO_LINE2).unwrap();
        assert_eq!(set.norad_id, 25544);
        assert_eq!(set.name, "TESTSAT 1");
        assert_eq!(set.epoch().to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn parses_tle_without_name() {
        let set = ElementSet::from_tle(None, LEO_LINE1, LEO_LINE2).unwrap();
        assert_eq!(set.name, "NORAD 25544");
    }

    #[test]
    fn rejects_garbage_lines() {
        let err = ElementSet::from_tle(None, "not a tle", "also not a tle").unwrap_err();
        assert!(matches!(err, StoreError::InvalidTle { .. }));
    }
}
