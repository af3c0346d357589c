use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::elements::ElementStore;
use crate::frames::{transform, Context, Frame, Observer, StateVector, TransformError};
use crate::passes::{passes, PassError, PassEvent};
use crate::propagate::{propagate, PropagationError};

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("No element set loaded for satellite {0}")]
    UnknownSatellite(u32),
    #[error("Sample step must be positive, got {0}")]
    InvalidStep(Duration),
    #[error("Propagation for satellite {norad_id} failed: {source}")]
    Propagation {
        norad_id: u32,
        source: PropagationError,
    },
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Pass(#[from] PassError),
}

/// One-shot computations against the element store. Every call resolves its
/// satellite, propagates, and transforms on demand; nothing is cached here.
pub struct Query {
    store: Arc<ElementStore>,
}

impl Query {
    pub fn new(store: Arc<ElementStore>) -> Self {
        Self { store }
    }

    /// State of one satellite at one instant, in the requested frame.
    pub fn get_state(
        &self,
        norad_id: u32,
        at: DateTime<Utc>,
        frame: Frame,
        observer: Option<Observer>,
    ) -> Result<StateVector, QueryError> {
        let set = self
            .store
            .find(norad_id)
            .ok_or(QueryError::UnknownSatellite(norad_id))?;
        let teme = propagate(&set, at)
            .map_err(|source| QueryError::Propagation { norad_id, source })?;
        let ctx = match observer {
            Some(observer) => Context::with_observer(observer),
            None => Context::bare(),
        };
        Ok(transform(&teme, frame, &ctx)?)
    }

    /// Inertial trajectory samples over `[start, end]` at a fixed step.
    /// The end instant is included when the step lands on it exactly.
    pub fn get_orbit_path(
        &self,
        norad_id: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<StateVector>, QueryError> {
        if step <= Duration::zero() {
            return Err(QueryError::InvalidStep(step));
        }
        let set = self
            .store
            .find(norad_id)
            .ok_or(QueryError::UnknownSatellite(norad_id))?;

        let mut path = Vec::new();
        let mut cursor = start;
        while cursor <= end {
            let state = propagate(&set, cursor)
                .map_err(|source| QueryError::Propagation { norad_id, source })?;
            path.push(state);
            cursor += step;
        }
        Ok(path)
    }

    /// Visibility windows for one satellite over one observer.
    pub fn get_passes(
        &self,
        norad_id: u32,
        observer: Observer,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<PassEvent>, QueryError> {
        let set = self
            .store
            .find(norad_id)
            .ok_or(QueryError::UnknownSatellite(norad_id))?;
        let events = passes(&set, observer, start, end, step)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::leo_set;

    fn query_with_leo() -> Query {
        let store = Arc::new(ElementStore::new(Duration::hours(1)));
        store.put("stations", leo_set());
        Query::new(store)
    }

    #[test]
    fn state_resolves_by_catalog_number() {
        let query = query_with_leo();
        let at = leo_set().epoch();
        let state = query.get_state(25544, at, Frame::Geodetic, None).unwrap();
        assert_eq!(state.frame, Frame::Geodetic);
        // altitude component of a low orbit
        assert!(state.position_km[2] > 200.0 && state.position_km[2] < 800.0);
    }

    #[test]
    fn unknown_satellite_is_reported_with_its_id() {
        let query = query_with_leo();
        let err = query
            .get_state(99999, leo_set().epoch(), Frame::Teme, None)
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownSatellite(99999)));
    }

    #[test]
    fn observer_frames_require_an_observer() {
        let query = query_with_leo();
        let err = query
            .get_state(25544, leo_set().epoch(), Frame::Enu, None)
            .unwrap_err();
        assert!(matches!(err, QueryError::Transform(_)));
    }

    #[test]
    fn orbit_path_covers_the_window_inclusively() {
        let query = query_with_leo();
        let start = leo_set().epoch();
        let end = start + Duration::minutes(10);
        let path = query
            .get_orbit_path(25544, start, end, Duration::minutes(1))
            .unwrap();
        assert_eq!(path.len(), 11);
        assert_eq!(path[0].at, start);
        assert_eq!(path[10].at, end);
        assert!(path.iter().all(|s| s.frame == Frame::Teme));
    }

    #[test]
    fn zero_step_orbit_path_is_rejected() {
        let query = query_with_leo();
        let start = leo_set().epoch();
        let err = query
            .get_orbit_path(25544, start, start + Duration::hours(1), Duration::zero())
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidStep(_)));
    }

    #[test]
    fn passes_surface_matches_the_finder() {
        let query = query_with_leo();
        let start = leo_set().epoch();
        let observer = Observer::new(51.6, 0.0, 0.0).with_min_elevation(5.0);
        let events = query
            .get_passes(25544, observer, start, start + Duration::hours(24), Duration::seconds(60))
            .unwrap();
        assert!(!events.is_empty());
        for event in &events {
            assert!(event.max_elevation_deg >= 5.0);
        }
    }
}
