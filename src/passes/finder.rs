use chrono::{DateTime, Duration, Utc};
use sgp4::Constants;

use crate::elements::ElementSet;
use crate::frames::{transform, Context, Frame, Observer, StateVector, TransformError};
use crate::propagate::PropagationError;

use super::error::PassError;
use super::types::PassEvent;

const FINE_STEP_SECONDS: i64 = 1;
const HORIZON_ELEVATION_DEG: f64 = 0.0;

/// Lazily enumerate visibility passes for one object over an observer.
/// Sampling starts only when the iterator is driven, so truncating early
/// never computes the rest of the window; re-creating the iterator with the
/// same arguments restarts the identical sequence.
pub fn passes<'a>(
    set: &'a ElementSet,
    observer: Observer,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
) -> Result<PassIter<'a>, PassError> {
    if step <= Duration::zero() {
        return Err(PassError::InvalidStep(step));
    }
    let constants = Constants::from_elements(&set.elements)
        .map_err(|e| PropagationError::Elements(e.to_string()))?;
    Ok(PassIter {
        set,
        constants,
        observer,
        ctx: Context::with_observer(observer),
        end,
        step,
        cursor: start,
        start,
        prev: None,
        current: None,
        finished: false,
    })
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: DateTime<Utc>,
    elevation_deg: f64,
    azimuth_deg: f64,
}

struct InProgress {
    aos: DateTime<Utc>,
    aos_azimuth_deg: f64,
    already_risen: bool,
    peak: Sample,
    peak_before: Option<Sample>,
    peak_after: Option<Sample>,
}

pub struct PassIter<'a> {
    set: &'a ElementSet,
    constants: Constants,
    observer: Observer,
    ctx: Context,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
    cursor: DateTime<Utc>,
    prev: Option<Sample>,
    current: Option<InProgress>,
    finished: bool,
}

impl PassIter<'_> {
    fn sample(&self, at: DateTime<Utc>) -> Result<Sample, PassError> {
        let minutes = self
            .set
            .elements
            .datetime_to_minutes_since_epoch(&at.naive_utc())
            .map_err(|e| PropagationError::Epoch(e.to_string()))?;
        let prediction = self
            .constants
            .propagate(minutes)
            .map_err(PropagationError::from)?;
        let teme = StateVector::new(Frame::Teme, at, prediction.position, prediction.velocity);
        let enu = transform(&teme, Frame::Enu, &self.ctx)?;
        let look = enu.look.ok_or_else(|| {
            TransformError::Degenerate("observer-relative transform lost its look angles".to_string())
        })?;
        Ok(Sample {
            at,
            elevation_deg: look.elevation_deg,
            azimuth_deg: look.azimuth_deg,
        })
    }

    /// Bisect a horizon crossing bracketed by two coarse samples down to
    /// one-second resolution.
    fn refine_crossing(
        &self,
        before: DateTime<Utc>,
        after: DateTime<Utc>,
        rising: bool,
    ) -> Result<(DateTime<Utc>, f64), PassError> {
        let mut low = before;
        let mut high = after;

        while (high - low).num_seconds() > FINE_STEP_SECONDS {
            let mid = low + (high - low) / 2;
            let above = self.sample(mid)?.elevation_deg >= HORIZON_ELEVATION_DEG;
            if above == rising {
                high = mid;
            } else {
                low = mid;
            }
        }

        let crossing = self.sample(high)?;
        Ok((high, crossing.azimuth_deg))
    }

    /// Refine the culmination with a parabola through the peak sample and
    /// its two neighbours. Falls back to the raw peak when the pass is too
    /// short to bracket it.
    fn refined_culmination(pass: &InProgress, step: Duration) -> (DateTime<Utc>, f64) {
        let (before, after) = match (pass.peak_before, pass.peak_after) {
            (Some(b), Some(a)) => (b, a),
            _ => return (pass.peak.at, pass.peak.elevation_deg),
        };

        let e0 = before.elevation_deg;
        let e1 = pass.peak.elevation_deg;
        let e2 = after.elevation_deg;
        let denom = e0 - 2.0 * e1 + e2;
        if denom >= 0.0 {
            return (pass.peak.at, pass.peak.elevation_deg);
        }

        let dt = (0.5 * (e0 - e2) / denom).clamp(-1.0, 1.0);
        let offset_ms = (dt * step.num_milliseconds() as f64) as i64;
        let tca = pass.peak.at + Duration::milliseconds(offset_ms);
        let max_elevation = e1 - 0.25 * (e0 - e2) * dt;
        (tca, max_elevation)
    }

    fn close_pass(
        &mut self,
        los: DateTime<Utc>,
        los_azimuth_deg: f64,
        still_up: bool,
    ) -> Option<PassEvent> {
        let pass = self.current.take()?;
        let (tca, max_elevation_deg) = Self::refined_culmination(&pass, self.step);

        if max_elevation_deg < self.observer.min_elevation_deg {
            return None;
        }

        Some(PassEvent {
            norad_id: self.set.norad_id,
            satellite: self.set.name.clone(),
            aos: pass.aos,
            los,
            tca,
            max_elevation_deg,
            aos_azimuth_deg: pass.aos_azimuth_deg,
            los_azimuth_deg,
            duration_seconds: (los - pass.aos).num_seconds(),
            already_risen: pass.already_risen,
            still_up,
        })
    }
}

impl Iterator for PassIter<'_> {
    type Item = Result<PassEvent, PassError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        while self.cursor <= self.end {
            let at = self.cursor;
            self.cursor += self.step;

            let sample = match self.sample(at) {
                Ok(s) => s,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            };
            let visible = sample.elevation_deg > HORIZON_ELEVATION_DEG;
            let prev = self.prev.replace(sample);

            if self.current.is_none() && visible {
                let pass = match prev {
                    Some(prev_sample) => {
                        // rising edge between the two coarse samples
                        match self.refine_crossing(prev_sample.at, at, true) {
                            Ok((aos, aos_az)) => InProgress {
                                aos,
                                aos_azimuth_deg: aos_az,
                                already_risen: false,
                                peak: sample,
                                peak_before: Some(prev_sample),
                                peak_after: None,
                            },
                            Err(e) => {
                                self.finished = true;
                                return Some(Err(e));
                            }
                        }
                    }
                    // already above the horizon at the window start
                    None => InProgress {
                        aos: self.start,
                        aos_azimuth_deg: sample.azimuth_deg,
                        already_risen: true,
                        peak: sample,
                        peak_before: None,
                        peak_after: None,
                    },
                };
                self.current = Some(pass);
            } else if let Some(pass) = self.current.as_mut() {
                if visible {
                    if sample.elevation_deg > pass.peak.elevation_deg {
                        pass.peak_before = prev;
                        pass.peak = sample;
                        pass.peak_after = None;
                    } else if pass.peak_after.is_none()
                        && prev.map_or(false, |p| p.at == pass.peak.at)
                    {
                        pass.peak_after = Some(sample);
                    }
                } else {
                    // falling edge; prev is the last visible sample
                    let bracket_start = prev.map(|p| p.at).unwrap_or(at);
                    match self.refine_crossing(bracket_start, at, false) {
                        Ok((los, los_az)) => {
                            if let Some(event) = self.close_pass(los, los_az, false) {
                                return Some(Ok(event));
                            }
                            // below the elevation threshold; keep scanning
                        }
                        Err(e) => {
                            self.finished = true;
                            return Some(Err(e));
                        }
                    }
                }
            }
        }

        self.finished = true;

        // pass still in progress when the window closed
        if self.current.is_some() {
            let last_azimuth = self.prev.map(|p| p.azimuth_deg).unwrap_or(0.0);
            if let Some(event) = self.close_pass(self.end, last_azimuth, true) {
                return Some(Ok(event));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::leo_set;

    fn observer() -> Observer {
        Observer::new(51.6, 0.0, 0.0).with_min_elevation(5.0)
    }

    fn day_of_passes(min_elevation: f64) -> Vec<PassEvent> {
        let set = leo_set();
        let start = set.epoch();
        let end = start + Duration::hours(24);
        passes(
            &set,
            Observer::new(51.6, 0.0, 0.0).with_min_elevation(min_elevation),
            start,
            end,
            Duration::seconds(60),
        )
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
    }

    #[test]
    fn finds_passes_over_a_day() {
        let found = day_of_passes(5.0);
        assert!(!found.is_empty(), "expected at least one pass in 24h");
        for pass in &found {
            assert!(pass.aos <= pass.tca && pass.tca <= pass.los, "{:?}", pass);
            assert!(pass.duration_seconds > 0);
            assert!(pass.max_elevation_deg >= 5.0);
            assert_eq!(pass.norad_id, 25544);
        }
    }

    #[test]
    fn refined_rise_sits_on_the_horizon() {
        let set = leo_set();
        let start = set.epoch();
        let end = start + Duration::hours(24);
        let obs = observer();
        let first = passes(&set, obs, start, end, Duration::seconds(60))
            .unwrap()
            .next()
            .unwrap()
            .unwrap();

        if !first.already_risen {
            let iter = passes(&set, obs, start, end, Duration::seconds(60)).unwrap();
            let elevation = iter.sample(first.aos).unwrap().elevation_deg;
            assert!(
                elevation.abs() < 0.5,
                "elevation at refined aos: {}",
                elevation
            );
        }
    }

    #[test]
    fn sequence_is_restartable_and_truncatable() {
        let set = leo_set();
        let start = set.epoch();
        let end = start + Duration::hours(24);

        let first_a = passes(&set, observer(), start, end, Duration::seconds(60))
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        let first_b = passes(&set, observer(), start, end, Duration::seconds(60))
            .unwrap()
            .next()
            .unwrap()
            .unwrap();

        assert_eq!(first_a.aos, first_b.aos);
        assert_eq!(first_a.los, first_b.los);
        assert_eq!(first_a.max_elevation_deg, first_b.max_elevation_deg);
    }

    #[test]
    fn window_starting_mid_pass_is_flagged_already_risen() {
        let found = day_of_passes(5.0);
        let pass = &found[0];

        let set = leo_set();
        let end = pass.tca + Duration::hours(2);
        let clipped = passes(&set, observer(), pass.tca, end, Duration::seconds(60))
            .unwrap()
            .next()
            .unwrap()
            .unwrap();

        assert!(clipped.already_risen);
        assert_eq!(clipped.aos, pass.tca);
    }

    #[test]
    fn window_ending_mid_pass_is_flagged_still_up() {
        let found = day_of_passes(5.0);
        let pass = &found[0];

        let set = leo_set();
        let start = pass.aos - Duration::hours(1);
        let clipped = passes(&set, observer(), start, pass.tca, Duration::seconds(60))
            .unwrap()
            .next()
            .unwrap()
            .unwrap();

        assert!(clipped.still_up);
        assert_eq!(clipped.los, pass.tca);
    }

    #[test]
    fn zero_step_is_rejected_up_front() {
        let set = leo_set();
        let start = set.epoch();
        for step in [Duration::zero(), Duration::seconds(-60)] {
            let err = passes(&set, observer(), start, start + Duration::hours(1), step)
                .err()
                .expect("non-positive step must not produce an iterator");
            assert!(matches!(err, PassError::InvalidStep(_)));
        }
    }

    #[test]
    fn passes_below_the_threshold_are_omitted() {
        let all = day_of_passes(0.0);
        let high = day_of_passes(60.0);
        assert!(high.len() <= all.len());
        for pass in &high {
            assert!(pass.max_elevation_deg >= 60.0);
        }
    }

    #[test]
    fn tca_elevation_is_the_pass_maximum() {
        let found = day_of_passes(5.0);
        let set = leo_set();
        let iter = passes(
            &set,
            observer(),
            set.epoch(),
            set.epoch() + Duration::hours(24),
            Duration::seconds(60),
        )
        .unwrap();

        for pass in &found {
            let at_tca = iter.sample(pass.tca).unwrap().elevation_deg;
            let before = iter.sample(pass.tca - Duration::seconds(60)).unwrap();
            let after = iter.sample(pass.tca + Duration::seconds(60)).unwrap();
            // culmination is a local maximum of the elevation profile
            assert!(at_tca >= before.elevation_deg - 0.5, "{:?}", pass);
            assert!(at_tca >= after.elevation_deg - 0.5, "{:?}", pass);
        }
    }
}
