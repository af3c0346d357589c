use chrono::{DateTime, Utc};

use super::error::TransformError;
use super::types::{Frame, LookAngles, Observer, StateVector};
use super::{EARTH_ROTATION_RAD_S, WGS84_A_KM, WGS84_E2};

/// Per-request context for a transform. The instant travels inside the
/// state vector; the observer is only needed for local tangent frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct Context {
    pub observer: Option<Observer>,
}

impl Context {
    pub fn bare() -> Self {
        Self { observer: None }
    }

    pub fn with_observer(observer: Observer) -> Self {
        Self {
            observer: Some(observer),
        }
    }
}

/// Convert a state vector to a target frame. Every conversion is a
/// composition of primitive transforms routed through the Earth-fixed
/// frame; a pair without a direct primitive is chained automatically, the
/// caller never has to know.
pub fn transform(
    state: &StateVector,
    target: Frame,
    ctx: &Context,
) -> Result<StateVector, TransformError> {
    if state.frame == target {
        return Ok(state.clone());
    }
    let ecef = to_ecef(state, ctx)?;
    if target == Frame::Ecef {
        return Ok(ecef);
    }
    from_ecef(&ecef, target, ctx)
}

fn observer_for(frame: Frame, ctx: &Context) -> Result<Observer, TransformError> {
    ctx.observer
        .ok_or(TransformError::MissingObserver(frame))
}

fn to_ecef(state: &StateVector, ctx: &Context) -> Result<StateVector, TransformError> {
    let at = state.at;
    match state.frame {
        Frame::Ecef => Ok(state.clone()),
        Frame::Teme => {
            let gmst = gmst(at);
            let position = teme_to_ecef_position(state.position_km, gmst);
            let velocity = teme_to_ecef_velocity(state.position_km, state.velocity_km_s, gmst);
            Ok(StateVector::new(Frame::Ecef, at, position, velocity))
        }
        Frame::Geodetic => {
            let [lat_deg, lon_deg, alt_km] = state.position_km;
            let position = geodetic_to_ecef(lat_deg, lon_deg, alt_km);
            Ok(StateVector::new(Frame::Ecef, at, position, state.velocity_km_s))
        }
        Frame::Enu | Frame::Ned => {
            let observer = observer_for(state.frame, ctx)?;
            let (local_pos, local_vel) = if state.frame == Frame::Ned {
                (ned_to_enu(state.position_km), ned_to_enu(state.velocity_km_s))
            } else {
                (state.position_km, state.velocity_km_s)
            };
            let obs = observer.position_ecef_km();
            let dp = enu_to_ecef_delta(local_pos, observer.lat_rad(), observer.lon_rad());
            let dv = enu_to_ecef_delta(local_vel, observer.lat_rad(), observer.lon_rad());
            Ok(StateVector::new(
                Frame::Ecef,
                at,
                [obs[0] + dp[0], obs[1] + dp[1], obs[2] + dp[2]],
                dv,
            ))
        }
    }
}

fn from_ecef(
    ecef: &StateVector,
    target: Frame,
    ctx: &Context,
) -> Result<StateVector, TransformError> {
    let at = ecef.at;
    match target {
        Frame::Ecef => Ok(ecef.clone()),
        Frame::Teme => {
            let gmst = gmst(at);
            let position = ecef_to_teme_position(ecef.position_km, gmst);
            let velocity = ecef_to_teme_velocity(ecef.position_km, ecef.velocity_km_s, gmst);
            Ok(StateVector::new(Frame::Teme, at, position, velocity))
        }
        Frame::Geodetic => {
            let (lat_deg, lon_deg, alt_km) = ecef_to_geodetic(ecef.position_km)?;
            Ok(StateVector::new(
                Frame::Geodetic,
                at,
                [lat_deg, lon_deg, alt_km],
                ecef.velocity_km_s,
            ))
        }
        Frame::Enu | Frame::Ned => {
            let observer = observer_for(target, ctx)?;
            let obs = observer.position_ecef_km();
            let dr = [
                ecef.position_km[0] - obs[0],
                ecef.position_km[1] - obs[1],
                ecef.position_km[2] - obs[2],
            ];
            let enu_pos = ecef_to_enu_delta(dr, observer.lat_rad(), observer.lon_rad());
            let enu_vel =
                ecef_to_enu_delta(ecef.velocity_km_s, observer.lat_rad(), observer.lon_rad());

            let range_km = norm(enu_pos);
            if range_km < 1e-9 {
                return Err(TransformError::Degenerate(
                    "observer and object coincide".to_string(),
                ));
            }

            let azimuth_deg = enu_pos[0].atan2(enu_pos[1]).to_degrees().rem_euclid(360.0);
            let elevation_deg = (enu_pos[2] / range_km).asin().to_degrees();
            let range_rate_km_s = dot(enu_vel, enu_pos) / range_km;

            let (position, velocity) = if target == Frame::Ned {
                (enu_to_ned(enu_pos), enu_to_ned(enu_vel))
            } else {
                (enu_pos, enu_vel)
            };

            let mut state = StateVector::new(target, at, position, velocity);
            state.look = Some(LookAngles {
                range_km,
                azimuth_deg,
                elevation_deg,
                range_rate_km_s,
            });
            Ok(state)
        }
    }
}

/// Greenwich mean sidereal time at an instant, radians.
fn gmst(at: DateTime<Utc>) -> f64 {
    sgp4::iau_epoch_to_sidereal_time(sgp4::julian_years_since_j2000(&at.naive_utc()))
}

fn teme_to_ecef_position(pos: [f64; 3], gmst: f64) -> [f64; 3] {
    let (sin_g, cos_g) = gmst.sin_cos();
    [
        pos[0] * cos_g + pos[1] * sin_g,
        -pos[0] * sin_g + pos[1] * cos_g,
        pos[2],
    ]
}

fn ecef_to_teme_position(pos: [f64; 3], gmst: f64) -> [f64; 3] {
    let (sin_g, cos_g) = gmst.sin_cos();
    [
        pos[0] * cos_g - pos[1] * sin_g,
        pos[0] * sin_g + pos[1] * cos_g,
        pos[2],
    ]
}

/// Rotate an inertial velocity into the rotating frame, removing the
/// transport term so the result is velocity as seen by an Earth-fixed
/// observer.
fn teme_to_ecef_velocity(pos: [f64; 3], vel: [f64; 3], gmst: f64) -> [f64; 3] {
    let rotated = teme_to_ecef_position(vel, gmst);
    let pos_ecef = teme_to_ecef_position(pos, gmst);
    [
        rotated[0] + EARTH_ROTATION_RAD_S * pos_ecef[1],
        rotated[1] - EARTH_ROTATION_RAD_S * pos_ecef[0],
        rotated[2],
    ]
}

fn ecef_to_teme_velocity(pos: [f64; 3], vel: [f64; 3], gmst: f64) -> [f64; 3] {
    // add the transport term back, then undo the rotation
    let with_transport = [
        vel[0] - EARTH_ROTATION_RAD_S * pos[1],
        vel[1] + EARTH_ROTATION_RAD_S * pos[0],
        vel[2],
    ];
    ecef_to_teme_position(with_transport, gmst)
}

fn geodetic_to_ecef(lat_deg: f64, lon_deg: f64, alt_km: f64) -> [f64; 3] {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let sin_lat = lat.sin();
    let n = WGS84_A_KM / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    [
        (n + alt_km) * lat.cos() * lon.cos(),
        (n + alt_km) * lat.cos() * lon.sin(),
        (n * (1.0 - WGS84_E2) + alt_km) * sin_lat,
    ]
}

/// Ellipsoid-aware inverse: iterative latitude refinement, which converges
/// in a handful of rounds for anything above the Earth's surface.
fn ecef_to_geodetic(pos: [f64; 3]) -> Result<(f64, f64, f64), TransformError> {
    let [x, y, z] = pos;
    let p = (x * x + y * y).sqrt();

    if p < 1e-9 && z.abs() < 1e-9 {
        return Err(TransformError::Degenerate(
            "position at the coordinate origin".to_string(),
        ));
    }

    let lon = y.atan2(x);

    if p < 1e-9 {
        // over a pole; latitude is exact, altitude measured from the polar radius
        let polar_radius = WGS84_A_KM * (1.0 - WGS84_E2).sqrt();
        let lat = if z > 0.0 { 90.0 } else { -90.0 };
        return Ok((lat, lon.to_degrees(), z.abs() - polar_radius));
    }

    let mut lat = (z / (p * (1.0 - WGS84_E2))).atan();
    let mut alt = 0.0;
    for _ in 0..8 {
        let sin_lat = lat.sin();
        let n = WGS84_A_KM / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        alt = p / lat.cos() - n;
        lat = (z / (p * (1.0 - WGS84_E2 * n / (n + alt)))).atan();
    }

    Ok((lat.to_degrees(), lon.to_degrees(), alt))
}

fn ecef_to_enu_delta(d: [f64; 3], lat_rad: f64, lon_rad: f64) -> [f64; 3] {
    let (sin_lat, cos_lat) = lat_rad.sin_cos();
    let (sin_lon, cos_lon) = lon_rad.sin_cos();
    [
        -sin_lon * d[0] + cos_lon * d[1],
        -sin_lat * cos_lon * d[0] - sin_lat * sin_lon * d[1] + cos_lat * d[2],
        cos_lat * cos_lon * d[0] + cos_lat * sin_lon * d[1] + sin_lat * d[2],
    ]
}

fn enu_to_ecef_delta(enu: [f64; 3], lat_rad: f64, lon_rad: f64) -> [f64; 3] {
    let (sin_lat, cos_lat) = lat_rad.sin_cos();
    let (sin_lon, cos_lon) = lon_rad.sin_cos();
    let [e, n, u] = enu;
    [
        -sin_lon * e - sin_lat * cos_lon * n + cos_lat * cos_lon * u,
        cos_lon * e - sin_lat * sin_lon * n + cos_lat * sin_lon * u,
        cos_lat * n + sin_lat * u,
    ]
}

fn enu_to_ned(enu: [f64; 3]) -> [f64; 3] {
    [enu[1], enu[0], -enu[2]]
}

fn ned_to_enu(ned: [f64; 3]) -> [f64; 3] {
    [ned[1], ned[0], -ned[2]]
}

fn norm(v: [f64; 3]) -> f64 {
    dot(v, v).sqrt()
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagate::propagate;
    use crate::test_fixtures::leo_set;
    use chrono::Duration;

    fn assert_close(a: [f64; 3], b: [f64; 3], tol: f64) {
        for i in 0..3 {
            assert!(
                (a[i] - b[i]).abs() < tol,
                "component {}: {} vs {}",
                i,
                a[i],
                b[i]
            );
        }
    }

    fn leo_state() -> StateVector {
        let set = leo_set();
        propagate(&set, set.epoch() + Duration::minutes(10)).unwrap()
    }

    #[test]
    fn same_frame_is_identity() {
        let state = leo_state();
        let out = transform(&state, Frame::Teme, &Context::bare()).unwrap();
        assert_eq!(out.position_km, state.position_km);
    }

    #[test]
    fn teme_ecef_round_trip_is_sub_metre() {
        let state = leo_state();
        let ecef = transform(&state, Frame::Ecef, &Context::bare()).unwrap();
        let back = transform(&ecef, Frame::Teme, &Context::bare()).unwrap();
        assert_close(back.position_km, state.position_km, 1e-3);
        assert_close(back.velocity_km_s, state.velocity_km_s, 1e-6);
    }

    #[test]
    fn direct_chain_matches_explicit_chain() {
        let state = leo_state();
        let direct = transform(&state, Frame::Geodetic, &Context::bare()).unwrap();
        let ecef = transform(&state, Frame::Ecef, &Context::bare()).unwrap();
        let chained = transform(&ecef, Frame::Geodetic, &Context::bare()).unwrap();
        assert_close(direct.position_km, chained.position_km, 1e-9);
    }

    #[test]
    fn geodetic_round_trip_recovers_the_ground_point() {
        let at = Utc::now();
        let geodetic = StateVector::new(Frame::Geodetic, at, [45.0, 30.0, 1.0], [0.0; 3]);
        let ecef = transform(&geodetic, Frame::Ecef, &Context::bare()).unwrap();
        let back = transform(&ecef, Frame::Geodetic, &Context::bare()).unwrap();
        assert!((back.position_km[0] - 45.0).abs() < 1e-6);
        assert!((back.position_km[1] - 30.0).abs() < 1e-6);
        assert!((back.position_km[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn object_at_zenith_has_ninety_degree_elevation() {
        let observer = Observer::new(0.0, 0.0, 0.0);
        let at = Utc::now();
        let state = StateVector::new(
            Frame::Ecef,
            at,
            [WGS84_A_KM + 500.0, 0.0, 0.0],
            [0.0; 3],
        );
        let enu = transform(&state, Frame::Enu, &Context::with_observer(observer)).unwrap();
        let look = enu.look.unwrap();
        assert!((look.elevation_deg - 90.0).abs() < 1e-6);
        assert!((look.range_km - 500.0).abs() < 1e-6);
    }

    #[test]
    fn object_due_north_has_zero_azimuth() {
        let observer = Observer::new(0.0, 0.0, 0.0);
        let at = Utc::now();
        // on the observer's horizon plane, 100 km towards the north pole
        let state = StateVector::new(Frame::Ecef, at, [WGS84_A_KM, 0.0, 100.0], [0.0; 3]);
        let enu = transform(&state, Frame::Enu, &Context::with_observer(observer)).unwrap();
        let look = enu.look.unwrap();
        assert!(look.azimuth_deg.abs() < 1e-6);
        assert!(look.elevation_deg.abs() < 1e-6);
    }

    #[test]
    fn ned_swaps_axes_but_keeps_look_angles() {
        let observer = Observer::new(0.0, 0.0, 0.0);
        let at = Utc::now();
        let state = StateVector::new(
            Frame::Ecef,
            at,
            [WGS84_A_KM + 500.0, 30.0, 40.0],
            [0.0; 3],
        );
        let ctx = Context::with_observer(observer);
        let enu = transform(&state, Frame::Enu, &ctx).unwrap();
        let ned = transform(&state, Frame::Ned, &ctx).unwrap();
        assert!((ned.position_km[0] - enu.position_km[1]).abs() < 1e-9);
        assert!((ned.position_km[1] - enu.position_km[0]).abs() < 1e-9);
        assert!((ned.position_km[2] + enu.position_km[2]).abs() < 1e-9);
        let (el, en) = (ned.look.unwrap(), enu.look.unwrap());
        assert!((el.azimuth_deg - en.azimuth_deg).abs() < 1e-9);
        assert!((el.elevation_deg - en.elevation_deg).abs() < 1e-9);
    }

    #[test]
    fn enu_round_trips_back_to_ecef() {
        let observer = Observer::new(40.0, -75.0, 100.0);
        let state = leo_state();
        let ctx = Context::with_observer(observer);
        let ecef = transform(&state, Frame::Ecef, &Context::bare()).unwrap();
        let enu = transform(&ecef, Frame::Enu, &ctx).unwrap();
        let back = transform(&enu, Frame::Ecef, &ctx).unwrap();
        assert_close(back.position_km, ecef.position_km, 1e-6);
        assert_close(back.velocity_km_s, ecef.velocity_km_s, 1e-9);
    }

    #[test]
    fn observer_frames_require_an_observer() {
        let state = leo_state();
        let err = transform(&state, Frame::Enu, &Context::bare()).unwrap_err();
        assert!(matches!(err, TransformError::MissingObserver(Frame::Enu)));
    }

    #[test]
    fn origin_is_degenerate_for_geodetic() {
        let state = StateVector::new(Frame::Ecef, Utc::now(), [0.0; 3], [0.0; 3]);
        let err = transform(&state, Frame::Geodetic, &Context::bare()).unwrap_err();
        assert!(matches!(err, TransformError::Degenerate(_)));
    }

    #[test]
    fn low_orbit_geodetic_altitude_stays_in_band() {
        let set = leo_set();
        for minutes in [0, 45] {
            let state = propagate(&set, set.epoch() + Duration::minutes(minutes)).unwrap();
            let geodetic = transform(&state, Frame::Geodetic, &Context::bare()).unwrap();
            let alt = geodetic.position_km[2];
            assert!(
                (300.0..600.0).contains(&alt),
                "altitude {} km at epoch+{}min",
                alt,
                minutes
            );
        }
    }
}
