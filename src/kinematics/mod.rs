//! # Kinematics reducer
//!
//! Turns the time-ordered CPA points of one station into along-track kinematics:
//!
//! | quantity | definition |
//! |---|---|
//! | length | `|CPA[0] − CPA[i]|`, relative to the station's first point |
//! | state-vector distance | `|begin − CPA[i]|`, relative to the global begin point |
//! | velocity | `(length[i] − length[i−1]) / (t[i] − t[i−1])`, with `length[−1] = t[−1] = 0` |
//! | lag | `length[i] − (v_begin · t[i] + c)` |
//!
//! The lag intercept `c` is a least-squares fit with the slope held at the begin velocity, over the
//! first quarter of the usable points (or all of them when the quarter holds fewer than four).
//!
//! ## Failure policy
//!
//! A station with fewer than two usable points keeps its lengths and distances but reports
//! velocity and lag as unavailable (`None`). Zero time steps never skip a sample: the step is
//! replaced with `f64::EPSILON` so velocities stay aligned with measurements.
//!
//! The reducer is a pure function of its inputs; rerunning it on the same points, begin point and
//! velocity gives bit-identical results.

pub mod consensus;

use itertools::Itertools;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{JulianDate, Meter, MeterPerSecond, Second};
use crate::projection::ProjectedPoint;
use crate::traj_errors::TrajectoryError;

/// Window of the lag intercept fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LagWindow {
    /// Fraction of the usable points fitted, from the start of the series.
    pub fraction: f64,
    /// Below this many points in the window, every usable point is fitted.
    pub min_points: usize,
}

impl Default for LagWindow {
    fn default() -> Self {
        LagWindow {
            fraction: 0.25,
            min_points: 4,
        }
    }
}

impl LagWindow {
    /// Number of leading points fitted out of `n`.
    pub fn size(&self, n: usize) -> usize {
        let quart = (self.fraction * n as f64).floor() as usize;
        if quart < self.min_points {
            n
        } else {
            quart.min(n)
        }
    }
}

/// Kinematics of one projected measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinematicPoint {
    /// Index of the source measurement in its station.
    pub index: usize,
    /// Timing-corrected offset from the reference epoch (seconds).
    pub time: Second,
    pub jd: JulianDate,
    /// Closest point of approach on the trajectory line (ECI, meters).
    pub cpa: Vector3<f64>,
    /// Along-track length from the station's first point (meters).
    pub length: Meter,
    /// Distance from the trajectory begin point (meters).
    pub state_vector_distance: Meter,
    /// Point-to-point velocity (m/s), `None` when the station lacks usable points.
    pub velocity: Option<MeterPerSecond>,
    /// Deviation from the constant begin-velocity line (meters).
    pub lag: Option<Meter>,
    pub ignored: bool,
}

/// Kinematic series of one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerStationKinematics {
    pub station_id: String,
    pub points: Vec<KinematicPoint>,
    /// Fitted intercept of the lag line (meters), when available.
    pub lag_intercept: Option<Meter>,
}

impl PerStationKinematics {
    /// Points not flagged as bad picks.
    pub fn usable(&self) -> impl Iterator<Item = &KinematicPoint> {
        self.points.iter().filter(|p| !p.ignored)
    }

    pub fn usable_count(&self) -> usize {
        self.usable().count()
    }

    /// `(first, last)` usable points, if the station has at least two.
    pub fn usable_bounds(&self) -> Option<(&KinematicPoint, &KinematicPoint)> {
        let first = self.usable().next()?;
        let last = self.usable().last()?;
        (self.usable_count() >= 2).then_some((first, last))
    }
}

/// Intercept of the line `length = v · t + c` with a fixed slope.
///
/// With the slope held, the least-squares intercept over the fitted window is the mean of
/// `length − v · t`.
///
/// Arguments
/// ---------
/// * `times`, `lengths`: aligned samples, in chronological order.
/// * `velocity`: fixed slope of the line (m/s).
/// * `window`: number of leading samples fitted.
///
/// Errors
/// ------
/// * [`TrajectoryError::InsufficientData`] if no sample is available.
pub fn fit_lag_intercept(
    times: &[Second],
    lengths: &[Meter],
    velocity: MeterPerSecond,
    window: &LagWindow,
) -> Result<Meter, TrajectoryError> {
    let n = times.len().min(lengths.len());
    let size = window.size(n);
    if size == 0 {
        return Err(TrajectoryError::InsufficientData {
            what: "lag intercept",
            needed: 1,
            got: 0,
        });
    }

    let sum: f64 = times
        .iter()
        .zip(lengths)
        .take(size)
        .map(|(t, l)| l - velocity * t)
        .sum();

    Ok(sum / size as f64)
}

/// Point-to-point velocities, aligned with the input samples.
///
/// The first sample is differenced against `(t = 0, length = 0)`. Zero time steps are replaced with
/// `f64::EPSILON`.
pub fn point_velocities(times: &[Second], lengths: &[Meter]) -> Vec<MeterPerSecond> {
    std::iter::once((0.0, 0.0))
        .chain(times.iter().copied().zip(lengths.iter().copied()))
        .tuple_windows()
        .map(|((t_prev, l_prev), (t, l))| {
            let mut dt = t - t_prev;
            if dt == 0.0 {
                dt = f64::EPSILON;
            }
            (l - l_prev) / dt
        })
        .collect()
}

/// Reduce the projected points of one station into its kinematic series.
///
/// Arguments
/// ---------
/// * `station_id`: identifier carried into the result and the log messages.
/// * `points`: projected points in chronological order.
/// * `begin`: global trajectory begin point (ECI, meters).
/// * `v_begin`: begin velocity used as the lag slope (m/s).
/// * `window`: lag intercept window.
///
/// Return
/// ------
/// * The station's [`PerStationKinematics`]. Velocity and lag are `None` for every point when the
///   station has fewer than two usable points.
pub fn reduce_station(
    station_id: &str,
    points: &[ProjectedPoint],
    begin: &Vector3<f64>,
    v_begin: MeterPerSecond,
    window: &LagWindow,
) -> PerStationKinematics {
    let Some(reference) = points.first().map(|p| p.cpa) else {
        return PerStationKinematics {
            station_id: station_id.to_string(),
            points: Vec::new(),
            lag_intercept: None,
        };
    };

    let times: Vec<Second> = points.iter().map(|p| p.time).collect();
    let lengths: Vec<Meter> = points.iter().map(|p| (reference - p.cpa).norm()).collect();

    let usable = points.iter().filter(|p| !p.ignored).count();

    let (velocities, lag_intercept) = if usable < 2 {
        warn!(
            station = station_id,
            usable, "not enough usable points for velocity and lag"
        );
        (None, None)
    } else {
        let (usable_times, usable_lengths): (Vec<Second>, Vec<Meter>) = points
            .iter()
            .zip(&lengths)
            .filter(|(p, _)| !p.ignored)
            .map(|(p, l)| (p.time, *l))
            .unzip();

        let intercept = fit_lag_intercept(&usable_times, &usable_lengths, v_begin, window).ok();
        (Some(point_velocities(&times, &lengths)), intercept)
    };

    let kinematic_points = points
        .iter()
        .enumerate()
        .map(|(i, p)| KinematicPoint {
            index: p.index,
            time: p.time,
            jd: p.jd,
            cpa: p.cpa,
            length: lengths[i],
            state_vector_distance: (begin - p.cpa).norm(),
            velocity: velocities.as_ref().map(|v| v[i]),
            lag: lag_intercept.map(|c| lengths[i] - (v_begin * p.time + c)),
            ignored: p.ignored,
        })
        .collect();

    PerStationKinematics {
        station_id: station_id.to_string(),
        points: kinematic_points,
        lag_intercept,
    }
}
