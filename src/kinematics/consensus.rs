//! # Cross-station consensus
//!
//! Combines the per-station kinematic series into the global quantities handed to the orbit stage:
//!
//! * average velocity: mean over stations of `(length[last] − length[first]) / (t[last] − t[first])`,
//! * average ECI position: component-wise mean of every model point of every station,
//! * average and earliest Julian dates over every point,
//! * optionally, a robust begin velocity.
//!
//! ## Robust begin velocity
//!
//! A single outlier station (clock error, weak geometry) biases a global linear fit of
//! state-vector distance against time. The robust estimate excludes one station at a time, pools
//! the `(time, distance)` samples of the others, sorts them by time and fits a line to the earliest
//! half. The candidate with the smallest intercept variance wins. With exactly two stations no
//! exclusion is tried; with a single station there is nothing to compare against and the estimate
//! is [`TrajectoryError::InsufficientData`].

use std::cmp::Ordering;

use itertools::Itertools;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{JulianDate, Meter, MeterPerSecond, Second};
use crate::kinematics::PerStationKinematics;
use crate::traj_errors::TrajectoryError;

/// Least-squares line `y = slope · x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
    /// Variance of the intercept parameter.
    pub intercept_variance: f64,
}

/// Ordinary least-squares line through `(x, y)` samples.
///
/// The intercept variance is `s² · Σx² / (n·Σx² − (Σx)²)` with `s² = SSR / (n − 2)`.
///
/// Errors
/// ------
/// * [`TrajectoryError::InsufficientData`] with fewer than 3 samples.
/// * [`TrajectoryError::DegenerateGeometry`] if every `x` is identical.
pub fn fit_line(samples: &[(f64, f64)]) -> Result<LineFit, TrajectoryError> {
    let n = samples.len();
    if n < 3 {
        return Err(TrajectoryError::InsufficientData {
            what: "line fit",
            needed: 3,
            got: n,
        });
    }

    let nf = n as f64;
    let (sx, sy, sxx, sxy) = samples.iter().fold(
        (0.0, 0.0, 0.0, 0.0),
        |(sx, sy, sxx, sxy), (x, y)| (sx + x, sy + y, sxx + x * x, sxy + x * y),
    );

    let denominator = nf * sxx - sx * sx;
    if denominator.is_nan() || denominator <= f64::EPSILON * nf * sxx {
        return Err(TrajectoryError::DegenerateGeometry { denominator });
    }

    let slope = (nf * sxy - sx * sy) / denominator;
    let intercept = (sy - slope * sx) / nf;

    let ssr: f64 = samples
        .iter()
        .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
        .sum();
    let s2 = ssr / (nf - 2.0);

    Ok(LineFit {
        slope,
        intercept,
        intercept_variance: s2 * sxx / denominator,
    })
}

/// Robust begin velocity and the station exclusion it was obtained with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustVelocity {
    /// Begin velocity (m/s), slope of the winning fit.
    pub velocity: MeterPerSecond,
    /// Intercept of the winning fit (meters).
    pub intercept: Meter,
    /// Standard deviation of the intercept (meters).
    pub intercept_stddev: Meter,
    /// Index of the excluded station, `None` when every station was used.
    pub excluded_station: Option<usize>,
    pub excluded_station_id: Option<String>,
}

/// Usable `(time, state-vector distance)` samples of a station.
fn distance_samples(station: &PerStationKinematics) -> impl Iterator<Item = (Second, Meter)> + '_ {
    station.usable().map(|p| (p.time, p.state_vector_distance))
}

/// Leave-one-station-out robust begin velocity.
///
/// Arguments
/// ---------
/// * `stations`: per-station kinematics, stations without usable points are not counted.
///
/// Return
/// ------
/// * The [`RobustVelocity`] of the candidate fit with the smallest intercept variance.
///
/// Errors
/// ------
/// * [`TrajectoryError::InsufficientData`] with fewer than two stations holding usable points, or
///   when no candidate has 3 points in its earliest half.
pub fn robust_begin_velocity(
    stations: &[PerStationKinematics],
) -> Result<RobustVelocity, TrajectoryError> {
    let active: Vec<usize> = stations
        .iter()
        .positions(|s| s.usable_count() > 0)
        .collect();

    if active.len() < 2 {
        return Err(TrajectoryError::InsufficientData {
            what: "robust begin velocity stations",
            needed: 2,
            got: active.len(),
        });
    }

    let candidates: Vec<Option<usize>> = if active.len() == 2 {
        vec![None]
    } else {
        active.iter().copied().map(Some).collect()
    };

    let mut best: Option<(LineFit, Option<usize>)> = None;
    for excluded in candidates {
        let pooled: Vec<(Second, Meter)> = active
            .iter()
            .filter(|&&i| Some(i) != excluded)
            .flat_map(|&i| distance_samples(&stations[i]))
            .sorted_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal))
            .collect();

        let half = &pooled[..pooled.len() / 2];
        let fit = match fit_line(half) {
            Ok(fit) => fit,
            Err(err) => {
                debug!(?excluded, %err, "robust velocity candidate skipped");
                continue;
            }
        };

        debug!(
            ?excluded,
            slope = fit.slope,
            intercept_variance = fit.intercept_variance,
            "robust velocity candidate"
        );

        let better = match &best {
            None => true,
            Some((current, _)) => fit.intercept_variance < current.intercept_variance,
        };
        if better {
            best = Some((fit, excluded));
        }
    }

    let (fit, excluded) = best.ok_or(TrajectoryError::InsufficientData {
        what: "robust begin velocity half-window points",
        needed: 3,
        got: 0,
    })?;

    Ok(RobustVelocity {
        velocity: fit.slope,
        intercept: fit.intercept,
        intercept_stddev: fit.intercept_variance.max(0.0).sqrt(),
        excluded_station: excluded,
        excluded_station_id: excluded.map(|i| stations[i].station_id.clone()),
    })
}

/// Global kinematic averages handed to the orbit stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusKinematics {
    /// Mean of the per-station average velocities (m/s).
    pub average_velocity: MeterPerSecond,
    /// Number of stations contributing to the average velocity.
    pub velocity_stations: usize,
    /// Mean model ECI position (meters).
    pub average_eci: Vector3<f64>,
    /// Mean Julian date of every point.
    pub average_jd: JulianDate,
    /// Earliest Julian date of every point.
    pub first_jd: JulianDate,
    /// Leave-one-out begin velocity, when requested and available.
    pub robust: Option<RobustVelocity>,
}

impl ConsensusKinematics {
    /// Compute the global averages.
    ///
    /// Arguments
    /// ---------
    /// * `stations`: per-station kinematics.
    /// * `model_eci`: model ECI positions of every point of every station (meters). When empty, the
    ///   CPA points are averaged instead.
    ///
    /// Errors
    /// ------
    /// * [`TrajectoryError::InsufficientData`] if no station has two usable points with distinct
    ///   times, or if there is no point at all.
    pub fn from_stations(
        stations: &[PerStationKinematics],
        model_eci: &[Vector3<f64>],
    ) -> Result<Self, TrajectoryError> {
        let station_velocities: Vec<MeterPerSecond> = stations
            .iter()
            .filter_map(|s| {
                let (first, last) = s.usable_bounds()?;
                let dt = last.time - first.time;
                (dt != 0.0).then(|| (last.length - first.length) / dt)
            })
            .collect();

        if station_velocities.is_empty() {
            return Err(TrajectoryError::InsufficientData {
                what: "average velocity stations",
                needed: 1,
                got: 0,
            });
        }
        let average_velocity =
            station_velocities.iter().sum::<f64>() / station_velocities.len() as f64;

        let jds: Vec<JulianDate> = stations
            .iter()
            .flat_map(|s| s.points.iter().map(|p| p.jd))
            .collect();
        if jds.is_empty() {
            return Err(TrajectoryError::InsufficientData {
                what: "consensus points",
                needed: 1,
                got: 0,
            });
        }
        let average_jd = jds.iter().sum::<f64>() / jds.len() as f64;
        let first_jd = jds.iter().copied().fold(f64::INFINITY, f64::min);

        let average_eci = if model_eci.is_empty() {
            mean_position(stations.iter().flat_map(|s| s.points.iter().map(|p| p.cpa)))
        } else {
            mean_position(model_eci.iter().copied())
        };

        Ok(ConsensusKinematics {
            average_velocity,
            velocity_stations: station_velocities.len(),
            average_eci,
            average_jd,
            first_jd,
            robust: None,
        })
    }

    pub fn with_robust(mut self, robust: RobustVelocity) -> Self {
        self.robust = Some(robust);
        self
    }
}

fn mean_position(points: impl Iterator<Item = Vector3<f64>>) -> Vector3<f64> {
    let (sum, n) = points.fold((Vector3::zeros(), 0usize), |(sum, n), p| (sum + p, n + 1));
    if n == 0 {
        sum
    } else {
        sum / n as f64
    }
}
