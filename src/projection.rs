//! # Trajectory projector
//!
//! Projects every line of sight onto the fitted trajectory line. The trajectory is the line
//! through the state-vector point **P** with the radiant direction **d̂**; a line of sight is the
//! ray from the station **S** along **ŝ**. For each measurement the projector returns the point of
//! the trajectory line closest to the observed ray (closest point of approach, CPA).
//!
//! ## Two-line minimum distance
//!
//! ```text
//! w = S − P
//! a = ŝ·ŝ   b = ŝ·d̂   c = d̂·d̂   d = ŝ·w   e = d̂·w
//! D = a·c − b²
//! t_c = (a·e − b·d) / D           CPA = P + t_c · d̂
//! ```
//!
//! When both lines are (nearly) parallel `D → 0`. The projector refuses to divide when
//! `D ≤ ε·a·c` and reports [`TrajectoryError::DegenerateGeometry`] for that single point.
//!
//! ## Begin point
//!
//! The CPA with the greatest geocentric distance defines the trajectory's begin point, the global
//! reference of the state-vector distances computed by [`crate::kinematics`].

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::constants::{JulianDate, Second};
use crate::line_of_sight::LineOfSight;
use crate::traj_errors::TrajectoryError;

/// Straight trajectory line in ECI coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryLine {
    /// Reference point on the line (state vector position, meters).
    pub point: Vector3<f64>,
    /// Unit radiant direction.
    pub direction: Vector3<f64>,
}

impl TrajectoryLine {
    /// Build a line from a reference point and any non-zero direction, which is normalized.
    pub fn new(point: Vector3<f64>, direction: Vector3<f64>) -> Result<Self, TrajectoryError> {
        let direction = direction.try_normalize(f64::EPSILON).ok_or(
            TrajectoryError::DegenerateGeometry {
                denominator: direction.norm(),
            },
        )?;
        Ok(TrajectoryLine { point, direction })
    }
}

/// A measurement projected onto the trajectory line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    /// Index of the source measurement in its station.
    pub index: usize,
    /// Closest point of approach on the trajectory line (ECI, meters).
    pub cpa: Vector3<f64>,
    /// Timing-corrected offset from the reference epoch (seconds).
    pub time: Second,
    /// Julian date of the measurement.
    pub jd: JulianDate,
    /// Bad-pick flag of the source measurement.
    pub ignored: bool,
}

/// Closest points between the observation ray and the trajectory line.
///
/// Arguments
/// ---------
/// * `los`: observation ray (station position and direction).
/// * `trajectory`: fitted trajectory line.
/// * `epsilon`: relative tolerance of the parallelism test, `a·c − b² ≤ ε·a·c`.
///
/// Return
/// ------
/// * `(point on the ray, point on the trajectory line)`.
///
/// Errors
/// ------
/// * [`TrajectoryError::DegenerateGeometry`] if the two directions are parallel within tolerance.
pub fn closest_points(
    los: &LineOfSight,
    trajectory: &TrajectoryLine,
    epsilon: f64,
) -> Result<(Vector3<f64>, Vector3<f64>), TrajectoryError> {
    let u = &los.direction;
    let v = &trajectory.direction;
    let w = los.station_eci - trajectory.point;

    let a = u.dot(u);
    let b = u.dot(v);
    let c = v.dot(v);
    let d = u.dot(&w);
    let e = v.dot(&w);

    let denominator = a * c - b * b;
    if denominator.is_nan() || denominator <= epsilon * a * c {
        return Err(TrajectoryError::DegenerateGeometry { denominator });
    }

    let sc = (b * e - c * d) / denominator;
    let tc = (a * e - b * d) / denominator;

    Ok((
        los.station_eci + u * sc,
        trajectory.point + v * tc,
    ))
}

/// CPA of a single line of sight on the trajectory line, see [`closest_points`].
pub fn project(
    los: &LineOfSight,
    trajectory: &TrajectoryLine,
    epsilon: f64,
) -> Result<Vector3<f64>, TrajectoryError> {
    closest_points(los, trajectory, epsilon).map(|(_, on_trajectory)| on_trajectory)
}

/// Project every line of sight of a station.
///
/// Each entry keeps its own outcome, so a degenerate point can be dropped by the caller while the
/// rest of the station survives.
pub fn project_station(
    lines: &[LineOfSight],
    trajectory: &TrajectoryLine,
    epsilon: f64,
) -> Vec<Result<ProjectedPoint, TrajectoryError>> {
    lines
        .iter()
        .enumerate()
        .map(|(index, los)| {
            project(los, trajectory, epsilon).map(|cpa| ProjectedPoint {
                index,
                cpa,
                time: los.time,
                jd: los.jd,
                ignored: los.ignored,
            })
        })
        .collect()
}

/// Trajectory begin point: the CPA with the greatest geocentric distance.
///
/// Stations are scanned in order and the first maximum wins ties. Bad picks are skipped unless
/// every point of every station is flagged, in which case all points are scanned. Returns `None`
/// when there is no point at all.
pub fn find_begin_point(stations: &[Vec<ProjectedPoint>]) -> Option<Vector3<f64>> {
    let any_usable = stations.iter().flatten().any(|p| !p.ignored);

    let mut begin: Option<Vector3<f64>> = None;
    let mut max_dist = 0.0;
    for point in stations
        .iter()
        .flatten()
        .filter(|p| !any_usable || !p.ignored)
    {
        let dist = point.cpa.norm();
        if begin.is_none() || dist > max_dist {
            max_dist = dist;
            begin = Some(point.cpa);
        }
    }
    begin
}
