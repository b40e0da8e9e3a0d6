//! # Trajectory solution
//!
//! Owned, SI-unit view of the trajectory solver output. A [`TrajectorySolution`] is produced once
//! per trajectory by [`SolverAdapter::solve`](crate::solver::SolverAdapter::solve) and is read-only
//! afterwards: every downstream stage (projection, kinematics, consensus) only borrows it.
//!
//! Units
//! -----
//! * Angles: **radians**
//! * Positions, heights, ranges: **meters**
//! * Velocities: **m/s**
//! * Times: **seconds** relative to the reference Julian date

use std::fmt;
use std::str::FromStr;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::constants::{Meter, MeterPerSecond, Radian, Second};
use crate::geodetic::ra_dec_to_eci;
use crate::traj_errors::TrajectoryError;

/// Velocity propagation model of the trajectory fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VelocityKind {
    /// `v(t) = vinf`
    Constant,
    /// `v(t) = vinf − |acc1|·t`
    Linear,
    /// `v(t) = vinf − |acc1|·t + acc2·t²`
    Quadratic,
    /// `v(t) = vinf − |acc1|·|acc2|·exp(|acc2|·t)`
    Exponential,
}

impl VelocityKind {
    /// Numeric selector handed to the trajectory solver.
    pub fn code(&self) -> i32 {
        match self {
            VelocityKind::Constant => 0,
            VelocityKind::Linear => 1,
            VelocityKind::Quadratic => 2,
            VelocityKind::Exponential => 3,
        }
    }
}

/// Velocity model selector, with the optional first-half-average begin velocity.
///
/// Parsed from the textual selectors `"0"` to `"3"`, optionally suffixed with `fha`
/// (e.g. `"0fha"`), and displayed back the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VelocityModel {
    pub kind: VelocityKind,
    /// Replace the solver begin velocity with the leave-one-out robust estimate.
    pub first_half_average: bool,
}

impl Default for VelocityModel {
    fn default() -> Self {
        VelocityModel {
            kind: VelocityKind::Exponential,
            first_half_average: false,
        }
    }
}

impl FromStr for VelocityModel {
    type Err = TrajectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (code, first_half_average) = match s.trim().strip_suffix("fha") {
            Some(code) => (code, true),
            None => (s.trim(), false),
        };

        let kind = match code {
            "0" => VelocityKind::Constant,
            "1" => VelocityKind::Linear,
            "2" => VelocityKind::Quadratic,
            "3" => VelocityKind::Exponential,
            _ => {
                return Err(TrajectoryError::InvalidParameter(format!(
                    "unknown velocity model '{s}'"
                )))
            }
        };

        Ok(VelocityModel {
            kind,
            first_half_average,
        })
    }
}

impl fmt::Display for VelocityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = if self.first_half_average { "fha" } else { "" };
        write!(f, "{}{suffix}", self.kind.code())
    }
}

/// Geodetic point of the trajectory with its standard deviations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub lat: Radian,
    pub lon: Radian,
    pub height: Meter,
    pub lat_sigma: Radian,
    pub lon_sigma: Radian,
    pub height_sigma: Meter,
}

/// Per-point measured and modeled quantities of one station, aligned with its measurements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationModel {
    pub meas_lat: Vec<Radian>,
    pub meas_lon: Vec<Radian>,
    pub meas_height: Vec<Meter>,
    pub meas_range: Vec<Meter>,
    pub meas_vel: Vec<MeterPerSecond>,

    pub model_lat: Vec<Radian>,
    pub model_lon: Vec<Radian>,
    pub model_height: Vec<Meter>,
    pub model_range: Vec<Meter>,
    pub model_vel: Vec<MeterPerSecond>,

    /// Model angle channels, in the run's measurement convention.
    pub model_fit1: Vec<Radian>,
    pub model_fit2: Vec<Radian>,
    /// Model time relative to the reference epoch.
    pub model_time: Vec<Second>,
}

/// Best-fit trajectory returned by the solver, in SI units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySolution {
    /// Radiant right ascension and declination.
    pub ra_radiant: Radian,
    pub dec_radiant: Radian,
    pub ra_sigma: Radian,
    pub dec_sigma: Radian,

    /// Intersecting-planes radiant used to seed the fit.
    pub ra_radiant_ip: Radian,
    pub dec_radiant_ip: Radian,
    /// Largest convergence angle between station planes.
    pub max_convergence: Radian,

    /// State vector position (ECI, meters).
    pub state_vector: Vector3<f64>,
    /// State vector velocity (ECI, m/s).
    pub state_velocity: Vector3<f64>,

    /// Begin velocity and its sigma.
    pub v_begin: MeterPerSecond,
    pub v_begin_sigma: MeterPerSecond,
    /// Deceleration terms of the velocity model (solver units).
    pub decel1: f64,
    pub decel2: f64,
    pub decel1_sigma: f64,
    pub decel2_sigma: f64,
    /// Time of the state vector relative to the reference epoch.
    pub tzero: Second,
    /// Timing offset of every station.
    pub tref_offsets: Vec<Second>,

    pub begin: TrajectoryPoint,
    pub end: TrajectoryPoint,

    /// Per-station measured/model arrays.
    pub stations: Vec<StationModel>,
}

impl TrajectorySolution {
    /// Unit ECI vector of the radiant.
    pub fn radiant_eci(&self) -> Vector3<f64> {
        ra_dec_to_eci(self.ra_radiant, self.dec_radiant)
    }

    /// Deceleration terms as a pair.
    pub fn decel(&self) -> (f64, f64) {
        (self.decel1, self.decel2)
    }

    /// Check that the solution covers exactly the given stations.
    ///
    /// Arguments
    /// ---------
    /// * `nummeas`: measurement count of every station, in submission order.
    ///
    /// Errors
    /// ------
    /// * [`TrajectoryError::SolverFailure`] when the timing offsets or the per-station arrays do
    ///   not match `nummeas` one to one.
    pub fn check_shape(&self, nummeas: &[usize]) -> Result<(), TrajectoryError> {
        let n = nummeas.len();
        if self.tref_offsets.len() != n {
            return Err(TrajectoryError::SolverFailure(format!(
                "{} timing offsets for {n} stations",
                self.tref_offsets.len()
            )));
        }
        if self.stations.len() != n {
            return Err(TrajectoryError::SolverFailure(format!(
                "{} station models for {n} stations",
                self.stations.len()
            )));
        }
        for (k, (model, &expected)) in self.stations.iter().zip(nummeas).enumerate() {
            if let Some((name, values)) = model
                .channels()
                .into_iter()
                .find(|(_, values)| values.len() != expected)
            {
                return Err(TrajectoryError::SolverFailure(format!(
                    "station {k}: {name} holds {} values, expected {expected}",
                    values.len()
                )));
            }
        }
        Ok(())
    }
}

impl StationModel {
    fn channels(&self) -> [(&'static str, &[f64]); 13] {
        [
            ("meas_lat", &self.meas_lat),
            ("meas_lon", &self.meas_lon),
            ("meas_height", &self.meas_height),
            ("meas_range", &self.meas_range),
            ("meas_vel", &self.meas_vel),
            ("model_lat", &self.model_lat),
            ("model_lon", &self.model_lon),
            ("model_height", &self.model_height),
            ("model_range", &self.model_range),
            ("model_vel", &self.model_vel),
            ("model_fit1", &self.model_fit1),
            ("model_fit2", &self.model_fit2),
            ("model_time", &self.model_time),
        ]
    }
}

#[cfg(test)]
mod solution_test {
    use super::*;

    #[test]
    fn test_velocity_model_selectors() {
        let model: VelocityModel = "3".parse().unwrap();
        assert_eq!(model, VelocityModel::default());

        let model: VelocityModel = "0fha".parse().unwrap();
        assert_eq!(model.kind, VelocityKind::Constant);
        assert!(model.first_half_average);
        assert_eq!(model.to_string(), "0fha");

        for selector in ["0", "1", "2", "3", "1fha", "2fha", "3fha"] {
            assert_eq!(selector.parse::<VelocityModel>().unwrap().to_string(), selector);
        }

        assert!(matches!(
            "4".parse::<VelocityModel>(),
            Err(TrajectoryError::InvalidParameter(_))
        ));
        assert!("fha".parse::<VelocityModel>().is_err());
    }

    fn solution(n_stations: usize, n_meas: usize) -> TrajectorySolution {
        let model = StationModel {
            meas_lat: vec![0.75; n_meas],
            meas_lon: vec![-1.42; n_meas],
            meas_height: vec![9.0e4; n_meas],
            meas_range: vec![1.5e5; n_meas],
            meas_vel: vec![2.0e4; n_meas],
            model_lat: vec![0.75; n_meas],
            model_lon: vec![-1.42; n_meas],
            model_height: vec![9.0e4; n_meas],
            model_range: vec![1.5e5; n_meas],
            model_vel: vec![2.0e4; n_meas],
            model_fit1: vec![0.5; n_meas],
            model_fit2: vec![0.6; n_meas],
            model_time: vec![0.0; n_meas],
        };
        let point = TrajectoryPoint {
            lat: 0.75,
            lon: -1.42,
            height: 1.0e5,
            lat_sigma: 0.0,
            lon_sigma: 0.0,
            height_sigma: 0.0,
        };
        TrajectorySolution {
            ra_radiant: 1.0,
            dec_radiant: 0.3,
            ra_sigma: 0.0,
            dec_sigma: 0.0,
            ra_radiant_ip: 1.0,
            dec_radiant_ip: 0.3,
            max_convergence: 1.2,
            state_vector: Vector3::new(4.0e6, 1.0e6, 4.6e6),
            state_velocity: Vector3::new(-1.0e4, 5.0e3, -1.5e4),
            v_begin: 2.0e4,
            v_begin_sigma: 0.0,
            decel1: 0.0,
            decel2: 0.0,
            decel1_sigma: 0.0,
            decel2_sigma: 0.0,
            tzero: 0.0,
            tref_offsets: vec![0.0; n_stations],
            begin: point,
            end: point,
            stations: vec![model; n_stations],
        }
    }

    #[test]
    fn test_check_shape() {
        let good = solution(2, 3);
        assert_eq!(good.check_shape(&[3, 3]), Ok(()));

        // Station count differs from the solved one
        assert!(matches!(
            good.check_shape(&[3, 3, 3]),
            Err(TrajectoryError::SolverFailure(msg)) if msg == "2 timing offsets for 3 stations"
        ));

        let mut missing_offsets = solution(2, 3);
        missing_offsets.tref_offsets.clear();
        assert!(missing_offsets.check_shape(&[3, 3]).is_err());

        let mut missing_station = solution(2, 3);
        missing_station.stations.pop();
        assert!(matches!(
            missing_station.check_shape(&[3, 3]),
            Err(TrajectoryError::SolverFailure(msg)) if msg == "1 station models for 2 stations"
        ));

        let mut short_channel = solution(2, 3);
        short_channel.stations[1].model_height.pop();
        assert!(matches!(
            short_channel.check_shape(&[3, 3]),
            Err(TrajectoryError::SolverFailure(msg))
                if msg == "station 1: model_height holds 2 values, expected 3"
        ));
    }
}
