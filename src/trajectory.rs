//! # Trajectory pipeline
//!
//! Runs the stages of a multi-station trajectory reduction strictly in dependency order:
//!
//! ```text
//! stations ──submit──▶ SolverBackend ──solve──▶ TrajectorySolution
//!     │                                               │
//!     └──────────▶ lines of sight ──▶ projection ──▶ kinematics ──▶ consensus ──▶ OrbitRequest
//! ```
//!
//! Each stage consumes the complete, immutable output of the previous one. The solution is written
//! once and only borrowed afterwards, so every derived quantity can be recomputed from
//! `(params, stations, solution)` through [`TrajectoryResult::from_solution`].
//!
//! ## Failure policy
//!
//! * A degenerate projection drops that single point (logged at `warn`), the station survives.
//! * A station with too few usable points reports velocity and lag as unavailable.
//! * A missing robust begin velocity (single usable station) is logged and left unavailable.
//! * Run-global failures (no stations, solver failure, a solution not aligned with the stations,
//!   no projectable point, no average velocity) abort the run and are tagged with the failing
//!   [`PipelineStage`].

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::{ArcSec, JulianDate, MeterPerSecond, DPI, RADSEC};
use crate::geodetic::geo_to_eci;
use crate::kinematics::consensus::{robust_begin_velocity, ConsensusKinematics};
use crate::kinematics::{reduce_station, PerStationKinematics};
use crate::line_of_sight::{build_lines_of_sight, LineOfSight};
use crate::params::TrajectoryParams;
use crate::projection::{find_begin_point, project_station, ProjectedPoint, TrajectoryLine};
use crate::solver::solution::{StationModel, TrajectorySolution, VelocityKind};
use crate::solver::{SolverAdapter, SolverBackend};
use crate::stations::Station;
use crate::traj_errors::{PipelineStage, TrajectoryError};

/// Inputs of the external orbit computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrbitRequest {
    /// Unit ECI vector of the radiant.
    pub radiant_eci: Vector3<f64>,
    /// Begin velocity (m/s).
    pub v_begin: MeterPerSecond,
    /// Average velocity (m/s).
    pub v_avg: MeterPerSecond,
    /// State vector position (ECI, meters).
    pub state_vector: Vector3<f64>,
    /// Earliest Julian date of the observations.
    pub jd_first: JulianDate,
}

/// Orbit determination from a trajectory state vector, provided by the caller.
pub trait OrbitStage {
    type Orbit;

    fn compute(&self, request: &OrbitRequest) -> Result<Self::Orbit, TrajectoryError>;
}

/// Angular residuals between the measured and the model angle channels of one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationResiduals {
    pub station_id: String,
    /// Residual of every measurement (arcseconds).
    pub residuals: Vec<ArcSec>,
    /// RMS over the usable measurements (arcseconds).
    pub rms: ArcSec,
}

/// Measurement dropped by the projector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedPoint {
    pub station: usize,
    pub measurement: usize,
    pub reason: String,
}

/// Immutable snapshot of a reduced trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryResult {
    pub params: TrajectoryParams,
    pub stations: Vec<Station>,
    pub solution: TrajectorySolution,
    /// Begin point of the trajectory (ECI, meters).
    pub begin_point: Vector3<f64>,
    /// Begin velocity used for the lag (solver or robust estimate, m/s).
    pub v_begin: MeterPerSecond,
    /// Solver begin velocity kept as average velocity estimate of a constant-velocity fit when the
    /// robust begin velocity replaced it.
    pub constant_model_velocity: Option<MeterPerSecond>,
    pub kinematics: Vec<PerStationKinematics>,
    pub consensus: ConsensusKinematics,
    pub residuals: Vec<Option<StationResiduals>>,
    pub dropped: Vec<DroppedPoint>,
}

impl TrajectoryResult {
    /// Derive every kinematic product of a solved trajectory.
    ///
    /// Arguments
    /// ---------
    /// * `params`: run parameters.
    /// * `stations`: the stations in the order they were submitted.
    /// * `solution`: solver output for those stations.
    ///
    /// Errors
    /// ------
    /// * [`TrajectoryError::Stage`] wrapping the first run-global failure, including a solution
    ///   that does not cover every station and measurement.
    pub fn from_solution(
        params: TrajectoryParams,
        stations: Vec<Station>,
        solution: TrajectorySolution,
    ) -> Result<Self, TrajectoryError> {
        if stations.is_empty() {
            return Err(TrajectoryError::InsufficientData {
                what: "stations",
                needed: 1,
                got: 0,
            }
            .at(PipelineStage::LineOfSight));
        }

        let nummeas: Vec<usize> = stations.iter().map(Station::len).collect();
        solution
            .check_shape(&nummeas)
            .map_err(|err| err.at(PipelineStage::LineOfSight))?;

        let lines: Vec<Vec<LineOfSight>> = stations
            .iter()
            .zip(&solution.tref_offsets)
            .map(|(station, &tref_offset)| {
                build_lines_of_sight(station, params.meas_type, params.jdt_ref, tref_offset)
            })
            .collect();

        let trajectory = TrajectoryLine::new(solution.state_vector, solution.radiant_eci())
            .map_err(|err| err.at(PipelineStage::Projection))?;

        let mut dropped = Vec::new();
        let projected: Vec<Vec<ProjectedPoint>> = lines
            .iter()
            .enumerate()
            .map(|(k, station_lines)| {
                project_station(station_lines, &trajectory, params.parallel_epsilon)
                    .into_iter()
                    .enumerate()
                    .filter_map(|(i, outcome)| match outcome {
                        Ok(point) => Some(point),
                        Err(err) => {
                            warn!(station = %stations[k].id, measurement = i, %err, "point dropped");
                            dropped.push(DroppedPoint {
                                station: k,
                                measurement: i,
                                reason: err.to_string(),
                            });
                            None
                        }
                    })
                    .collect()
            })
            .collect();

        let begin_point = find_begin_point(&projected).ok_or_else(|| {
            TrajectoryError::InsufficientData {
                what: "projected points",
                needed: 1,
                got: 0,
            }
            .at(PipelineStage::Projection)
        })?;

        let reduce_all = |v_begin: MeterPerSecond| -> Vec<PerStationKinematics> {
            stations
                .iter()
                .zip(&projected)
                .map(|(station, points)| {
                    reduce_station(
                        &station.id,
                        points,
                        &begin_point,
                        v_begin,
                        &params.lag_window,
                    )
                })
                .collect()
        };

        let mut v_begin = solution.v_begin;
        let mut kinematics = reduce_all(v_begin);
        let mut constant_model_velocity = None;
        let mut robust = None;

        if params.velocity_model.first_half_average {
            match robust_begin_velocity(&kinematics) {
                Ok(estimate) => {
                    debug!(
                        excluded = ?estimate.excluded_station_id,
                        velocity = estimate.velocity,
                        "robust begin velocity"
                    );
                    if params.velocity_model.kind == VelocityKind::Constant {
                        constant_model_velocity = Some(v_begin);
                    }
                    v_begin = estimate.velocity;
                    kinematics = reduce_all(v_begin);
                    robust = Some(estimate);
                }
                Err(err) => warn!(%err, "robust begin velocity unavailable"),
            }
        }

        let model_eci: Vec<Vector3<f64>> = solution
            .stations
            .iter()
            .zip(&lines)
            .flat_map(|(model, station_lines)| model_positions(model, station_lines))
            .collect();

        let mut consensus = ConsensusKinematics::from_stations(&kinematics, &model_eci)
            .map_err(|err| err.at(PipelineStage::Consensus))?;
        if let Some(estimate) = robust {
            consensus = consensus.with_robust(estimate);
        }

        let residuals = stations
            .iter()
            .zip(&solution.stations)
            .map(|(station, model)| station_residuals(station, model))
            .collect();

        let result = TrajectoryResult {
            params,
            stations,
            solution,
            begin_point,
            v_begin,
            constant_model_velocity,
            kinematics,
            consensus,
            residuals,
            dropped,
        };
        result.log_summary();

        Ok(result)
    }

    /// Inputs of the orbit stage.
    pub fn orbit_request(&self) -> OrbitRequest {
        OrbitRequest {
            radiant_eci: self.solution.radiant_eci(),
            v_begin: self.v_begin,
            v_avg: self.consensus.average_velocity,
            state_vector: self.solution.state_vector,
            jd_first: self.consensus.first_jd,
        }
    }

    /// Hand the trajectory over to an orbit stage.
    pub fn compute_orbit<O: OrbitStage>(&self, stage: &O) -> Result<O::Orbit, TrajectoryError> {
        stage.compute(&self.orbit_request())
    }

    fn log_summary(&self) {
        let ra = self.solution.ra_radiant.to_degrees();
        let dec = self.solution.dec_radiant.to_degrees();
        let v_avg = self.consensus.average_velocity;
        let dropped = self.dropped.len();

        if self.params.verbose >= 1 {
            info!(ra, dec, v_begin = self.v_begin, v_avg, dropped, "trajectory reduced");
        } else {
            debug!(ra, dec, v_begin = self.v_begin, v_avg, dropped, "trajectory reduced");
        }
    }
}

/// Model ECI positions of a station, at each point's own Julian date.
fn model_positions<'a>(
    model: &'a StationModel,
    lines: &'a [LineOfSight],
) -> impl Iterator<Item = Vector3<f64>> + 'a {
    model
        .model_lat
        .iter()
        .zip(&model.model_lon)
        .zip(&model.model_height)
        .zip(lines)
        .map(|(((lat, lon), height), los)| geo_to_eci(*lat, *lon, *height, los.jd))
}

/// Angular residuals of a station against the model fit channels.
///
/// `sqrt(Δm2² + (|Δm1| mod 2π · sin m2)²)` per measurement, `None` when the model fit arrays do not
/// cover every measurement.
pub fn station_residuals(station: &Station, model: &StationModel) -> Option<StationResiduals> {
    let measurements = station.measurements();
    if measurements.is_empty()
        || model.model_fit1.len() != measurements.len()
        || model.model_fit2.len() != measurements.len()
    {
        return None;
    }

    let residuals: Vec<ArcSec> = measurements
        .iter()
        .zip(model.model_fit1.iter().zip(&model.model_fit2))
        .map(|(m, (fit1, fit2))| {
            let d1 = (m.meas1 - fit1).abs() % DPI;
            let d2 = m.meas2 - fit2;
            (d2 * d2 + (d1 * m.meas2.sin()).powi(2)).sqrt() / RADSEC
        })
        .collect();

    let usable: Vec<ArcSec> = residuals
        .iter()
        .zip(measurements)
        .filter(|(_, m)| !m.ignored)
        .map(|(r, _)| *r)
        .collect();
    let rms = if usable.is_empty() {
        0.0
    } else {
        (usable.iter().map(|r| r * r).sum::<f64>() / usable.len() as f64).sqrt()
    };

    Some(StationResiduals {
        station_id: station.id.clone(),
        residuals,
        rms,
    })
}

/// One trajectory run: stations, parameters and the solver they are handed to.
pub struct Trajectory<B: SolverBackend> {
    params: TrajectoryParams,
    stations: Vec<Station>,
    adapter: SolverAdapter<B>,
}

impl<B: SolverBackend> Trajectory<B> {
    pub fn new(params: TrajectoryParams, backend: B) -> Self {
        Trajectory {
            params,
            stations: Vec::new(),
            adapter: SolverAdapter::new(backend),
        }
    }

    pub fn params(&self) -> &TrajectoryParams {
        &self.params
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Add an observing station.
    ///
    /// Errors
    /// ------
    /// * [`TrajectoryError::InvalidParameter`] once `max_cameras` stations are registered.
    pub fn add_station(&mut self, station: Station) -> Result<(), TrajectoryError> {
        if self.stations.len() >= self.params.max_cameras {
            return Err(TrajectoryError::InvalidParameter(format!(
                "cannot add station {}: max_cameras = {} reached",
                station.id, self.params.max_cameras
            )));
        }
        self.stations.push(station);
        Ok(())
    }

    /// Solve the trajectory and derive its kinematics.
    ///
    /// Errors
    /// ------
    /// * [`TrajectoryError::Stage`] wrapping the failure of the submit, solve, projection or
    ///   consensus stage.
    pub fn run(mut self) -> Result<TrajectoryResult, TrajectoryError> {
        info!(
            stations = self.stations.len(),
            jdt_ref = self.params.jdt_ref,
            velocity_model = %self.params.velocity_model,
            "running trajectory solver"
        );

        let handle = self
            .adapter
            .submit(&self.stations, &self.params)
            .map_err(|err| err.at(PipelineStage::Submit))?;
        let solution = self
            .adapter
            .solve(handle)
            .map_err(|err| err.at(PipelineStage::Solve))?;

        TrajectoryResult::from_solution(self.params, self.stations, solution)
    }
}

#[cfg(test)]
mod trajectory_test {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::stations::Measurement;

    fn station_with(meas: &[(f64, f64, bool)]) -> Station {
        let mut station = Station::new("S", 0.75, -1.42, 300.0).unwrap();
        station
            .extend(
                meas.iter()
                    .enumerate()
                    .map(|(i, (m1, m2, ignored))| {
                        Measurement::new(i as f64 * 0.1, *m1, *m2).with_ignored(*ignored)
                    }),
            )
            .unwrap();
        station
    }

    #[test]
    fn test_residuals() {
        let station = station_with(&[(1.0, 0.5, false), (1.0, 0.5, false), (2.0, 0.5, true)]);
        let model = StationModel {
            model_fit1: vec![1.0, 1.0 + 10.0 * RADSEC, 1.0],
            model_fit2: vec![0.5 + 3.0 * RADSEC, 0.5, 0.5],
            ..Default::default()
        };

        let res = station_residuals(&station, &model).unwrap();
        assert_abs_diff_eq!(res.residuals[0], 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(res.residuals[1], 10.0 * 0.5_f64.sin(), epsilon = 1e-6);

        // The bad pick is reported but left out of the RMS
        assert!(res.residuals[2] > 9.0e4);
        let expected = ((9.0 + (10.0 * 0.5_f64.sin()).powi(2)) / 2.0).sqrt();
        assert_abs_diff_eq!(res.rms, expected, epsilon = 1e-6);

        assert!(station_residuals(&station, &StationModel::default()).is_none());
    }

    struct Unused;

    impl SolverBackend for Unused {
        fn solve(
            &mut self,
            _: &crate::solver::TrajectoryInfo,
        ) -> Result<crate::solver::SolverOutput, TrajectoryError> {
            Err(TrajectoryError::SolverFailure("unused".into()))
        }
    }

    #[test]
    fn test_station_limit_and_submit_stage() {
        let params = TrajectoryParams::builder()
            .jdt_ref(2457660.5)
            .max_cameras(2)
            .build()
            .unwrap();
        let mut run = Trajectory::new(params, Unused);

        let station = station_with(&[(1.0, 0.5, false), (1.0, 0.5, false)]);
        run.add_station(station.clone()).unwrap();
        assert_eq!(run.stations().len(), 1);

        let err = run.run().unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::Submit));

        let params = TrajectoryParams::builder()
            .jdt_ref(2457660.5)
            .max_cameras(1)
            .build()
            .unwrap();
        let mut run = Trajectory::new(params, Unused);
        run.add_station(station.clone()).unwrap();
        assert!(run.add_station(station).is_err());
    }

    #[test]
    fn test_solver_failure_is_tagged() {
        let params = TrajectoryParams::builder().jdt_ref(2457660.5).build().unwrap();
        let mut run = Trajectory::new(params, Unused);
        let station = station_with(&[(1.0, 0.5, false), (1.1, 0.5, false)]);
        run.add_station(station.clone()).unwrap();
        run.add_station(station).unwrap();

        let err = run.run().unwrap_err();
        assert_eq!(
            err,
            TrajectoryError::SolverFailure("unused".into()).at(PipelineStage::Solve)
        );
    }
}
