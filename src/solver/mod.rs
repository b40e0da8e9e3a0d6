//! # Trajectory solver boundary
//!
//! The nonlinear search fitting the radiant, the state vector, the deceleration terms and the
//! station timing offsets is an external collaborator. This module owns the data contract with it:
//!
//! 1. [`SolverAdapter::submit`] marshals the stations into a [`TrajectoryInfo`] record
//!    (contiguous `Vec<f64>` channels, angles in radians, heights in **kilometers**) and returns a
//!    [`SolutionHandle`] owning every buffer.
//! 2. [`SolverAdapter::solve`] lends the record to the [`SolverBackend`] for the duration of the
//!    call, reads every output field once into a [`TrajectorySolution`] in SI units and drops the
//!    record.
//!
//! The backend never retains the buffers: it only sees `&TrajectoryInfo` and returns an owned
//! [`SolverOutput`]. Non-finite or misshapen outputs surface as
//! [`TrajectoryError::SolverFailure`].

pub mod solution;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{JulianDate, Kilometer, Radian, KM_TO_M};
use crate::params::TrajectoryParams;
use crate::solver::solution::{StationModel, TrajectoryPoint, TrajectorySolution};
use crate::stations::Station;
use crate::traj_errors::TrajectoryError;

/// Number of leading solution-vector entries before the per-station timing offsets:
/// `Rx, Ry, Rz, Vx, Vy, Vz, decel1, decel2, tzero`.
pub const SOLUTION_HEAD_LEN: usize = 9;

/// Measurement channels of one station, as handed to the solver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraInput {
    pub lat: Radian,
    pub lon: Radian,
    pub hkm: Kilometer,
    pub meas1: Vec<f64>,
    pub meas2: Vec<f64>,
    pub dtime: Vec<f64>,
    pub noise: Vec<f64>,
    /// Per-point weight, zero for bad picks.
    pub weight: Vec<f64>,
}

impl CameraInput {
    pub fn nummeas(&self) -> usize {
        self.dtime.len()
    }
}

/// Input record of the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryInfo {
    pub maxcameras: usize,
    pub verbose: u8,
    pub nummonte: u32,
    pub velmodel: i32,
    pub meastype: i32,
    pub jdt_ref: JulianDate,
    pub max_toffset: f64,
    pub cameras: Vec<CameraInput>,
}

impl TrajectoryInfo {
    pub fn numcameras(&self) -> usize {
        self.cameras.len()
    }
}

/// Per-station output arrays of the solver (kilometers, km/s, radians, seconds).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraOutput {
    pub meas_lat: Vec<f64>,
    pub meas_lon: Vec<f64>,
    pub meas_hkm: Vec<f64>,
    pub meas_range: Vec<f64>,
    pub meas_vel: Vec<f64>,
    pub model_lat: Vec<f64>,
    pub model_lon: Vec<f64>,
    pub model_hkm: Vec<f64>,
    pub model_range: Vec<f64>,
    pub model_vel: Vec<f64>,
    pub model_fit1: Vec<f64>,
    pub model_fit2: Vec<f64>,
    pub model_time: Vec<f64>,
}

impl CameraOutput {
    fn channels(&self) -> [(&'static str, &[f64]); 13] {
        [
            ("meas_lat", &self.meas_lat),
            ("meas_lon", &self.meas_lon),
            ("meas_hkm", &self.meas_hkm),
            ("meas_range", &self.meas_range),
            ("meas_vel", &self.meas_vel),
            ("model_lat", &self.model_lat),
            ("model_lon", &self.model_lon),
            ("model_hkm", &self.model_hkm),
            ("model_range", &self.model_range),
            ("model_vel", &self.model_vel),
            ("model_fit1", &self.model_fit1),
            ("model_fit2", &self.model_fit2),
            ("model_time", &self.model_time),
        ]
    }
}

/// Geodetic point output (radians, kilometers) with sigmas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PointOutput {
    pub lat: f64,
    pub lon: f64,
    pub hkm: f64,
    pub lat_sigma: f64,
    pub lon_sigma: f64,
    pub hkm_sigma: f64,
}

impl PointOutput {
    fn values(&self) -> [f64; 6] {
        [
            self.lat,
            self.lon,
            self.hkm,
            self.lat_sigma,
            self.lon_sigma,
            self.hkm_sigma,
        ]
    }

    fn to_si(self) -> TrajectoryPoint {
        TrajectoryPoint {
            lat: self.lat,
            lon: self.lon,
            height: self.hkm * KM_TO_M,
            lat_sigma: self.lat_sigma,
            lon_sigma: self.lon_sigma,
            height_sigma: self.hkm_sigma * KM_TO_M,
        }
    }
}

/// Output record of the solver, in solver units (km, km/s, radians, seconds).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolverOutput {
    /// `Rx, Ry, Rz, Vx, Vy, Vz, decel1, decel2, tzero, tref_offsets[*]`.
    pub solution: Vec<f64>,
    pub ra_radiant: f64,
    pub dec_radiant: f64,
    pub ra_sigma: f64,
    pub dec_sigma: f64,
    pub vbegin: f64,
    pub vbegin_sigma: f64,
    pub decel1: f64,
    pub decel2: f64,
    pub decel1_sigma: f64,
    pub decel2_sigma: f64,
    pub max_convergence: f64,
    pub ra_radiant_ip: f64,
    pub dec_radiant_ip: f64,
    pub tref_offsets: Vec<f64>,
    pub rbeg: PointOutput,
    pub rend: PointOutput,
    pub cameras: Vec<CameraOutput>,
}

/// The external trajectory optimizer.
pub trait SolverBackend {
    /// Run the fit on a fully initialized input record.
    ///
    /// The record is only borrowed for the duration of the call.
    fn solve(&mut self, info: &TrajectoryInfo) -> Result<SolverOutput, TrajectoryError>;
}

/// Submitted trajectory: owns the marshalled input until it is solved.
#[derive(Debug, Clone, PartialEq)]
pub struct SolutionHandle {
    info: TrajectoryInfo,
}

impl SolutionHandle {
    pub fn info(&self) -> &TrajectoryInfo {
        &self.info
    }
}

/// Marshals stations to a [`SolverBackend`] and its output back into a [`TrajectorySolution`].
#[derive(Debug)]
pub struct SolverAdapter<B: SolverBackend> {
    backend: B,
}

impl<B: SolverBackend> SolverAdapter<B> {
    pub fn new(backend: B) -> Self {
        SolverAdapter { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Marshal the stations and the run parameters into a solver input record.
    ///
    /// Arguments
    /// ---------
    /// * `stations`: observing stations, in the order their timing offsets will be reported.
    /// * `params`: run parameters.
    ///
    /// Return
    /// ------
    /// * A [`SolutionHandle`] owning the record.
    ///
    /// Errors
    /// ------
    /// * [`TrajectoryError::InsufficientData`] with fewer than two stations, or fewer than two
    ///   stations holding at least two usable measurements.
    ///
    /// Remarks
    /// -------
    /// * A station with fewer than two usable measurements is still submitted (its bad picks carry
    ///   a zero weight) so that station indices stay aligned with the fitted timing offsets. Its
    ///   velocity and lag are later reported as unavailable.
    /// * [`TrajectoryError::InvalidParameter`] with more stations than `max_cameras`.
    pub fn submit(
        &self,
        stations: &[Station],
        params: &TrajectoryParams,
    ) -> Result<SolutionHandle, TrajectoryError> {
        if stations.len() < 2 {
            return Err(TrajectoryError::InsufficientData {
                what: "stations",
                needed: 2,
                got: stations.len(),
            });
        }
        if stations.len() > params.max_cameras {
            return Err(TrajectoryError::InvalidParameter(format!(
                "{} stations exceed max_cameras = {}",
                stations.len(),
                params.max_cameras
            )));
        }

        let mut usable_stations = 0;
        for station in stations {
            let usable = station.usable_count();
            if usable < 2 {
                warn!(
                    station = %station.id,
                    usable, "station submitted without enough usable measurements"
                );
            } else {
                usable_stations += 1;
            }
        }
        if usable_stations < 2 {
            return Err(TrajectoryError::InsufficientData {
                what: "stations with two usable measurements",
                needed: 2,
                got: usable_stations,
            });
        }

        let cameras = stations
            .iter()
            .map(|station| {
                let measurements = station.measurements();
                CameraInput {
                    lat: station.lat(),
                    lon: station.lon(),
                    hkm: station.height() / KM_TO_M,
                    meas1: measurements.iter().map(|m| m.meas1).collect(),
                    meas2: measurements.iter().map(|m| m.meas2).collect(),
                    dtime: measurements.iter().map(|m| m.time).collect(),
                    noise: measurements.iter().map(|m| m.noise.unwrap_or(0.0)).collect(),
                    weight: measurements
                        .iter()
                        .map(|m| if m.ignored { 0.0 } else { station.weight })
                        .collect(),
                }
            })
            .collect();

        let info = TrajectoryInfo {
            maxcameras: params.max_cameras,
            verbose: params.verbose,
            nummonte: params.num_monte,
            velmodel: params.velocity_model.kind.code(),
            meastype: params.meas_type.code(),
            jdt_ref: params.jdt_ref,
            max_toffset: params.max_toffset,
            cameras,
        };

        debug!(
            numcameras = info.numcameras(),
            velmodel = info.velmodel,
            meastype = info.meastype,
            "trajectory submitted"
        );

        Ok(SolutionHandle { info })
    }

    /// Run the backend on a submitted trajectory and convert its output to SI units.
    ///
    /// The handle is consumed: its buffers are released as soon as the output has been read.
    ///
    /// Errors
    /// ------
    /// * [`TrajectoryError::SolverFailure`] if the backend fails, or returns arrays whose lengths do
    ///   not match the submitted measurements, or any non-finite value.
    pub fn solve(&mut self, handle: SolutionHandle) -> Result<TrajectorySolution, TrajectoryError> {
        let info = handle.info;

        let output = self.backend.solve(&info).map_err(|err| match err {
            TrajectoryError::SolverFailure(msg) => TrajectoryError::SolverFailure(msg),
            other => TrajectoryError::SolverFailure(other.to_string()),
        })?;

        validate_output(&info, &output)?;
        let solution = into_solution(output);

        debug!(
            ra = solution.ra_radiant.to_degrees(),
            dec = solution.dec_radiant.to_degrees(),
            v_begin = solution.v_begin,
            "trajectory solved"
        );

        Ok(solution)
    }
}

/// Largest difference (seconds) allowed between the solution tail and `tref_offsets`.
const TREF_OFFSET_TOLERANCE: f64 = 1e-9;

fn failure(msg: String) -> TrajectoryError {
    TrajectoryError::SolverFailure(msg)
}

fn check_finite(name: &str, values: &[f64]) -> Result<(), TrajectoryError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(failure(format!("non-finite {name}[{i}] = {}", values[i]))),
        None => Ok(()),
    }
}

fn validate_output(info: &TrajectoryInfo, output: &SolverOutput) -> Result<(), TrajectoryError> {
    let numcameras = info.numcameras();

    let expected = SOLUTION_HEAD_LEN + numcameras;
    if output.solution.len() != expected {
        return Err(failure(format!(
            "solution vector holds {} values, expected {expected}",
            output.solution.len()
        )));
    }
    if output.tref_offsets.len() != numcameras {
        return Err(failure(format!(
            "{} timing offsets for {numcameras} stations",
            output.tref_offsets.len()
        )));
    }
    if output.cameras.len() != numcameras {
        return Err(failure(format!(
            "{} output stations for {numcameras} submitted",
            output.cameras.len()
        )));
    }

    check_finite("solution", &output.solution)?;
    check_finite("tref_offsets", &output.tref_offsets)?;
    let fitted = &output.solution[SOLUTION_HEAD_LEN..];
    if let Some(k) = fitted
        .iter()
        .zip(&output.tref_offsets)
        .position(|(a, b)| (a - b).abs() > TREF_OFFSET_TOLERANCE)
    {
        return Err(failure(format!(
            "station {k}: timing offset {} disagrees with the solution vector ({})",
            output.tref_offsets[k], fitted[k]
        )));
    }
    check_finite(
        "scalars",
        &[
            output.ra_radiant,
            output.dec_radiant,
            output.ra_sigma,
            output.dec_sigma,
            output.vbegin,
            output.vbegin_sigma,
            output.decel1,
            output.decel2,
            output.decel1_sigma,
            output.decel2_sigma,
            output.max_convergence,
            output.ra_radiant_ip,
            output.dec_radiant_ip,
        ],
    )?;
    check_finite("rbeg", &output.rbeg.values())?;
    check_finite("rend", &output.rend.values())?;

    for (k, (camera, input)) in output.cameras.iter().zip(&info.cameras).enumerate() {
        for (name, values) in camera.channels() {
            if values.len() != input.nummeas() {
                return Err(failure(format!(
                    "station {k}: {name} holds {} values, expected {}",
                    values.len(),
                    input.nummeas()
                )));
            }
            check_finite(name, values)?;
        }
    }

    Ok(())
}

fn to_meters(values: Vec<f64>) -> Vec<f64> {
    values.into_iter().map(|v| v * KM_TO_M).collect()
}

fn into_solution(output: SolverOutput) -> TrajectorySolution {
    let s = &output.solution;
    let state_vector = nalgebra::Vector3::new(s[0], s[1], s[2]) * KM_TO_M;
    let state_velocity = nalgebra::Vector3::new(s[3], s[4], s[5]) * KM_TO_M;
    let tzero = s[8];

    let stations = output
        .cameras
        .into_iter()
        .map(|c| StationModel {
            meas_lat: c.meas_lat,
            meas_lon: c.meas_lon,
            meas_height: to_meters(c.meas_hkm),
            meas_range: to_meters(c.meas_range),
            meas_vel: to_meters(c.meas_vel),
            model_lat: c.model_lat,
            model_lon: c.model_lon,
            model_height: to_meters(c.model_hkm),
            model_range: to_meters(c.model_range),
            model_vel: to_meters(c.model_vel),
            model_fit1: c.model_fit1,
            model_fit2: c.model_fit2,
            model_time: c.model_time,
        })
        .collect();

    TrajectorySolution {
        ra_radiant: output.ra_radiant,
        dec_radiant: output.dec_radiant,
        ra_sigma: output.ra_sigma,
        dec_sigma: output.dec_sigma,
        ra_radiant_ip: output.ra_radiant_ip,
        dec_radiant_ip: output.dec_radiant_ip,
        max_convergence: output.max_convergence,
        state_vector,
        state_velocity,
        v_begin: output.vbegin * KM_TO_M,
        v_begin_sigma: output.vbegin_sigma * KM_TO_M,
        decel1: output.decel1,
        decel2: output.decel2,
        decel1_sigma: output.decel1_sigma,
        decel2_sigma: output.decel2_sigma,
        tzero,
        tref_offsets: output.tref_offsets,
        begin: output.rbeg.to_si(),
        end: output.rend.to_si(),
        stations,
    }
}
