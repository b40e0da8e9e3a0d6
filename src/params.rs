//! # Trajectory run parameters
//!
//! [`TrajectoryParams`] gathers the scalar configuration of one trajectory run: the reference
//! epoch, the solver controls forwarded across the solver boundary and the numerical tolerances
//! of the kinematics stages.
//!
//! Parameters are built through the fluent, validating [`TrajectoryParamsBuilder`]:
//!
//! ```rust
//! use meteortraj::params::TrajectoryParams;
//!
//! let params = TrajectoryParams::builder()
//!     .jdt_ref(2457660.770667)
//!     .velocity_model("3fha".parse()?)
//!     .max_toffset(1.0)
//!     .build()?;
//! assert!(params.velocity_model.first_half_average);
//! # Ok::<(), meteortraj::traj_errors::TrajectoryError>(())
//! ```

use std::cmp::Ordering::{Equal, Greater};

use serde::{Deserialize, Serialize};

use crate::constants::{JulianDate, Second};
use crate::kinematics::LagWindow;
use crate::measurement::MeasurementType;
use crate::solver::solution::VelocityModel;
use crate::traj_errors::TrajectoryError;

/// Configuration of a trajectory run.
///
/// Defaults
/// --------
/// * `jdt_ref`: required, no default (0.0 is rejected by the builder)
/// * `max_toffset`: 1.0 s
/// * `velocity_model`: exponential, no first-half-average (`"3"`)
/// * `meas_type`: azimuth north of east + zenith (code 4)
/// * `num_monte`: 1
/// * `verbose`: 0
/// * `max_cameras`: 10
/// * `parallel_epsilon`: 1e-10
/// * `lag_window`: first 25 % of the usable points, at least 4
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryParams {
    /// Reference Julian date all measurement times are relative to.
    pub jdt_ref: JulianDate,
    /// Maximum timing offset between stations allowed to the solver (seconds).
    pub max_toffset: Second,
    pub velocity_model: VelocityModel,
    pub meas_type: MeasurementType,
    /// Monte Carlo trials of the solver uncertainty estimate.
    pub num_monte: u32,
    /// Solver verbosity (0..=3). From 1 upwards the solution summary is logged at `info`.
    pub verbose: u8,
    /// Maximum number of stations accepted in one run.
    pub max_cameras: usize,
    /// Relative tolerance of the projector's parallel-lines test.
    pub parallel_epsilon: f64,
    pub lag_window: LagWindow,
    pub traj_id: Option<String>,
    pub comment: String,
}

impl Default for TrajectoryParams {
    fn default() -> Self {
        TrajectoryParams {
            jdt_ref: 0.0,
            max_toffset: 1.0,
            velocity_model: VelocityModel::default(),
            meas_type: MeasurementType::AzZenN,
            num_monte: 1,
            verbose: 0,
            max_cameras: 10,
            parallel_epsilon: 1e-10,
            lag_window: LagWindow::default(),
            traj_id: None,
            comment: String::new(),
        }
    }
}

impl TrajectoryParams {
    /// Create a new [`TrajectoryParamsBuilder`] initialized with the defaults.
    pub fn builder() -> TrajectoryParamsBuilder {
        TrajectoryParamsBuilder::new()
    }
}

/// Builder for [`TrajectoryParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct TrajectoryParamsBuilder {
    params: TrajectoryParams,
}

impl TrajectoryParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: TrajectoryParams::default(),
        }
    }

    pub fn jdt_ref(mut self, v: JulianDate) -> Self {
        self.params.jdt_ref = v;
        self
    }
    pub fn max_toffset(mut self, v: Second) -> Self {
        self.params.max_toffset = v;
        self
    }
    pub fn velocity_model(mut self, v: VelocityModel) -> Self {
        self.params.velocity_model = v;
        self
    }
    pub fn meas_type(mut self, v: MeasurementType) -> Self {
        self.params.meas_type = v;
        self
    }
    pub fn num_monte(mut self, v: u32) -> Self {
        self.params.num_monte = v;
        self
    }
    pub fn verbose(mut self, v: u8) -> Self {
        self.params.verbose = v;
        self
    }
    pub fn max_cameras(mut self, v: usize) -> Self {
        self.params.max_cameras = v;
        self
    }
    pub fn parallel_epsilon(mut self, v: f64) -> Self {
        self.params.parallel_epsilon = v;
        self
    }
    pub fn lag_fit_fraction(mut self, v: f64) -> Self {
        self.params.lag_window.fraction = v;
        self
    }
    pub fn lag_fit_min_points(mut self, v: usize) -> Self {
        self.params.lag_window.min_points = v;
        self
    }
    pub fn traj_id(mut self, v: impl Into<String>) -> Self {
        self.params.traj_id = Some(v.into());
        self
    }
    pub fn comment(mut self, v: impl Into<String>) -> Self {
        self.params.comment = v.into();
        self
    }

    /// Return true iff x > 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater)
    }

    /// Return true iff x >= 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn ge0(x: f64) -> bool {
        matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal))
    }

    /// Finalize the builder.
    ///
    /// Validation rules
    /// ----------------
    /// * `jdt_ref` finite and `> 0`.
    /// * `max_toffset >= 0`.
    /// * `num_monte >= 1`, `verbose <= 3`, `max_cameras >= 1`.
    /// * `parallel_epsilon >= 0`.
    /// * `0 < lag_fit_fraction <= 1`.
    ///
    /// Errors
    /// ------
    /// * [`TrajectoryError::InvalidParameter`] naming the first rule violated.
    pub fn build(self) -> Result<TrajectoryParams, TrajectoryError> {
        let p = &self.params;

        if !(p.jdt_ref.is_finite() && Self::gt0(p.jdt_ref)) {
            return Err(TrajectoryError::InvalidParameter(format!(
                "jdt_ref must be a finite positive Julian date, got {}",
                p.jdt_ref
            )));
        }
        if !(Self::ge0(p.max_toffset) && p.max_toffset.is_finite()) {
            return Err(TrajectoryError::InvalidParameter(
                "max_toffset must be >= 0".into(),
            ));
        }
        if p.num_monte < 1 {
            return Err(TrajectoryError::InvalidParameter(
                "num_monte must be >= 1".into(),
            ));
        }
        if p.verbose > 3 {
            return Err(TrajectoryError::InvalidParameter(format!(
                "verbose must be in 0..=3, got {}",
                p.verbose
            )));
        }
        if p.max_cameras < 1 {
            return Err(TrajectoryError::InvalidParameter(
                "max_cameras must be >= 1".into(),
            ));
        }
        if !Self::ge0(p.parallel_epsilon) {
            return Err(TrajectoryError::InvalidParameter(
                "parallel_epsilon must be >= 0".into(),
            ));
        }
        if !(Self::gt0(p.lag_window.fraction) && p.lag_window.fraction <= 1.0) {
            return Err(TrajectoryError::InvalidParameter(
                "lag_fit_fraction must be in (0, 1]".into(),
            ));
        }

        Ok(self.params)
    }
}
