//! # meteortraj
//!
//! Multi-station meteor trajectory kinematics: from per-station angular measurements to a
//! triangulated trajectory, along-track lengths, velocities, lag and the consensus quantities
//! handed to an orbit computation.
//!
//! ## Pipeline
//!
//! 1. [`stations`] hold the geodetic position and the measurements of each camera.
//! 2. [`solver`] marshals them to an external trajectory optimizer and reads back a
//!    [`TrajectorySolution`](solver::solution::TrajectorySolution).
//! 3. [`line_of_sight`] turns every measurement into an ECI ray, using [`geodetic`] and
//!    [`measurement`] conventions.
//! 4. [`projection`] projects the rays onto the fitted trajectory line.
//! 5. [`kinematics`] reduces each station's points to length, velocity and lag, and
//!    [`kinematics::consensus`] combines the stations.
//! 6. [`trajectory`] chains the stages; [`snapshot`] persists the result.

pub mod constants;
pub mod geodetic;
pub mod kinematics;
pub mod line_of_sight;
pub mod measurement;
pub mod params;
pub mod projection;
pub mod snapshot;
pub mod solver;
pub mod stations;
pub mod time;
pub mod traj_errors;
pub mod trajectory;
