//! # Trajectory snapshots
//!
//! A reduced trajectory ([`TrajectoryResult`]) is persisted as one JSON document, keyed by the
//! reference epoch and the velocity model:
//!
//! ```text
//! {YYYYMMDD_HHMMSS}_gural{model}{fha}_trajectory.json
//! ```
//!
//! where the date is the UTC calendar date of `jdt_ref`. Snapshots are immutable: saving twice
//! overwrites the file with identical content.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use crate::constants::JulianDate;
use crate::solver::solution::VelocityModel;
use crate::time::jd_to_file_stamp;
use crate::traj_errors::TrajectoryError;
use crate::trajectory::TrajectoryResult;

/// File name of the snapshot of a trajectory.
///
/// Arguments
/// ---------
/// * `jdt_ref`: reference Julian date of the run.
/// * `velocity_model`: velocity model selector of the run.
///
/// Return
/// ------
/// * e.g. `20160929_062945_gural3fha_trajectory.json`
pub fn snapshot_file_name(jdt_ref: JulianDate, velocity_model: &VelocityModel) -> String {
    format!(
        "{}_gural{velocity_model}_trajectory.json",
        jd_to_file_stamp(jdt_ref)
    )
}

impl TrajectoryResult {
    /// File name of this trajectory's snapshot, see [`snapshot_file_name`].
    pub fn snapshot_file_name(&self) -> String {
        snapshot_file_name(self.params.jdt_ref, &self.params.velocity_model)
    }

    /// Write the snapshot into `dir`, creating the directory if needed.
    ///
    /// Return
    /// ------
    /// * Path of the written file.
    pub fn save_snapshot(&self, dir: &Utf8Path) -> Result<Utf8PathBuf, TrajectoryError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.snapshot_file_name());

        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;

        info!(%path, "trajectory snapshot saved");
        Ok(path)
    }

    /// Read a snapshot written by [`TrajectoryResult::save_snapshot`].
    pub fn load_snapshot(path: &Utf8Path) -> Result<TrajectoryResult, TrajectoryError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod snapshot_test {
    use super::*;

    #[test]
    fn test_file_name() {
        let model: VelocityModel = "3fha".parse().unwrap();
        assert_eq!(
            snapshot_file_name(2457660.770667, &model),
            "20160929_062945_gural3fha_trajectory.json"
        );

        let model: VelocityModel = "0".parse().unwrap();
        assert_eq!(
            snapshot_file_name(2451545.2500001, &model),
            "20000101_180000_gural0_trajectory.json"
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("missing.json")).unwrap();
        assert!(matches!(
            TrajectoryResult::load_snapshot(&path),
            Err(TrajectoryError::IoError(_))
        ));

        let garbage = Utf8PathBuf::from_path_buf(dir.path().join("garbage.json")).unwrap();
        fs::write(&garbage, "{ not json").unwrap();
        assert!(matches!(
            TrajectoryResult::load_snapshot(&garbage),
            Err(TrajectoryError::SerializationError(_))
        ));
    }
}
