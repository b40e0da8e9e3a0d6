//! # Measurement angle conventions
//!
//! Stations report each instant as a pair of angles `(meas1, meas2)` in one of four
//! conventions. Everything downstream works with **azimuth east of due north** and
//! **elevation**, so every pair is first normalized through [`MeasurementType::to_azim_elev`].
//!
//! | code | convention | meas1 | meas2 | azimuth (E of N) | elevation |
//! |---|---|---|---|---|---|
//! | 1 | `RaDec`  | RA | Dec | RA/Dec → AltAz at the reference epoch | idem |
//! | 2 | `AzElE`  | azimuth E of N | elevation | identity | identity |
//! | 3 | `AzZenW` | azimuth W of S | zenith | `(az + π) mod 2π` | `π/2 − zenith` |
//! | 4 | `AzZenN` | azimuth N of E | zenith | `(π/2 − az) mod 2π` | `π/2 − zenith` |
//!
//! Unknown codes or names are rejected with
//! [`TrajectoryError::InvalidConvention`](crate::traj_errors::TrajectoryError::InvalidConvention).

use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{JulianDate, Radian, DPI};
use crate::geodetic::{altaz_to_radec, radec_to_altaz, GeodeticCoord};
use crate::traj_errors::TrajectoryError;

/// Convention of the two angle channels of a station's measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementType {
    /// Right ascension and declination of date.
    RaDec,
    /// Azimuth east of due north, elevation.
    AzElE,
    /// Azimuth west of due south, zenith angle.
    AzZenW,
    /// Azimuth north of due east, zenith angle.
    AzZenN,
}

impl MeasurementType {
    /// Numeric selector handed to the trajectory solver.
    pub fn code(&self) -> i32 {
        match self {
            MeasurementType::RaDec => 1,
            MeasurementType::AzElE => 2,
            MeasurementType::AzZenW => 3,
            MeasurementType::AzZenN => 4,
        }
    }

    /// Normalize a measurement pair into `(azimuth east of north, elevation)`.
    ///
    /// Arguments
    /// ---------
    /// * `meas1`, `meas2`: the two angle channels in radians.
    /// * `site`: geodetic position of the observing station (only used for `RaDec`).
    /// * `jdt_ref`: reference Julian date of the run (only used for `RaDec`).
    ///
    /// Return
    /// ------
    /// * `(azimuth, elevation)` in radians, azimuth in [0, 2π).
    pub fn to_azim_elev(
        &self,
        meas1: Radian,
        meas2: Radian,
        site: &GeodeticCoord,
        jdt_ref: JulianDate,
    ) -> (Radian, Radian) {
        match self {
            MeasurementType::RaDec => radec_to_altaz(meas1, meas2, jdt_ref, site.lat, site.lon),
            MeasurementType::AzElE => (meas1, meas2),
            MeasurementType::AzZenW => ((meas1 + PI).rem_euclid(DPI), FRAC_PI_2 - meas2),
            MeasurementType::AzZenN => ((FRAC_PI_2 - meas1).rem_euclid(DPI), FRAC_PI_2 - meas2),
        }
    }

    /// Right ascension and declination of the line of sight of a measurement taken at `jd`.
    ///
    /// The pair is normalized with [`MeasurementType::to_azim_elev`] and the horizontal
    /// direction is then turned into equatorial coordinates of date at the point's own epoch.
    pub fn to_line_of_sight(
        &self,
        meas1: Radian,
        meas2: Radian,
        site: &GeodeticCoord,
        jdt_ref: JulianDate,
        jd: JulianDate,
    ) -> (Radian, Radian) {
        let (azim, elev) = self.to_azim_elev(meas1, meas2, site, jdt_ref);
        altaz_to_radec(azim, elev, jd, site.lat, site.lon)
    }
}

impl TryFrom<i32> for MeasurementType {
    type Error = TrajectoryError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(MeasurementType::RaDec),
            2 => Ok(MeasurementType::AzElE),
            3 => Ok(MeasurementType::AzZenW),
            4 => Ok(MeasurementType::AzZenN),
            other => Err(TrajectoryError::InvalidConvention(other.to_string())),
        }
    }
}

impl FromStr for MeasurementType {
    type Err = TrajectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RaDec" => Ok(MeasurementType::RaDec),
            "AzElE" => Ok(MeasurementType::AzElE),
            "AzZenW" => Ok(MeasurementType::AzZenW),
            "AzZenN" => Ok(MeasurementType::AzZenN),
            other => Err(TrajectoryError::InvalidConvention(other.to_string())),
        }
    }
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MeasurementType::RaDec => "RaDec",
            MeasurementType::AzElE => "AzElE",
            MeasurementType::AzZenW => "AzZenW",
            MeasurementType::AzZenN => "AzZenN",
        };
        write!(f, "{name}")
    }
}
