//! # Line-of-sight builder
//!
//! Turns every [`Measurement`](crate::stations::Measurement) of a station into a ray in ECI space:
//! the station's ECI position at the true epoch of the measurement and the unit direction towards
//! the observed point.
//!
//! ## Timing
//!
//! Stations are independently clocked. The trajectory fit returns one timing offset per station
//! and every downstream quantity uses the corrected time
//!
//! ```text
//! t  = time + tref_offset[station]        (seconds)
//! jd = jdt_ref + t / 86400
//! ```
//!
//! Lines of sight are pure derivations: they are rebuilt whenever the epoch or the timing
//! offsets change and are never edited in place.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::constants::{JulianDate, Second};
use crate::geodetic::{geo_to_eci, ra_dec_to_eci};
use crate::measurement::MeasurementType;
use crate::stations::Station;
use crate::time::offset_to_jd;

/// Observation ray of a single measurement, in ECI coordinates (meters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineOfSight {
    /// ECI position of the station at the measurement epoch (meters).
    pub station_eci: Vector3<f64>,
    /// Unit ECI direction of the line of sight.
    pub direction: Vector3<f64>,
    /// Timing-corrected offset from the reference epoch (seconds).
    pub time: Second,
    /// Julian date of the measurement.
    pub jd: JulianDate,
    /// Copied from the measurement's bad-pick flag.
    pub ignored: bool,
}

/// Build the lines of sight of every measurement of a station.
///
/// Arguments
/// ---------
/// * `station`: the observing station and its measurements.
/// * `meas_type`: convention of the measurement angle channels.
/// * `jdt_ref`: reference Julian date of the run.
/// * `tref_offset`: timing offset of this station in seconds, as fitted by the solver.
///
/// Return
/// ------
/// * One [`LineOfSight`] per measurement, in measurement order. A station without measurements
///   yields an empty vector.
pub fn build_lines_of_sight(
    station: &Station,
    meas_type: MeasurementType,
    jdt_ref: JulianDate,
    tref_offset: Second,
) -> Vec<LineOfSight> {
    let site = station.geodetic();

    station
        .measurements()
        .iter()
        .map(|m| {
            let time = m.time + tref_offset;
            let jd = offset_to_jd(jdt_ref, time);

            let (ra, dec) = meas_type.to_line_of_sight(m.meas1, m.meas2, &site, jdt_ref, jd);

            LineOfSight {
                station_eci: geo_to_eci(site.lat, site.lon, site.height, jd),
                direction: ra_dec_to_eci(ra, dec),
                time,
                jd,
                ignored: m.ignored,
            }
        })
        .collect()
}
