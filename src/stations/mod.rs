//! # Stations & measurements
//!
//! A [`Station`] is one independently clocked camera site: its identity, its geodetic
//! position on the WGS84 ellipsoid and the chronological series of [`Measurement`]s it recorded.
//!
//! ## Invariants
//!
//! - Latitude in [−π/2, π/2], longitude normalized to (−π, π], height ≥ −1000 m.
//! - Geometry is stored as `NotNan<f64>`, so a station can never carry a NaN position.
//! - Measurements are appended in chronological order (repeated timestamps are allowed).
//! - Bad picks are kept with their `ignored` flag set: they are excluded from fitting but still
//!   reported.
//!
//! ## Units
//!
//! - Angles: **radians**
//! - Height: **meters**
//! - Measurement time: **seconds** relative to the run's reference Julian date

use ordered_float::NotNan;
use serde::{Deserialize, Serialize};

use crate::constants::{Meter, Radian, Second, MIN_STATION_HEIGHT};
use crate::geodetic::{normalize_longitude, GeodeticCoord};
use crate::traj_errors::TrajectoryError;

/// One timestamped angular measurement of a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Time offset from the reference epoch, in seconds (signed).
    pub time: Second,
    /// First angle channel (radians), meaning depends on the measurement convention.
    pub meas1: Radian,
    /// Second angle channel (radians).
    pub meas2: Radian,
    /// Optional noise estimate (radians).
    pub noise: Option<Radian>,
    /// Optional apparent magnitude.
    pub magnitude: Option<f64>,
    /// Bad pick: excluded from fitting, kept for reporting.
    pub ignored: bool,
}

impl Measurement {
    pub fn new(time: Second, meas1: Radian, meas2: Radian) -> Self {
        Measurement {
            time,
            meas1,
            meas2,
            noise: None,
            magnitude: None,
            ignored: false,
        }
    }

    pub fn with_noise(mut self, noise: Radian) -> Self {
        self.noise = Some(noise);
        self
    }

    pub fn with_magnitude(mut self, magnitude: f64) -> Self {
        self.magnitude = Some(magnitude);
        self
    }

    pub fn with_ignored(mut self, ignored: bool) -> Self {
        self.ignored = ignored;
        self
    }

    fn is_finite(&self) -> bool {
        self.time.is_finite()
            && self.meas1.is_finite()
            && self.meas2.is_finite()
            && self.noise.map_or(true, f64::is_finite)
    }
}

/// Observing station with its measurement series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Station identifier.
    pub id: String,
    /// Optional observation identifier.
    pub obs_id: Option<String>,
    /// Free-text comment.
    pub comment: Option<String>,
    /// Relative weight of the station in the trajectory fit.
    pub weight: f64,
    /// Whether the meteor began inside the field of view.
    pub fov_beg: Option<bool>,
    /// Whether the meteor ended inside the field of view.
    pub fov_end: Option<bool>,

    lat: NotNan<f64>,
    lon: NotNan<f64>,
    height: NotNan<f64>,
    measurements: Vec<Measurement>,
}

impl Station {
    /// Create a station from its geodetic position.
    ///
    /// Arguments
    /// ---------
    /// * `id`: station identifier.
    /// * `lat`: geodetic latitude in **radians**.
    /// * `lon`: east longitude in **radians** (any range, normalized to (−π, π]).
    /// * `height`: height above the ellipsoid in **meters**.
    ///
    /// Errors
    /// ------
    /// * [`TrajectoryError::InvalidStation`] if a coordinate is NaN, the latitude is out of range or
    ///   the height lies below −1000 m.
    pub fn new(
        id: impl Into<String>,
        lat: Radian,
        lon: Radian,
        height: Meter,
    ) -> Result<Station, TrajectoryError> {
        let id = id.into();

        let lat = NotNan::new(lat)?;
        let lon = NotNan::new(normalize_longitude(lon))?;
        let height = NotNan::new(height)?;

        if lat.abs() > std::f64::consts::FRAC_PI_2 {
            return Err(TrajectoryError::InvalidStation(format!(
                "{id}: latitude {lat} rad outside [-pi/2, pi/2]"
            )));
        }
        if !lon.is_finite() || !height.is_finite() {
            return Err(TrajectoryError::InvalidStation(format!(
                "{id}: non-finite position"
            )));
        }
        if *height < MIN_STATION_HEIGHT {
            return Err(TrajectoryError::InvalidStation(format!(
                "{id}: height {height} m below {MIN_STATION_HEIGHT} m"
            )));
        }

        Ok(Station {
            id,
            obs_id: None,
            comment: None,
            weight: 1.0,
            fov_beg: None,
            fov_end: None,
            lat,
            lon,
            height,
            measurements: Vec::new(),
        })
    }

    pub fn with_obs_id(mut self, obs_id: impl Into<String>) -> Self {
        self.obs_id = Some(obs_id.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_fov(mut self, fov_beg: bool, fov_end: bool) -> Self {
        self.fov_beg = Some(fov_beg);
        self.fov_end = Some(fov_end);
        self
    }

    /// Append a measurement at the end of the series.
    ///
    /// Errors
    /// ------
    /// * [`TrajectoryError::InvalidStation`] if the measurement holds a non-finite value or is
    ///   older than the last appended one.
    pub fn push(&mut self, measurement: Measurement) -> Result<(), TrajectoryError> {
        if !measurement.is_finite() {
            return Err(TrajectoryError::InvalidStation(format!(
                "{}: non-finite measurement at t = {}",
                self.id, measurement.time
            )));
        }
        if let Some(last) = self.measurements.last() {
            if measurement.time < last.time {
                return Err(TrajectoryError::InvalidStation(format!(
                    "{}: measurement at t = {} s precedes t = {} s",
                    self.id, measurement.time, last.time
                )));
            }
        }
        self.measurements.push(measurement);
        Ok(())
    }

    /// Append every measurement of an iterator, see [`Station::push`].
    pub fn extend<I>(&mut self, measurements: I) -> Result<(), TrajectoryError>
    where
        I: IntoIterator<Item = Measurement>,
    {
        measurements.into_iter().try_for_each(|m| self.push(m))
    }

    /// Flag or unflag a measurement as a bad pick.
    pub fn set_ignored(&mut self, index: usize, ignored: bool) -> Result<(), TrajectoryError> {
        let n = self.measurements.len();
        let measurement = self.measurements.get_mut(index).ok_or_else(|| {
            TrajectoryError::InvalidStation(format!(
                "{}: measurement index {index} out of range ({n} measurements)",
                self.id
            ))
        })?;
        measurement.ignored = ignored;
        Ok(())
    }

    pub fn geodetic(&self) -> GeodeticCoord {
        GeodeticCoord {
            lat: *self.lat,
            lon: *self.lon,
            height: *self.height,
        }
    }

    pub fn lat(&self) -> Radian {
        *self.lat
    }

    pub fn lon(&self) -> Radian {
        *self.lon
    }

    pub fn height(&self) -> Meter {
        *self.height
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// Number of measurements not flagged as bad picks.
    pub fn usable_count(&self) -> usize {
        self.measurements.iter().filter(|m| !m.ignored).count()
    }
}

#[cfg(test)]
mod stations_test {
    use std::f64::consts::PI;

    use super::*;

    #[test]
    fn test_station_validation() {
        let station = Station::new("elginfield", 0.7538, 3.0 * PI / 2.0, 329.0).unwrap();
        assert!((station.lon() + PI / 2.0).abs() < 1e-12);
        assert_eq!(station.weight, 1.0);

        assert!(matches!(
            Station::new("bad", 1.6, 0.0, 0.0),
            Err(TrajectoryError::InvalidStation(_))
        ));
        assert!(matches!(
            Station::new("bad", 0.2, 0.0, -1500.0),
            Err(TrajectoryError::InvalidStation(_))
        ));
        assert_eq!(
            Station::new("bad", f64::NAN, 0.0, 0.0),
            Err(TrajectoryError::InvalidStation(
                "NaN encountered in station geometry".into()
            ))
        );
        assert!(Station::new("deep", 0.2, 0.0, -1000.0).is_ok());
    }

    #[test]
    fn test_push_keeps_chronological_order() {
        let mut station = Station::new("tavistock", 0.753, -1.411, 324.0).unwrap();
        station
            .extend([
                Measurement::new(0.0, 1.0, 0.5),
                Measurement::new(0.1, 1.0, 0.5),
                Measurement::new(0.1, 1.0, 0.5).with_magnitude(-2.5),
            ])
            .unwrap();
        assert_eq!(station.len(), 3);

        let err = station.push(Measurement::new(0.05, 1.0, 0.5)).unwrap_err();
        assert!(matches!(err, TrajectoryError::InvalidStation(_)));
        assert!(station
            .push(Measurement::new(0.3, f64::NAN, 0.5))
            .is_err());
        assert_eq!(station.len(), 3);
    }

    #[test]
    fn test_ignored_flag() {
        let mut station = Station::new("kincardine", 0.77, -1.42, 200.0).unwrap();
        station
            .extend((0..5).map(|i| Measurement::new(i as f64 * 0.1, 1.0, 0.5)))
            .unwrap();

        station.set_ignored(2, true).unwrap();
        assert_eq!(station.usable_count(), 4);
        assert!(station.measurements()[2].ignored);
        assert!(station.set_ignored(9, true).is_err());
    }
}
