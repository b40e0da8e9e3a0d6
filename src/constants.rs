//! # Constants and type definitions for meteortraj
//!
//! This module centralizes the **physical constants**, **conversion factors**, and **unit aliases**
//! used throughout the crate.
//!
//! ## Overview
//!
//! - Geodetic constants of the WGS84 reference ellipsoid
//! - Time constants (Julian ↔ Modified Julian dates, seconds per day)
//! - Unit conversions (kilometers ↔ meters, arcseconds ↔ radians)
//! - Type aliases documenting the unit carried by a bare `f64`
//!
//! Internally, angles are always **radians**, distances **meters** and velocities **m/s**.
//! Kilometers only appear at the solver boundary (see [`crate::solver`]).

// -------------------------------------------------------------------------------------------------
// Physical constants and unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for trigonometric conversions
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Number of seconds in a Julian day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// MJD epoch of J2000.0 (2000-01-01 12:00:00 TT)
pub const T2000: f64 = 51544.5;

/// Conversion factor between Julian Date and Modified Julian Date
pub const JDTOMJD: f64 = 2400000.5;

/// Arcseconds → radians
pub const RADSEC: f64 = std::f64::consts::PI / 648000.0;

/// Kilometers → meters
pub const KM_TO_M: f64 = 1000.0;

/// Earth equatorial radius in meters (WGS84)
pub const EARTH_MAJOR_AXIS: f64 = 6_378_137.0;

/// Earth polar radius in meters (WGS84)
pub const EARTH_MINOR_AXIS: f64 = 6_356_752.314245;

/// First eccentricity squared of the WGS84 ellipsoid
pub const EARTH_E2: f64 =
    1.0 - (EARTH_MINOR_AXIS * EARTH_MINOR_AXIS) / (EARTH_MAJOR_AXIS * EARTH_MAJOR_AXIS);

/// Ratio of sidereal day to solar day
pub const SIDEREAL_RATE: f64 = 1.00273790934;

/// Lowest accepted station height in meters
pub const MIN_STATION_HEIGHT: f64 = -1000.0;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in radians
pub type Radian = f64;
/// Angle in arcseconds
pub type ArcSec = f64;
/// Distance in kilometers
pub type Kilometer = f64;
/// Distance in meters
pub type Meter = f64;
/// Time offset in seconds
pub type Second = f64;
/// Velocity in meters per second
pub type MeterPerSecond = f64;
/// Julian Date (days)
pub type JulianDate = f64;
/// Modified Julian Date (days)
pub type MJD = f64;
