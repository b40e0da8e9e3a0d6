//! # Geodetic ↔ ECI transforms
//!
//! Conversions between geodetic coordinates on the WGS84 ellipsoid, Earth-fixed Cartesian
//! coordinates (ECEF) and Earth-Centered Inertial coordinates (ECI, equatorial of date).
//!
//! ## Frames & conventions
//!
//! ```text
//! (lat, lon, h)  --(ellipsoid)-->  ECEF  --(rotation by GMST about z)-->  ECI
//! ```
//!
//! The Earth rotation angle is the Greenwich mean sidereal time of the Julian date
//! ([`gmst`](crate::time::gmst)), so the same geodetic point maps to a different ECI triple at
//! different times.
//!
//! ## Units
//!
//! - Latitude / longitude / azimuth / elevation / RA / Dec: **radians**
//! - Heights and Cartesian coordinates: **meters**
//! - Azimuth is measured **east of due north**; elevation above the horizon.
//!
//! ## See also
//! * [`crate::measurement`] – normalization of the supported angle conventions into azimuth/elevation.
//! * [`crate::line_of_sight`] – per-measurement station position and unit direction in ECI.

use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::constants::{
    JulianDate, Meter, Radian, DPI, EARTH_E2, EARTH_MAJOR_AXIS, EARTH_MINOR_AXIS,
};
use crate::time::{gmst, jd_to_mjd, local_sidereal_time};

/// Maximum number of fixed-point iterations of the ECEF → geodetic latitude solve.
const GEODETIC_MAX_ITER: usize = 20;

/// Convergence threshold on the geodetic latitude (radians, ~0.06 mm on the ground).
const GEODETIC_LAT_EPS: f64 = 1e-14;

/// Geodetic coordinates on the WGS84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeodeticCoord {
    /// Geodetic latitude in **radians** (+north).
    pub lat: Radian,
    /// Longitude in **radians** (+east), normalized to (−π, π].
    pub lon: Radian,
    /// Height above the ellipsoid in **meters**.
    pub height: Meter,
}

/// Wrap a longitude into (−π, π].
pub fn normalize_longitude(lon: Radian) -> Radian {
    let wrapped = (lon + std::f64::consts::PI).rem_euclid(DPI) - std::f64::consts::PI;
    if wrapped == -std::f64::consts::PI {
        std::f64::consts::PI
    } else {
        wrapped
    }
}

/// Radius of curvature in the prime vertical at geodetic latitude `lat`.
#[inline]
fn prime_vertical_radius(lat: Radian) -> Meter {
    EARTH_MAJOR_AXIS / (1.0 - EARTH_E2 * lat.sin().powi(2)).sqrt()
}

/// Convert geodetic coordinates to Earth-fixed Cartesian coordinates (meters).
pub fn geodetic_to_ecef(lat: Radian, lon: Radian, height: Meter) -> Vector3<f64> {
    let rh = prime_vertical_radius(lat);
    let dist_xy = (rh + height) * lat.cos();

    Vector3::new(
        dist_xy * lon.cos(),
        dist_xy * lon.sin(),
        ((1.0 - EARTH_E2) * rh + height) * lat.sin(),
    )
}

/// Convert Earth-fixed Cartesian coordinates (meters) to geodetic coordinates.
///
/// The geodetic latitude is found by fixed-point iteration on
/// `tan φ = (z + e² N(φ) sin φ) / p`, which converges to sub-millimeter accuracy
/// for points between the Earth's center region and a few thousand kilometers of altitude.
///
/// Remarks
/// -------
/// * Near the poles (`p → 0`) the height is taken along the polar axis to avoid dividing by `cos φ`.
pub fn ecef_to_geodetic(ecef: &Vector3<f64>) -> GeodeticCoord {
    let p = ecef.x.hypot(ecef.y);
    let lon = normalize_longitude(ecef.y.atan2(ecef.x));

    // Start from the geocentric latitude corrected for flattening
    let mut lat = ecef.z.atan2(p * (1.0 - EARTH_E2));
    for _ in 0..GEODETIC_MAX_ITER {
        let rh = prime_vertical_radius(lat);
        let next = (ecef.z + EARTH_E2 * rh * lat.sin()).atan2(p);
        let delta = (next - lat).abs();
        lat = next;
        if delta < GEODETIC_LAT_EPS {
            break;
        }
    }

    let rh = prime_vertical_radius(lat);
    let height = if lat.cos().abs() > 1e-10 {
        p / lat.cos() - rh
    } else {
        ecef.z.abs() - EARTH_MINOR_AXIS
    };

    GeodeticCoord { lat, lon, height }
}

/// Rotation taking Earth-fixed vectors into the ECI frame at a given Julian date.
fn earth_rotation(jd: JulianDate) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Vector3::z_axis(), gmst(jd_to_mjd(jd)))
}

/// Convert geodetic coordinates at a Julian date into ECI coordinates (meters).
///
/// Arguments
/// ---------
/// * `lat`: geodetic latitude (radians)
/// * `lon`: east longitude (radians)
/// * `height`: height above the ellipsoid (**meters**, callers holding kilometers convert first)
/// * `jd`: Julian date fixing the Earth rotation angle
///
/// Return
/// ------
/// * ECI position vector in meters
pub fn geo_to_eci(lat: Radian, lon: Radian, height: Meter, jd: JulianDate) -> Vector3<f64> {
    earth_rotation(jd) * geodetic_to_ecef(lat, lon, height)
}

/// Inverse of [`geo_to_eci`]: ECI position (meters) at a Julian date to geodetic coordinates.
pub fn eci_to_geo(eci: &Vector3<f64>, jd: JulianDate) -> GeodeticCoord {
    let ecef = earth_rotation(jd).inverse() * *eci;
    ecef_to_geodetic(&ecef)
}

/// Unit ECI direction vector of a (RA, Dec) pair.
pub fn ra_dec_to_eci(ra: Radian, dec: Radian) -> Vector3<f64> {
    Vector3::new(dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin())
}

/// Right ascension in [0, 2π) and declination of an ECI direction.
///
/// A zero vector maps to `(0, 0)`.
pub fn eci_to_ra_dec(direction: &Vector3<f64>) -> (Radian, Radian) {
    let norm = direction.norm();
    if norm == 0. {
        return (0.0, 0.0);
    }

    let dec = (direction.z / norm).clamp(-1.0, 1.0).asin();
    let ra = direction.y.atan2(direction.x).rem_euclid(DPI);
    (ra, dec)
}

/// Convert horizontal coordinates into equatorial coordinates of date.
///
/// Arguments
/// ---------
/// * `azim`: azimuth, east of due north (radians)
/// * `elev`: elevation above the horizon (radians)
/// * `jd`: Julian date of the observation
/// * `lat`, `lon`: geodetic latitude and east longitude of the site (radians)
///
/// Return
/// ------
/// * `(ra, dec)` in radians, `ra` in [0, 2π)
pub fn altaz_to_radec(
    azim: Radian,
    elev: Radian,
    jd: JulianDate,
    lat: Radian,
    lon: Radian,
) -> (Radian, Radian) {
    let lst = local_sidereal_time(jd, lon);

    let ha = (-azim.sin()).atan2(elev.tan() * lat.cos() - azim.cos() * lat.sin());
    let ra = (lst - ha).rem_euclid(DPI);
    let dec = (lat.sin() * elev.sin() + lat.cos() * elev.cos() * azim.cos())
        .clamp(-1.0, 1.0)
        .asin();

    (ra, dec)
}

/// Convert equatorial coordinates of date into horizontal coordinates.
///
/// Inverse of [`altaz_to_radec`]; returns `(azimuth east of north in [0, 2π), elevation)`.
pub fn radec_to_altaz(
    ra: Radian,
    dec: Radian,
    jd: JulianDate,
    lat: Radian,
    lon: Radian,
) -> (Radian, Radian) {
    let lst = local_sidereal_time(jd, lon);
    let ha = lst - ra;

    let azim = (-ha.sin())
        .atan2(dec.tan() * lat.cos() - ha.cos() * lat.sin())
        .rem_euclid(DPI);
    let elev = (lat.sin() * dec.sin() + lat.cos() * dec.cos() * ha.cos())
        .clamp(-1.0, 1.0)
        .asin();

    (azim, elev)
}

#[cfg(test)]
mod geodetic_test {
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    use approx::assert_abs_diff_eq;

    use super::*;

    const JD: f64 = 2457660.770667;

    #[test]
    fn test_ecef_equator() {
        let ecef = geodetic_to_ecef(0.0, 0.0, 0.0);
        assert_abs_diff_eq!(ecef.x, EARTH_MAJOR_AXIS, epsilon = 1e-6);
        assert_abs_diff_eq!(ecef.y, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ecef.z, 0.0, epsilon = 1e-6);

        let pole = geodetic_to_ecef(FRAC_PI_2, 0.0, 0.0);
        assert_abs_diff_eq!(pole.z, EARTH_MINOR_AXIS, epsilon = 1e-3);
    }

    #[test]
    fn test_geo_eci_round_trip() {
        let sites = [
            (43.2642_f64.to_radians(), -80.77209_f64.to_radians()),
            (-33.9_f64.to_radians(), 151.2_f64.to_radians()),
            (78.2_f64.to_radians(), 15.6_f64.to_radians()),
            (0.0, PI),
            (-89.9_f64.to_radians(), -179.9_f64.to_radians()),
        ];

        for (lat, lon) in sites {
            for height in [0.0, 329.0, 10_000.0, 85_000.0, 120_000.0, 200_000.0] {
                let eci = geo_to_eci(lat, lon, height, JD);
                let geo = eci_to_geo(&eci, JD);

                let back = geodetic_to_ecef(geo.lat, geo.lon, geo.height);
                let orig = geodetic_to_ecef(lat, lon, height);
                assert!((back - orig).norm() < 1.0, "round trip drift at ({lat}, {lon}, {height})");

                assert_abs_diff_eq!(geo.lat, lat, epsilon = 1e-9);
                assert_abs_diff_eq!(geo.height, height, epsilon = 1e-3);
                assert_abs_diff_eq!(
                    normalize_longitude(geo.lon - lon),
                    0.0,
                    epsilon = 1e-9
                );
            }
        }
    }

    #[test]
    fn test_eci_depends_on_time() {
        let lat = 45.0_f64.to_radians();
        let a = geo_to_eci(lat, 0.3, 100.0, JD);
        let b = geo_to_eci(lat, 0.3, 100.0, JD + 0.25);

        // Same radius and z, rotated by roughly a quarter of a sidereal turn
        assert_abs_diff_eq!(a.norm(), b.norm(), epsilon = 1e-6);
        assert_abs_diff_eq!(a.z, b.z, epsilon = 1e-6);
        assert!((a - b).norm() > 1.0e6);
    }

    #[test]
    fn test_normalize_longitude() {
        assert_abs_diff_eq!(normalize_longitude(3.0 * PI / 2.0), -FRAC_PI_2, epsilon = 1e-12);
        assert_abs_diff_eq!(normalize_longitude(-PI), PI, epsilon = 1e-12);
        assert_abs_diff_eq!(normalize_longitude(FRAC_PI_4), FRAC_PI_4, epsilon = 1e-15);
    }

    #[test]
    fn test_ra_dec_eci() {
        let v = ra_dec_to_eci(1.2, -0.4);
        assert_abs_diff_eq!(v.norm(), 1.0, epsilon = 1e-15);

        let (ra, dec) = eci_to_ra_dec(&(v * 42.0));
        assert_abs_diff_eq!(ra, 1.2, epsilon = 1e-12);
        assert_abs_diff_eq!(dec, -0.4, epsilon = 1e-12);

        assert_eq!(eci_to_ra_dec(&Vector3::zeros()), (0.0, 0.0));
    }

    #[test]
    fn test_altaz_radec_round_trip() {
        let (lat, lon) = (43.19279_f64.to_radians(), -81.31565_f64.to_radians());

        for (azim, elev) in [(0.3, 0.2), (2.1, 0.9), (4.5, 0.05), (5.9, 1.3)] {
            let (ra, dec) = altaz_to_radec(azim, elev, JD, lat, lon);
            let (azim_back, elev_back) = radec_to_altaz(ra, dec, JD, lat, lon);
            assert_abs_diff_eq!(azim_back, azim, epsilon = 1e-9);
            assert_abs_diff_eq!(elev_back, elev, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_zenith_points_along_site_vertical() {
        // Zenith: declination equals the site latitude, RA equals the local sidereal time
        let (lat, lon) = (0.7, -1.4);
        let (ra, dec) = altaz_to_radec(0.0, FRAC_PI_2, JD, lat, lon);
        assert_abs_diff_eq!(dec, lat, epsilon = 1e-9);
        assert_abs_diff_eq!(ra, local_sidereal_time(JD, lon), epsilon = 1e-9);
    }
}
