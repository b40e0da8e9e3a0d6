use hifitime::Epoch;

use crate::constants::{JulianDate, Radian, DPI, JDTOMJD, MJD, SIDEREAL_RATE, T2000};

/// Transformation from julian date (JD) in modified julian date (MJD)
#[inline]
pub fn jd_to_mjd(jd: JulianDate) -> MJD {
    jd - JDTOMJD
}

/// Julian date of a point observed `offset` seconds after the reference epoch.
#[inline]
pub fn offset_to_jd(jdt_ref: JulianDate, offset: f64) -> JulianDate {
    jdt_ref + offset / crate::constants::SECONDS_PER_DAY
}

/// Compute the Greenwich Mean Sidereal Time (GMST) in radians
/// for a given Modified Julian Date.
///
/// This function implements the IAU 1982 polynomial formula
/// for the mean sidereal time at 0h UT1, plus the fractional-day
/// correction term due to Earth's rotation rate.
///
/// # Arguments
/// * `tjm` - Modified Julian Date (MJD)
///
/// # Returns
/// * GMST angle in radians, normalized to the interval [0, 2π).
///
/// # References
/// * IAU 1982, IERS Conventions 1996/2000.
/// * Explanatory Supplement to the Astronomical Almanac (1992).
pub fn gmst(tjm: MJD) -> Radian {
    // Polynomial coefficients for GMST at 0h UT1 (in seconds)
    const C0: f64 = 24110.54841;
    const C1: f64 = 8640184.812866;
    const C2: f64 = 9.3104e-2;
    const C3: f64 = -6.2e-6;

    let itjm = tjm.floor();
    let t = (itjm - T2000) / 36525.0;

    // GMST at 0h UT1, seconds to radians
    let gmst0 = (((C3 * t + C2) * t + C1) * t + C0) * DPI / 86400.0;

    // Earth rotation during the elapsed fraction of the day
    let h = (tjm - itjm) * DPI;

    (gmst0 + h * SIDEREAL_RATE).rem_euclid(DPI)
}

/// Local sidereal time at an east longitude, in radians within [0, 2π).
///
/// Arguments
/// ---------
/// * `jd`: Julian date of the observation.
/// * `lon`: east longitude of the site in radians.
pub fn local_sidereal_time(jd: JulianDate, lon: Radian) -> Radian {
    (gmst(jd_to_mjd(jd)) + lon).rem_euclid(DPI)
}

/// Calendar stamp `YYYYMMDD_HHMMSS` (UTC) of a Julian date.
///
/// Used to key persisted trajectory snapshots by their reference epoch.
pub fn jd_to_file_stamp(jd: JulianDate) -> String {
    let epoch = Epoch::from_mjd_utc(jd_to_mjd(jd));
    let (year, month, day, hour, minute, second, _) = epoch.to_gregorian_utc();
    format!("{year:04}{month:02}{day:02}_{hour:02}{minute:02}{second:02}")
}

#[cfg(test)]
mod time_test {
    use super::*;

    #[test]
    fn test_gmst() {
        let tut = 57028.478514610404;
        let res_gmst = gmst(tut);
        assert!((res_gmst - 4.851925725092499).abs() < 1e-12);

        let res_gmst = gmst(T2000);
        assert!((res_gmst - 4.894961212789145).abs() < 1e-12);
    }

    #[test]
    fn test_local_sidereal_time_wraps() {
        let jd = T2000 + JDTOMJD;
        let lst = local_sidereal_time(jd, 3.0);
        assert!((0.0..DPI).contains(&lst));
        assert!((lst - (4.894961212789145 + 3.0 - DPI)).abs() < 1e-9);
    }

    #[test]
    fn test_offset_to_jd() {
        assert_eq!(offset_to_jd(2457660.5, 86400.0), 2457661.5);
        assert_eq!(offset_to_jd(2457660.5, 0.0), 2457660.5);
    }

    #[test]
    fn test_file_stamp() {
        assert_eq!(jd_to_file_stamp(2457660.770667), "20160929_062945");
        assert_eq!(jd_to_file_stamp(2451545.2500001), "20000101_180000");
    }
}
