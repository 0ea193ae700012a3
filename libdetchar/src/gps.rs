//! Conversion between GPS seconds and UTC.
use time::format_description::well_known::Rfc3339;
use time::macros::datetime;
use time::OffsetDateTime;

use super::error::GpsError;

const GPS_EPOCH: OffsetDateTime = datetime!(1980-01-06 0:00 UTC);

/// UTC instants at which a leap second had just been inserted
const LEAP_SECONDS: [OffsetDateTime; 18] = [
    datetime!(1981-07-01 0:00 UTC),
    datetime!(1982-07-01 0:00 UTC),
    datetime!(1983-07-01 0:00 UTC),
    datetime!(1985-07-01 0:00 UTC),
    datetime!(1988-01-01 0:00 UTC),
    datetime!(1990-01-01 0:00 UTC),
    datetime!(1991-01-01 0:00 UTC),
    datetime!(1992-07-01 0:00 UTC),
    datetime!(1993-07-01 0:00 UTC),
    datetime!(1994-07-01 0:00 UTC),
    datetime!(1996-01-01 0:00 UTC),
    datetime!(1997-07-01 0:00 UTC),
    datetime!(1999-01-01 0:00 UTC),
    datetime!(2006-01-01 0:00 UTC),
    datetime!(2009-01-01 0:00 UTC),
    datetime!(2012-07-01 0:00 UTC),
    datetime!(2015-07-01 0:00 UTC),
    datetime!(2017-01-01 0:00 UTC),
];

fn seconds_since_epoch(utc: OffsetDateTime) -> f64 {
    (utc - GPS_EPOCH).as_seconds_f64()
}

/// Convert a UTC instant to GPS seconds
pub fn utc_to_gps(utc: OffsetDateTime) -> f64 {
    let leaps = LEAP_SECONDS.iter().filter(|leap| **leap <= utc).count();
    seconds_since_epoch(utc) + leaps as f64
}

/// Convert GPS seconds to a UTC instant
pub fn gps_to_utc(gps: f64) -> Result<OffsetDateTime, GpsError> {
    if !gps.is_finite() {
        return Err(GpsError::NotFinite(gps));
    }
    let leaps = LEAP_SECONDS
        .iter()
        .enumerate()
        .filter(|(i, leap)| gps >= seconds_since_epoch(**leap) + (*i + 1) as f64)
        .count();
    let unix = GPS_EPOCH.unix_timestamp() as f64 + gps - leaps as f64;
    let whole = unix.floor();
    let nanos = ((unix - whole) * 1e9).round() as i128;
    Ok(OffsetDateTime::from_unix_timestamp_nanos(
        whole as i128 * 1_000_000_000 + nanos,
    )?)
}

/// RFC 3339 rendering of a GPS time, for logs and metadata
pub fn format_gps(gps: f64) -> Result<String, GpsError> {
    Ok(gps_to_utc(gps)?.format(&Rfc3339)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch() {
        assert_eq!(gps_to_utc(0.0).unwrap(), GPS_EPOCH);
        assert_eq!(utc_to_gps(GPS_EPOCH), 0.0);
    }

    #[test]
    fn test_known_times() {
        assert_eq!(
            gps_to_utc(1_000_000_000.0).unwrap(),
            datetime!(2011-09-14 1:46:25 UTC)
        );
        assert_eq!(utc_to_gps(datetime!(2017-01-01 0:00 UTC)), 1_167_264_018.0);
        assert_eq!(
            gps_to_utc(1_167_264_018.0).unwrap(),
            datetime!(2017-01-01 0:00 UTC)
        );
        assert_eq!(format_gps(1_000_000_000.5).unwrap(), "2011-09-14T01:46:25.5Z");
    }

    #[test]
    fn test_round_trip_across_leap() {
        for gps in [1_167_264_016.0, 1_167_264_019.0, 1_400_000_000.25] {
            let utc = gps_to_utc(gps).unwrap();
            assert_eq!(utc_to_gps(utc), gps);
        }
    }

    #[test]
    fn test_not_finite() {
        assert!(matches!(gps_to_utc(f64::NAN), Err(GpsError::NotFinite(_))));
    }
}
