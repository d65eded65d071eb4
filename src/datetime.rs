//! Module containing functionality related to BSON datetimes.

use std::time::{SystemTime, UNIX_EPOCH};

/// A BSON datetime: a signed 64-bit count of milliseconds since the Unix
/// epoch.
///
/// To convert to and from [`chrono::DateTime`], enable the `chrono-0_4`
/// feature flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime(i64);

impl DateTime {
    /// The earliest representable datetime.
    pub const MIN: DateTime = DateTime(i64::MIN);

    /// The latest representable datetime.
    pub const MAX: DateTime = DateTime(i64::MAX);

    /// Makes a new datetime from the number of non-leap milliseconds since
    /// the Unix epoch.
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the number of non-leap milliseconds since the Unix epoch.
    pub const fn timestamp_millis(self) -> i64 {
        self.0
    }

    /// The current time, truncated to millisecond precision.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Convert the given [`SystemTime`], saturating at the representable
    /// range.
    pub fn from_system_time(st: SystemTime) -> Self {
        match st.duration_since(UNIX_EPOCH) {
            Ok(d) => Self(i64::try_from(d.as_millis()).unwrap_or(i64::MAX)),
            // Handle times before the epoch.
            Err(e) => Self(
                i64::try_from(e.duration().as_millis())
                    .map(i64::saturating_neg)
                    .unwrap_or(i64::MIN),
            ),
        }
    }

    /// Convert to a [`chrono::DateTime`], saturating at chrono's
    /// representable range.
    #[cfg(feature = "chrono-0_4")]
    pub fn to_chrono(self) -> chrono::DateTime<chrono::Utc> {
        use chrono::TimeZone;
        match chrono::Utc.timestamp_millis_opt(self.0) {
            chrono::LocalResult::Single(dt) => dt,
            _ if self.0 < 0 => chrono::DateTime::<chrono::Utc>::MIN_UTC,
            _ => chrono::DateTime::<chrono::Utc>::MAX_UTC,
        }
    }

    /// Convert from a [`chrono::DateTime`], truncating to millisecond
    /// precision.
    #[cfg(feature = "chrono-0_4")]
    pub fn from_chrono<T: chrono::TimeZone>(dt: chrono::DateTime<T>) -> Self {
        Self(dt.timestamp_millis())
    }
}

#[cfg(feature = "chrono-0_4")]
impl<T: chrono::TimeZone> From<chrono::DateTime<T>> for DateTime {
    fn from(dt: chrono::DateTime<T>) -> Self {
        Self::from_chrono(dt)
    }
}

#[cfg(feature = "chrono-0_4")]
impl From<DateTime> for chrono::DateTime<chrono::Utc> {
    fn from(dt: DateTime) -> Self {
        dt.to_chrono()
    }
}

impl From<SystemTime> for DateTime {
    fn from(st: SystemTime) -> Self {
        Self::from_system_time(st)
    }
}

#[cfg(test)]
mod tests {
    use super::DateTime;

    #[test]
    fn millis_round_trip() {
        let dt = DateTime::from_millis(1_356_351_330_501);
        assert_eq!(dt.timestamp_millis(), 1_356_351_330_501);
        assert!(dt > DateTime::from_millis(0));
        assert!(DateTime::from_millis(-1) < DateTime::from_millis(0));
    }

    #[cfg(feature = "chrono-0_4")]
    #[test]
    fn chrono_round_trip() {
        let chrono_dt: chrono::DateTime<chrono::Utc> =
            "2012-12-24T12:15:30.501Z".parse().unwrap();
        let dt = DateTime::from_chrono(chrono_dt);
        assert_eq!(dt.timestamp_millis(), 1_356_351_330_501);
        assert_eq!(dt.to_chrono(), chrono_dt);
    }
}
