//! Modification timestamps for staged entries.
//!
//! Data sources report modification times as Unix seconds in their stat
//! record. ZIP stores local MS-DOS date/time fields with two-second
//! precision and a 1980–2107 range, so [`Timestamp::to_dos`] clamps values
//! outside that range.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Datelike, Timelike, Utc};

/// Earliest instant representable in a DOS date field (1980-01-01T00:00:00Z).
const DOS_EPOCH_UNIX_SECS: i64 = 315_532_800;

/// A modification timestamp in whole Unix seconds (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Returns the current time.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Creates a timestamp from Unix seconds.
    pub fn from_unix_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Creates a timestamp from a [`SystemTime`], truncating sub-second
    /// precision. Times before the Unix epoch become negative seconds.
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => Self(d.as_secs() as i64),
            Err(e) => Self(-(e.duration().as_secs() as i64)),
        }
    }

    /// Returns the timestamp as Unix seconds.
    pub fn as_unix_secs(&self) -> i64 {
        self.0
    }

    /// Converts to the ZIP local-header date/time.
    ///
    /// Instants before 1980 map to the DOS epoch; instants after 2107 map to
    /// the latest representable value.
    pub fn to_dos(&self) -> zip::DateTime {
        let secs = self.0.max(DOS_EPOCH_UNIX_SECS);
        let Some(civil) = DateTime::<Utc>::from_timestamp(secs, 0) else {
            return zip::DateTime::default();
        };

        if civil.year() > 2107 {
            return zip::DateTime::from_date_and_time(2107, 12, 31, 23, 59, 58)
                .unwrap_or_default();
        }

        zip::DateTime::from_date_and_time(
            civil.year() as u16,
            civil.month() as u8,
            civil.day() as u8,
            civil.hour() as u8,
            civil.minute() as u8,
            civil.second() as u8,
        )
        .unwrap_or_default()
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_from_system_time() {
        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(Timestamp::from(t).as_unix_secs(), 1_700_000_000);

        let before = UNIX_EPOCH - Duration::from_secs(60);
        assert_eq!(Timestamp::from(before).as_unix_secs(), -60);
    }

    #[test]
    fn test_to_dos_fields() {
        // 2012-11-27T13:45:30Z
        let dos = Timestamp::from_unix_secs(1_354_023_930).to_dos();
        assert_eq!(dos.year(), 2012);
        assert_eq!(dos.month(), 11);
        assert_eq!(dos.day(), 27);
        assert_eq!(dos.hour(), 13);
        assert_eq!(dos.minute(), 45);
        assert_eq!(dos.second(), 30);
    }

    #[test]
    fn test_to_dos_clamps_before_1980() {
        let dos = Timestamp::from_unix_secs(0).to_dos();
        assert_eq!(dos.year(), 1980);
        assert_eq!(dos.month(), 1);
        assert_eq!(dos.day(), 1);
    }

    #[test]
    fn test_now_is_after_dos_epoch() {
        assert!(Timestamp::now().as_unix_secs() > DOS_EPOCH_UNIX_SECS);
    }
}
