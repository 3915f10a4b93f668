#![forbid(unsafe_code)]

//! Wall-clock source for TSTED, TmstFirma, TmstFirmaEnv and FchEmis.

use chrono::{NaiveDate, NaiveDateTime};

/// Format of TSTED, TmstFirma and TmstFirmaEnv.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Format of FchEmis, FchVenc and DD/FE.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// The local wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// A clock stopped at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

pub fn timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn date(day: NaiveDate) -> String {
    day.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formats() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap();
        let clock = FixedClock(at);
        assert_eq!(timestamp(clock.now()), "2024-03-05T07:08:09");
        assert_eq!(date(clock.today()), "2024-03-05");
    }
}
