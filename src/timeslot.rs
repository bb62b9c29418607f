//! Minute-resolution time arithmetic for the weekly timetable.
//!
//! Times of day are stored as `HH:MM` text and compared as minutes since
//! midnight. Windows are half-open: `[start, end)`, so back-to-back classes
//! (`08:00-10:00` then `10:00-12:00`) never overlap.

use std::fmt;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Day of the teaching week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
        Day::Sunday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Day::Monday => "monday",
            Day::Tuesday => "tuesday",
            Day::Wednesday => "wednesday",
            Day::Thursday => "thursday",
            Day::Friday => "friday",
            Day::Saturday => "saturday",
            Day::Sunday => "sunday",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        Day::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::BadRequest(format!("unknown day: {}", s)))
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True iff `[start_a, end_a)` and `[start_b, end_b)` share at least one minute.
#[inline]
pub fn overlaps(start_a: u32, end_a: u32, start_b: u32, end_b: u32) -> bool {
    start_a < end_b && end_a > start_b
}

/// Parses `HH:MM` (or `HH:MM:SS`, seconds dropped) into minutes since midnight.
pub fn to_minutes(s: &str) -> Result<u32, AppError> {
    let s = s.trim();
    let time = NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| AppError::MalformedTime(s.to_string()))?;
    Ok(time.hour() * 60 + time.minute())
}

/// Formats minutes since midnight as `HH:MM`.
pub fn format_minutes(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// A half-open window of minutes within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    pub start: u32,
    pub end: u32,
}

impl TimeWindow {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Parses both bounds. Inverted windows are accepted here; callers that
    /// create records use [`TimeWindow::parse_strict`].
    pub fn parse(start: &str, end: &str) -> Result<Self, AppError> {
        Ok(Self::new(to_minutes(start)?, to_minutes(end)?))
    }

    /// Like [`TimeWindow::parse`] but rejects empty or inverted windows.
    pub fn parse_strict(start: &str, end: &str) -> Result<Self, AppError> {
        let window = Self::parse(start, end)?;
        if window.start >= window.end {
            return Err(AppError::BadRequest(format!(
                "start time {} must be before end time {}",
                start, end
            )));
        }
        Ok(window)
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        overlaps(self.start, self.end, other.start, other.end)
    }

    /// Length in minutes; zero for degenerate or inverted windows.
    pub fn duration_minutes(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn start_str(&self) -> String {
        format_minutes(self.start)
    }

    pub fn end_str(&self) -> String {
        format_minutes(self.end)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_str(), self.end_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_minutes() {
        assert_eq!(to_minutes("00:00").unwrap(), 0);
        assert_eq!(to_minutes("08:30").unwrap(), 510);
        assert_eq!(to_minutes("23:59").unwrap(), 1439);
        assert_eq!(to_minutes("10:15:59").unwrap(), 615);
    }

    #[test]
    fn test_to_minutes_rejects_garbage() {
        for bad in ["", "8h", "25:00", "10:60", "ten:30", "10-30"] {
            match to_minutes(bad) {
                Err(AppError::MalformedTime(_)) => {}
                other => panic!("expected MalformedTime for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let windows = [(480, 600), (540, 660), (600, 720), (0, 1439), (700, 701)];
        for a in windows {
            for b in windows {
                assert_eq!(
                    overlaps(a.0, a.1, b.0, b.1),
                    overlaps(b.0, b.1, a.0, a.1),
                    "{:?} vs {:?}",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_window_overlaps_itself() {
        let w = TimeWindow::new(480, 600);
        assert!(w.overlaps(&w));
    }

    #[test]
    fn test_adjacent_windows_do_not_overlap() {
        let morning = TimeWindow::parse("08:00", "10:00").unwrap();
        let late = TimeWindow::parse("10:00", "12:00").unwrap();
        assert!(!morning.overlaps(&late));
        assert!(!late.overlaps(&morning));
    }

    #[test]
    fn test_parse_strict() {
        assert!(TimeWindow::parse_strict("10:00", "12:00").is_ok());
        assert!(matches!(
            TimeWindow::parse_strict("12:00", "10:00"),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            TimeWindow::parse_strict("10:00", "10:00"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_format_round_trip() {
        let w = TimeWindow::parse("09:05", "11:40").unwrap();
        assert_eq!(w.to_string(), "09:05-11:40");
        assert_eq!(w.duration_minutes(), 155);
    }

    #[test]
    fn test_day_parse() {
        assert_eq!(Day::parse("Monday").unwrap(), Day::Monday);
        assert_eq!(Day::parse(" saturday ").unwrap(), Day::Saturday);
        assert!(Day::parse("lundi").is_err());
    }
}
