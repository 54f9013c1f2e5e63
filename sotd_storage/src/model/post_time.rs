use std::{fmt, str::FromStr};

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// An hour and minute of the day, written as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PostTime {
    pub hour: u32,
    pub minute: u32,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("'{0}' is not a valid time, use HH:MM (for example 09:30)")]
pub struct InvalidPostTime(pub String);

impl PostTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    /// Whether `now` falls within the minute this time describes.
    pub fn matches(&self, now: &DateTime<Utc>) -> bool {
        now.hour() == self.hour && now.minute() == self.minute
    }
}

impl FromStr for PostTime {
    type Err = InvalidPostTime;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidPostTime(s.to_string());

        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour = hour.trim().parse::<u32>().map_err(|_| invalid())?;
        let minute = minute.trim().parse::<u32>().map_err(|_| invalid())?;

        Self::new(hour, minute).ok_or_else(invalid)
    }
}

impl fmt::Display for PostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::*;

    use super::*;

    #[rstest]
    #[case("09:30", 9, 30)]
    #[case("9:5", 9, 5)]
    #[case(" 23:59 ", 23, 59)]
    #[case("00:00", 0, 0)]
    fn parses_valid_times(#[case] input: &str, #[case] hour: u32, #[case] minute: u32) {
        let parsed: PostTime = input.parse().unwrap();

        assert_eq!(PostTime { hour, minute }, parsed);
    }

    #[rstest]
    #[case("24:00")]
    #[case("12:60")]
    #[case("noon")]
    #[case("12")]
    #[case("-1:30")]
    #[case("")]
    fn rejects_invalid_times(#[case] input: &str) {
        assert_eq!(Err(InvalidPostTime(input.to_string())), input.parse::<PostTime>());
    }

    #[test]
    fn displays_zero_padded() {
        let time: PostTime = "7:5".parse().unwrap();

        assert_eq!("07:05", time.to_string());
    }

    #[test]
    fn matches_only_the_same_minute() {
        let time = PostTime::new(18, 45).unwrap();

        assert!(time.matches(&Utc.with_ymd_and_hms(2024, 3, 1, 18, 45, 59).unwrap()));
        assert!(!time.matches(&Utc.with_ymd_and_hms(2024, 3, 1, 18, 46, 0).unwrap()));
        assert!(!time.matches(&Utc.with_ymd_and_hms(2024, 3, 1, 6, 45, 0).unwrap()));
    }
}
