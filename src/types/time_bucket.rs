//! Defines the temporal granularity of pipeline outputs and the inclusive
//! time window used to select input time steps.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The time bucket concentration fields are averaged into before aggregation.
///
/// Buckets are labeled with the calendar date that *ends* them: a day by itself,
/// a week by its closing Sunday and a year by 31 December.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBucket {
    /// One row per zone and calendar day. Rows carry EU/WHO categories.
    #[serde(alias = "D")]
    Day,
    /// One row per zone and week (Monday to Sunday).
    #[serde(alias = "W")]
    Week,
    /// One row per zone and calendar year. Rows carry population bands.
    #[serde(alias = "Y")]
    Year,
}

impl TimeBucket {
    /// Short code used in output file names.
    pub fn code(&self) -> &'static str {
        match self {
            TimeBucket::Day => "D",
            TimeBucket::Week => "W",
            TimeBucket::Year => "Y",
        }
    }

    /// Returns the label of the bucket `instant` falls in.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use pm25_exposure::TimeBucket;
    ///
    /// // 2023-10-26 is a Thursday, its week closes on Sunday the 29th.
    /// let instant = NaiveDate::from_ymd_opt(2023, 10, 26).unwrap().and_hms_opt(13, 0, 0).unwrap();
    /// assert_eq!(TimeBucket::Week.label(instant), NaiveDate::from_ymd_opt(2023, 10, 29).unwrap());
    /// assert_eq!(TimeBucket::Year.label(instant), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    /// ```
    pub fn label(&self, instant: NaiveDateTime) -> NaiveDate {
        let date = instant.date();
        match self {
            TimeBucket::Day => date,
            TimeBucket::Week => {
                let to_sunday = (7 - date.weekday().num_days_from_sunday()) % 7;
                date.checked_add_days(Days::new(to_sunday as u64))
                    .unwrap_or(date)
            }
            TimeBucket::Year => NaiveDate::from_ymd_opt(date.year(), 12, 31).unwrap_or(date),
        }
    }

    /// Whether runs at this granularity compute population-banded aggregates.
    pub fn carries_population(&self) -> bool {
        matches!(self, TimeBucket::Year)
    }

    /// Whether runs at this granularity attach EU/WHO categories.
    pub fn is_classified(&self) -> bool {
        matches!(self, TimeBucket::Day)
    }

    pub(crate) fn adjective(&self) -> &'static str {
        match self {
            TimeBucket::Day => "Daily",
            TimeBucket::Week => "Weekly",
            TimeBucket::Year => "Yearly",
        }
    }

    pub(crate) fn noun(&self) -> &'static str {
        match self {
            TimeBucket::Day => "Day",
            TimeBucket::Week => "Week",
            TimeBucket::Year => "Year",
        }
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for TimeBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "d" | "1d" | "day" => Ok(TimeBucket::Day),
            "w" | "week" => Ok(TimeBucket::Week),
            "y" | "year" => Ok(TimeBucket::Year),
            other => Err(format!("unknown time bucket '{other}', expected D, W or Y")),
        }
    }
}

/// Inclusive date window selecting which input time steps enter a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlice {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeSlice {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: &NaiveDateTime) -> bool {
        let date = instant.date();
        self.start <= date && date <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_day_label_drops_time_of_day() {
        assert_eq!(
            TimeBucket::Day.label(at(2022, 3, 4, 23)),
            NaiveDate::from_ymd_opt(2022, 3, 4).unwrap()
        );
    }

    #[test]
    fn test_week_label_is_closing_sunday() {
        // Sunday stays on itself
        let sunday = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert_eq!(TimeBucket::Week.label(at(2023, 1, 1, 5)), sunday);
        // Monday moves to the following Sunday
        assert_eq!(
            TimeBucket::Week.label(at(2023, 1, 2, 0)),
            NaiveDate::from_ymd_opt(2023, 1, 8).unwrap()
        );
    }

    #[test]
    fn test_year_label() {
        assert_eq!(
            TimeBucket::Year.label(at(2020, 2, 29, 12)),
            NaiveDate::from_ymd_opt(2020, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_bucket_parsing_and_variants() {
        assert_eq!("Y".parse::<TimeBucket>().unwrap(), TimeBucket::Year);
        assert_eq!("1D".parse::<TimeBucket>().unwrap(), TimeBucket::Day);
        assert!("M".parse::<TimeBucket>().is_err());
        assert!(TimeBucket::Year.carries_population());
        assert!(!TimeBucket::Week.carries_population());
        assert!(TimeBucket::Day.is_classified());
        assert_eq!(TimeBucket::Week.to_string(), "W");
    }

    #[test]
    fn test_time_slice_is_inclusive() {
        let slice = TimeSlice::new(
            NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2018, 12, 31).unwrap(),
        );
        assert!(slice.contains(&at(2018, 12, 31, 23)));
        assert!(!slice.contains(&at(2019, 1, 1, 0)));
    }

    #[test]
    fn test_bucket_deserializes_from_code() {
        let bucket: TimeBucket = serde_json::from_str("\"Y\"").unwrap();
        assert_eq!(bucket, TimeBucket::Year);
        let bucket: TimeBucket = serde_json::from_str("\"week\"").unwrap();
        assert_eq!(bucket, TimeBucket::Week);
    }
}
