//! Five-field schedule expressions (`minute hour day-of-month month day-of-week`).
//!
//! Each field is either a wildcard `*` or a single non-negative integer.
//! Every restricted field has to match for a minute to fire, and all
//! evaluation happens in UTC.
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use std::{fmt, ops::RangeInclusive, str::FromStr};
use thiserror::Error;

// a literal schedule such as `0 0 29 2 1` may only match once every few years
const SEARCH_HORIZON_DAYS: u32 = 5 * 366;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidSchedule {
    #[error("schedule must have 5 fields (minute hour dayOfMonth month dayOfWeek), got {0}")]
    FieldCount(usize),
    #[error("{field} must be a non-negative integer or '*', got '{value}'")]
    InvalidField { field: &'static str, value: String },
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Any,
    At(u32),
}

impl Field {
    fn parse(field: &'static str, value: &str, min: u32, max: u32) -> Result<Self, InvalidSchedule> {
        if value == "*" {
            return Ok(Field::Any);
        }
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidSchedule::InvalidField {
                field,
                value: value.to_string(),
            });
        }
        let parsed: u32 = value.parse().map_err(|_| InvalidSchedule::InvalidField {
            field,
            value: value.to_string(),
        })?;
        if parsed < min || parsed > max {
            return Err(InvalidSchedule::OutOfRange {
                field,
                value: parsed,
                min,
                max,
            });
        }

        Ok(Field::At(parsed))
    }

    fn matches(&self, value: u32) -> bool {
        match self {
            Field::Any => true,
            Field::At(expected) => *expected == value,
        }
    }

    fn candidates(&self, min: u32, max: u32) -> RangeInclusive<u32> {
        match self {
            Field::Any => min..=max,
            Field::At(value) => *value..=*value,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Field::Any => write!(f, "*"),
            Field::At(value) => write!(f, "{}", value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

impl CronSchedule {
    /// Returns the first matching minute strictly after `after`.
    ///
    /// `None` when the expression can never match, e.g. `0 0 31 2 *`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let mut date = start.date_naive();

        for _ in 0..SEARCH_HORIZON_DAYS {
            if self.matches_date(date) {
                for hour in self.hour.candidates(0, 23) {
                    for minute in self.minute.candidates(0, 59) {
                        let candidate = Utc.from_utc_datetime(&date.and_hms_opt(hour, minute, 0)?);
                        if candidate >= start {
                            return Some(candidate);
                        }
                    }
                }
            }
            date = date.succ_opt()?;
        }

        None
    }

    fn matches_date(&self, date: NaiveDate) -> bool {
        // 0 and 7 both denote Sunday
        let weekday = date.weekday().num_days_from_sunday();
        let day_of_week = match self.day_of_week {
            Field::At(7) => Field::At(0),
            other => other,
        };

        self.month.matches(date.month())
            && self.day_of_month.matches(date.day())
            && day_of_week.matches(weekday)
    }
}

impl FromStr for CronSchedule {
    type Err = InvalidSchedule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(InvalidSchedule::FieldCount(fields.len()));
        }

        Ok(CronSchedule {
            minute: Field::parse("minute", fields[0], 0, 59)?,
            hour: Field::parse("hour", fields[1], 0, 23)?,
            day_of_month: Field::parse("dayOfMonth", fields[2], 1, 31)?,
            month: Field::parse("month", fields[3], 1, 12)?,
            day_of_week: Field::parse("dayOfWeek", fields[4], 0, 7)?,
        })
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.minute, self.hour, self.day_of_month, self.month, self.day_of_week
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_parse_valid_expressions() {
        let schedule: CronSchedule = "0 2 * * *".parse().unwrap();
        assert_eq!(schedule.minute, Field::At(0));
        assert_eq!(schedule.hour, Field::At(2));
        assert_eq!(schedule.day_of_month, Field::Any);
        assert_eq!(schedule.to_string(), "0 2 * * *");

        assert!("* * * * *".parse::<CronSchedule>().is_ok());
        assert!("59 23 31 12 7".parse::<CronSchedule>().is_ok());
    }

    #[test]
    fn test_reject_wrong_field_count() {
        assert_eq!(
            "0 2 * *".parse::<CronSchedule>(),
            Err(InvalidSchedule::FieldCount(4))
        );
        assert_eq!(
            "0 0 2 * * *".parse::<CronSchedule>(),
            Err(InvalidSchedule::FieldCount(6))
        );
        assert_eq!("".parse::<CronSchedule>(), Err(InvalidSchedule::FieldCount(0)));
    }

    #[test]
    fn test_reject_non_literal_fields() {
        for expression in ["*/5 * * * *", "1-5 * * * *", "-1 * * * *", "0 2 * * MON", "0,30 * * * *"] {
            assert!(
                matches!(
                    expression.parse::<CronSchedule>(),
                    Err(InvalidSchedule::InvalidField { .. })
                ),
                "{} should be rejected",
                expression
            );
        }
    }

    #[test]
    fn test_reject_out_of_range_fields() {
        assert_eq!(
            "60 * * * *".parse::<CronSchedule>(),
            Err(InvalidSchedule::OutOfRange {
                field: "minute",
                value: 60,
                min: 0,
                max: 59
            })
        );
        assert!("0 24 * * *".parse::<CronSchedule>().is_err());
        assert!("0 0 0 * *".parse::<CronSchedule>().is_err());
        assert!("0 0 * 13 *".parse::<CronSchedule>().is_err());
        assert!("0 0 * * 8".parse::<CronSchedule>().is_err());
    }

    #[test]
    fn test_next_after_daily() {
        let schedule: CronSchedule = "0 2 * * *".parse().unwrap();

        assert_eq!(
            schedule.next_after(at("2024-01-01T01:59:30Z")),
            Some(at("2024-01-01T02:00:00Z"))
        );
        // strictly after: firing instant itself is not returned
        assert_eq!(
            schedule.next_after(at("2024-01-01T02:00:00Z")),
            Some(at("2024-01-02T02:00:00Z"))
        );
        assert_eq!(
            schedule.next_after(at("2023-12-31T23:00:00Z")),
            Some(at("2024-01-01T02:00:00Z"))
        );
    }

    #[test]
    fn test_next_after_every_minute() {
        let schedule: CronSchedule = "* * * * *".parse().unwrap();

        assert_eq!(
            schedule.next_after(at("2024-01-01T10:15:42Z")),
            Some(at("2024-01-01T10:16:00Z"))
        );
    }

    #[test]
    fn test_next_after_day_of_week() {
        // 2024-01-01 is a Monday
        let monday: CronSchedule = "30 12 * * 1".parse().unwrap();
        assert_eq!(
            monday.next_after(at("2024-01-01T13:00:00Z")),
            Some(at("2024-01-08T12:30:00Z"))
        );

        let sunday: CronSchedule = "0 0 * * 7".parse().unwrap();
        let also_sunday: CronSchedule = "0 0 * * 0".parse().unwrap();
        let from = at("2024-01-01T00:00:00Z");
        assert_eq!(sunday.next_after(from), Some(at("2024-01-07T00:00:00Z")));
        assert_eq!(sunday.next_after(from), also_sunday.next_after(from));
    }

    #[test]
    fn test_next_after_leap_day() {
        let schedule: CronSchedule = "0 0 29 2 *".parse().unwrap();

        assert_eq!(
            schedule.next_after(at("2023-03-01T00:00:00Z")),
            Some(at("2024-02-29T00:00:00Z"))
        );
    }

    #[test]
    fn test_next_after_never_matches() {
        let schedule: CronSchedule = "0 0 31 2 *".parse().unwrap();

        assert_eq!(schedule.next_after(at("2024-01-01T00:00:00Z")), None);
    }
}
