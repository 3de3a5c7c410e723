//! Recurrence rules (iCal `RRULE` values)
//!
//! This only builds rules. Occurrences are never expanded locally, this is left to the server.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// RFC5545 `FREQ` values
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Frequency {
    Yearly,
    Monthly,
    Weekly,
    Daily,
    Hourly,
    Minutely,
    Secondly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Yearly => "YEARLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Daily => "DAILY",
            Frequency::Hourly => "HOURLY",
            Frequency::Minutely => "MINUTELY",
            Frequency::Secondly => "SECONDLY",
        }
    }
}

impl FromStr for Frequency {
    type Err = Error;

    /// Parse one of the short tokens `Y`, `MO`, `W`, `D`, `H`, `MI`, `S` (case-insensitive)
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "Y" => Ok(Frequency::Yearly),
            "MO" => Ok(Frequency::Monthly),
            "W" => Ok(Frequency::Weekly),
            "D" => Ok(Frequency::Daily),
            "H" => Ok(Frequency::Hourly),
            "MI" => Ok(Frequency::Minutely),
            "S" => Ok(Frequency::Secondly),
            _ => Err(Error::InvalidFrequency(s.to_string())),
        }
    }
}

/// How a recurrence ends.
///
/// RFC5545 forbids having both `COUNT` and `UNTIL`, this enum makes it impossible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecurrenceEnd {
    Never,
    Count(u32),
    Until(DateTime<Utc>),
}

impl Default for RecurrenceEnd {
    fn default() -> Self {
        RecurrenceEnd::Never
    }
}

const WEEKDAYS: [&str; 7] = ["MO", "TU", "WE", "TH", "FR", "SA", "SU"];

/// A recurrence rule, attached to an [`Event`](crate::Event)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecurrenceRule {
    frequency: Frequency,
    interval: u32,
    end: RecurrenceEnd,
    /// Weekday indexes, 0 is Monday
    by_day: Vec<i32>,
    by_month_day: Vec<i32>,
    by_year_day: Vec<i32>,
    by_month: Vec<i32>,
    by_week_no: Vec<i32>,
    by_hour: Vec<i32>,
    by_set_pos: Vec<i32>,
}

impl RecurrenceRule {
    /// Start building a rule from a frequency token
    pub fn builder(frequency: &str) -> Result<RecurrenceRuleBuilder> {
        Ok(RecurrenceRuleBuilder::new(frequency.parse()?))
    }

    pub fn frequency(&self) -> Frequency { self.frequency }
    pub fn interval(&self) -> u32 { self.interval }
    pub fn end(&self) -> RecurrenceEnd { self.end }
    pub fn by_day(&self) -> &[i32] { &self.by_day }
    pub fn by_month_day(&self) -> &[i32] { &self.by_month_day }
    pub fn by_year_day(&self) -> &[i32] { &self.by_year_day }
    pub fn by_month(&self) -> &[i32] { &self.by_month }
    pub fn by_week_no(&self) -> &[i32] { &self.by_week_no }
    pub fn by_hour(&self) -> &[i32] { &self.by_hour }
    pub fn by_set_pos(&self) -> &[i32] { &self.by_set_pos }
}

impl Display for RecurrenceRule {
    /// Formats the value of an `RRULE` property, e.g. `FREQ=WEEKLY;INTERVAL=2;COUNT=4;BYDAY=MO,WE;WKST=MO`
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "FREQ={};INTERVAL={}", self.frequency.as_str(), self.interval)?;
        match self.end {
            RecurrenceEnd::Never => {},
            RecurrenceEnd::Count(n) => write!(f, ";COUNT={}", n)?,
            RecurrenceEnd::Until(until) => write!(f, ";UNTIL={}", until.format("%Y%m%dT%H%M%SZ"))?,
        }
        if !self.by_day.is_empty() {
            let days: Vec<&str> = self.by_day.iter()
                .map(|d| WEEKDAYS[*d as usize])
                .collect();
            write!(f, ";BYDAY={}", days.join(","))?;
        }
        write_list(f, "BYMONTHDAY", &self.by_month_day)?;
        write_list(f, "BYYEARDAY", &self.by_year_day)?;
        write_list(f, "BYWEEKNO", &self.by_week_no)?;
        write_list(f, "BYMONTH", &self.by_month)?;
        write_list(f, "BYHOUR", &self.by_hour)?;
        write_list(f, "BYSETPOS", &self.by_set_pos)?;
        write!(f, ";WKST=MO")
    }
}

fn write_list(f: &mut Formatter<'_>, name: &str, values: &[i32]) -> std::fmt::Result {
    if values.is_empty() {
        return Ok(());
    }
    let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    write!(f, ";{}={}", name, values.join(","))
}


/// Builds a [`RecurrenceRule`] out of user-supplied fields.
///
/// Every `by_*` list defaults to empty, meaning unconstrained.
/// In case both `count` and `until` are given, `until` wins.
#[derive(Clone, Debug)]
pub struct RecurrenceRuleBuilder {
    frequency: Frequency,
    interval: u32,
    count: Option<u32>,
    until: Option<DateTime<Utc>>,
    by_day: Vec<i32>,
    by_month_day: Vec<i32>,
    by_year_day: Vec<i32>,
    by_month: Vec<i32>,
    by_week_no: Vec<i32>,
    by_hour: Vec<i32>,
    by_set_pos: Vec<i32>,
}

impl RecurrenceRuleBuilder {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            count: None,
            until: None,
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_year_day: Vec::new(),
            by_month: Vec::new(),
            by_week_no: Vec::new(),
            by_hour: Vec::new(),
            by_set_pos: Vec::new(),
        }
    }

    pub fn interval(mut self, interval: u32) -> Self { self.interval = interval; self }
    pub fn count(mut self, count: u32) -> Self { self.count = Some(count); self }
    pub fn until(mut self, until: DateTime<Utc>) -> Self { self.until = Some(until); self }
    pub fn by_day(mut self, days: Vec<i32>) -> Self { self.by_day = days; self }
    pub fn by_month_day(mut self, days: Vec<i32>) -> Self { self.by_month_day = days; self }
    pub fn by_year_day(mut self, days: Vec<i32>) -> Self { self.by_year_day = days; self }
    pub fn by_month(mut self, months: Vec<i32>) -> Self { self.by_month = months; self }
    pub fn by_week_no(mut self, weeks: Vec<i32>) -> Self { self.by_week_no = weeks; self }
    pub fn by_hour(mut self, hours: Vec<i32>) -> Self { self.by_hour = hours; self }
    pub fn by_set_pos(mut self, positions: Vec<i32>) -> Self { self.by_set_pos = positions; self }

    pub fn build(self) -> Result<RecurrenceRule> {
        if self.interval == 0 {
            return Err(Error::Validation("interval must be a positive integer".into()));
        }
        let end = match (self.count, self.until) {
            (_, Some(until)) => {
                if self.count.is_some() {
                    log::debug!("Both COUNT and UNTIL were given, keeping UNTIL");
                }
                RecurrenceEnd::Until(until)
            },
            (Some(0), None) => return Err(Error::Validation("count must be a positive integer".into())),
            (Some(count), None) => RecurrenceEnd::Count(count),
            (None, None) => RecurrenceEnd::Never,
        };

        check_range("by day", &self.by_day, 0, 6, true)?;
        check_range("by month day", &self.by_month_day, -31, 31, false)?;
        check_range("by year day", &self.by_year_day, -366, 366, false)?;
        check_range("by month", &self.by_month, 1, 12, false)?;
        check_range("by week number", &self.by_week_no, -53, 53, false)?;
        check_range("by hour", &self.by_hour, 0, 23, true)?;
        check_range("by set position", &self.by_set_pos, -366, 366, false)?;

        Ok(RecurrenceRule {
            frequency: self.frequency,
            interval: self.interval,
            end,
            by_day: self.by_day,
            by_month_day: self.by_month_day,
            by_year_day: self.by_year_day,
            by_month: self.by_month,
            by_week_no: self.by_week_no,
            by_hour: self.by_hour,
            by_set_pos: self.by_set_pos,
        })
    }
}

fn check_range(what: &str, values: &[i32], min: i32, max: i32, zero_allowed: bool) -> Result<()> {
    for value in values {
        if *value < min || *value > max || (*value == 0 && !zero_allowed) {
            return Err(Error::Validation(format!("{} value {} is out of range", what, value)));
        }
    }
    Ok(())
}


#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;
    use crate::error::ErrorKind;

    #[test]
    fn test_frequency_tokens() {
        assert_eq!("Y".parse::<Frequency>().unwrap(), Frequency::Yearly);
        assert_eq!("mo".parse::<Frequency>().unwrap(), Frequency::Monthly);
        assert_eq!("w".parse::<Frequency>().unwrap(), Frequency::Weekly);
        assert_eq!("D".parse::<Frequency>().unwrap(), Frequency::Daily);
        assert_eq!("h".parse::<Frequency>().unwrap(), Frequency::Hourly);
        assert_eq!("Mi".parse::<Frequency>().unwrap(), Frequency::Minutely);
        assert_eq!("s".parse::<Frequency>().unwrap(), Frequency::Secondly);

        for invalid in &["", "M", "WEEKLY", "X", "MIN", "yearly"] {
            let err = invalid.parse::<Frequency>().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{:?} should be rejected", invalid);
        }
        assert!(RecurrenceRule::builder("fortnightly").is_err());
    }

    #[test]
    fn test_defaults() {
        let rule = RecurrenceRule::builder("D").unwrap().build().unwrap();
        assert_eq!(rule.interval(), 1);
        assert_eq!(rule.end(), RecurrenceEnd::Never);
        assert!(rule.by_day().is_empty());
        assert!(rule.by_set_pos().is_empty());
        assert_eq!(rule.to_string(), "FREQ=DAILY;INTERVAL=1;WKST=MO");
    }

    #[test]
    fn test_until_wins_over_count() {
        let until = Utc.with_ymd_and_hms(2024, 12, 31, 23, 0, 0).unwrap();
        let rule = RecurrenceRule::builder("W").unwrap()
            .count(10)
            .until(until)
            .build().unwrap();
        assert_eq!(rule.end(), RecurrenceEnd::Until(until));
        assert_eq!(rule.to_string(), "FREQ=WEEKLY;INTERVAL=1;UNTIL=20241231T230000Z;WKST=MO");
    }

    #[test]
    fn test_full_rule() {
        let rule = RecurrenceRule::builder("MO").unwrap()
            .interval(2)
            .count(6)
            .by_day(vec![0, 2])
            .by_month_day(vec![1, -1])
            .by_month(vec![3, 9])
            .by_hour(vec![9])
            .by_set_pos(vec![-1])
            .build().unwrap();
        assert_eq!(rule.end(), RecurrenceEnd::Count(6));
        assert_eq!(
            rule.to_string(),
            "FREQ=MONTHLY;INTERVAL=2;COUNT=6;BYDAY=MO,WE;BYMONTHDAY=1,-1;BYMONTH=3,9;BYHOUR=9;BYSETPOS=-1;WKST=MO"
        );
    }

    #[test]
    fn test_invalid_values() {
        let builder = || RecurrenceRule::builder("Y").unwrap();
        assert!(builder().interval(0).build().is_err());
        assert!(builder().count(0).build().is_err());
        assert!(builder().by_day(vec![7]).build().is_err());
        assert!(builder().by_month(vec![0]).build().is_err());
        assert!(builder().by_month(vec![13]).build().is_err());
        assert!(builder().by_month_day(vec![0]).build().is_err());
        assert!(builder().by_year_day(vec![367]).build().is_err());
        assert!(builder().by_week_no(vec![-54]).build().is_err());
        assert!(builder().by_hour(vec![24]).build().is_err());
        assert!(builder().by_hour(vec![0]).build().is_ok());
    }
}
