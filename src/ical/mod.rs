//! This module handles conversion between iCal files and internal representations
//!
//! New items are generated with the `ics` crate. Items fetched from a server are parsed with the `ical` crate,
//! and are written back with its generator once they have been modified.

mod parser;
pub use parser::parse;
mod builder;
pub use builder::{build_event, build_from, build_todo};
mod component;
pub use component::{components, find_component_by_uid, Component, ParticipationRecord, ParticipationStatus};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Format a date-time the way iCal files expect UTC values (`20210321T001600Z`)
pub fn format_date_time(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Parse an iCal date or date-time value.
///
/// Floating times (without a trailing `Z`) and dates are considered UTC.
pub fn parse_date_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%SZ") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(value, "%Y%m%d").ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
