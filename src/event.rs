//! Calendar events and to-dos, as they are created by this crate

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::item::ItemKind;
use crate::rrule::RecurrenceRule;

/// `ACTION` of a `VALARM`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlarmAction {
    Display,
    Email,
}

/// A reminder nested inside an event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alarm {
    action: AlarmAction,
    /// How long before the start the alarm goes off
    before_start: Duration,
}

impl Alarm {
    pub fn new(action: AlarmAction, before_start: Duration) -> Self {
        Self { action, before_start }
    }

    pub fn action(&self) -> AlarmAction { self.action }
    pub fn before_start(&self) -> Duration { self.before_start }

    /// The `TRIGGER` value, an RFC5545 duration relative to the start (e.g. `-PT15M`)
    pub fn trigger(&self) -> String {
        let minutes = self.before_start.num_minutes();
        let sign = if minutes >= 0 { "-" } else { "" };
        format!("{}PT{}M", sign, minutes.abs())
    }
}


/// A new calendar object, not stored anywhere yet.
///
/// For to-dos, `end` is the due date.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// Persistent, globally unique identifier for the calendar component
    uid: String,
    kind: ItemKind,
    summary: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    attendees: Vec<String>,
    organizer: Option<String>,
    alarm: Option<Alarm>,
    recurrence: Option<RecurrenceRule>,
}

impl Event {
    /// Create a brand new item. This picks a new (random) UID.
    pub fn new<S: ToString>(kind: ItemKind, summary: S, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let uid = Uuid::new_v4().to_hyphenated().to_string();
        Self::new_with_uid(uid, kind, summary, start, end)
    }

    pub fn new_with_uid<S: ToString, T: ToString>(uid: S, kind: ItemKind, summary: T, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            uid: uid.to_string(),
            kind,
            summary: summary.to_string(),
            start,
            end,
            attendees: Vec::new(),
            organizer: None,
            alarm: None,
            recurrence: None,
        }
    }

    /// Invite people. An organizer is mandatory as soon as there are attendees.
    pub fn with_attendees<S: ToString>(mut self, organizer: S, attendees: Vec<String>) -> Self {
        self.organizer = Some(organizer.to_string());
        self.attendees = attendees;
        self
    }

    pub fn with_alarm(mut self, alarm: Alarm) -> Self {
        self.alarm = Some(alarm);
        self
    }

    pub fn with_recurrence(mut self, rule: RecurrenceRule) -> Self {
        self.recurrence = Some(rule);
        self
    }

    pub fn uid(&self) -> &str                         { &self.uid }
    pub fn kind(&self) -> ItemKind                    { self.kind }
    pub fn summary(&self) -> &str                     { &self.summary }
    pub fn start(&self) -> &DateTime<Utc>             { &self.start }
    pub fn end(&self) -> &DateTime<Utc>               { &self.end }
    pub fn attendees(&self) -> &[String]              { &self.attendees }
    pub fn alarm(&self) -> Option<&Alarm>             { self.alarm.as_ref() }
    pub fn recurrence(&self) -> Option<&RecurrenceRule> { self.recurrence.as_ref() }

    /// The organizer, only relevant when there are attendees
    pub fn organizer(&self) -> Option<&str> {
        if self.attendees.is_empty() {
            None
        } else {
            self.organizer.as_deref()
        }
    }

    /// Check this item can be sent to a server
    pub fn validate(&self) -> Result<()> {
        if self.uid.trim().is_empty() {
            return Err(Error::Invariant("an item must have a UID".into()));
        }
        if self.kind == ItemKind::Event && self.end < self.start {
            return Err(Error::Validation(format!(
                "event ends ({}) before it starts ({})", self.end, self.start
            )));
        }
        if !self.attendees.is_empty() {
            match self.organizer.as_deref() {
                Some(organizer) if is_email(organizer) => {},
                Some(organizer) => return Err(Error::Validation(format!("invalid organizer email {:?}", organizer))),
                None => return Err(Error::Validation("an organizer is required when there are attendees".into())),
            }
        }
        for attendee in &self.attendees {
            if !is_email(attendee) {
                return Err(Error::Validation(format!("invalid attendee email {:?}", attendee)));
            }
        }
        Ok(())
    }
}

fn is_email(address: &str) -> bool {
    let mut parts = address.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => !local.is_empty() && !domain.is_empty(),
        _ => false,
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;
    use crate::error::ErrorKind;

    fn meeting() -> Event {
        let start = Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap();
        Event::new(ItemKind::Event, "Team meeting", start, start + Duration::hours(1))
    }

    #[test]
    fn test_new_event_has_uid() {
        let a = meeting();
        let b = meeting();
        assert!(!a.uid().is_empty());
        assert_ne!(a.uid(), b.uid());
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_end_before_start() {
        let start = Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap();
        let event = Event::new(ItemKind::Event, "Backwards", start, start - Duration::hours(1));
        assert_eq!(event.validate().unwrap_err().kind(), ErrorKind::Validation);

        // A to-do may be due before its start date, nothing forbids it
        let todo = Event::new(ItemKind::Todo, "Backwards", start, start - Duration::hours(1));
        assert!(todo.validate().is_ok());
    }

    #[test]
    fn test_organizer_required_with_attendees() {
        let event = meeting().with_attendees("", vec!["b@x.com".to_string()]);
        assert!(event.validate().is_err());

        let event = meeting().with_attendees("a@x.com", vec!["not-an-email".to_string()]);
        assert!(event.validate().is_err());

        let event = meeting().with_attendees("a@x.com", vec!["b@x.com".to_string()]);
        assert!(event.validate().is_ok());
        assert_eq!(event.organizer(), Some("a@x.com"));

        let event = meeting().with_attendees("a@x.com", Vec::new());
        assert_eq!(event.organizer(), None);
    }

    #[test]
    fn test_alarm_trigger() {
        assert_eq!(Alarm::new(AlarmAction::Display, Duration::minutes(15)).trigger(), "-PT15M");
        assert_eq!(Alarm::new(AlarmAction::Email, Duration::hours(2)).trigger(), "-PT120M");
        assert_eq!(Alarm::new(AlarmAction::Email, Duration::zero()).trigger(), "-PT0M");
    }
}
