//! Prompts used by the interactive menus
//!
//! Everything reads from a [`BufRead`] and writes prompts to a [`Write`], so that the menus can be driven by a script.

use std::convert::TryFrom;
use std::io::{BufRead, Write};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::error::{Error, Result};
use crate::event::{Alarm, AlarmAction, Event};
use crate::item::ItemKind;
use crate::rrule::{RecurrenceRule, RecurrenceRuleBuilder};
use crate::workflow::Reply;

pub const DATE_FORMAT: &str = "%Y.%m.%d";
pub const TIME_FORMAT: &str = "%H.%M.%S";
/// Alarms go off at most a year away from the start
const MAX_ALARM_MINUTES: i64 = 366 * 24 * 60;

/// A `YYYY.MM.DD` date
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
        .map_err(|_| Error::Validation(format!("invalid date {:?}, expected YYYY.MM.DD", text.trim())))
}

/// A `HH.MM.SS` time
pub fn parse_time(text: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(text.trim(), TIME_FORMAT)
        .map_err(|_| Error::Validation(format!("invalid time {:?}, expected HH.MM.SS", text.trim())))
}

/// A comma-separated list of integers. An empty line is an empty list
pub fn parse_ints(text: &str) -> Result<Vec<i32>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split(',')
        .map(|n| n.trim().parse::<i32>().map_err(|_| Error::Validation(format!("{:?} is not a number", n.trim()))))
        .collect()
}


/// Reads answers from `reader`, after having printed prompts to `writer`
pub struct Console<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn reader(&mut self) -> &mut R { &mut self.reader }
    pub fn writer(&mut self) -> &mut W { &mut self.writer }

    /// Print a full line
    pub fn say<S: AsRef<str>>(&mut self, message: S) -> Result<()> {
        writeln!(self.writer, "{}", message.as_ref())?;
        Ok(())
    }

    /// Print a prompt, and read the trimmed answer. The end of input is an error
    pub fn line(&mut self, prompt: &str) -> Result<String> {
        write!(self.writer, "{}", prompt)?;
        self.writer.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "no more input")));
        }
        Ok(line.trim().to_string())
    }

    pub fn int(&mut self, prompt: &str) -> Result<i64> {
        let answer = self.line(prompt)?;
        answer.parse().map_err(|_| Error::Validation(format!("{:?} is not a number", answer)))
    }

    pub fn ints(&mut self, prompt: &str) -> Result<Vec<i32>> {
        let answer = self.line(prompt)?;
        parse_ints(&answer)
    }

    /// Read a date then a time, until they are valid
    pub fn date_time(&mut self, what: &str) -> Result<DateTime<Utc>> {
        loop {
            let date = self.line(&format!("Enter {} date (YYYY.MM.DD): ", what))?;
            let time = self.line(&format!("Enter {} time (HH.MM.SS): ", what))?;
            match (parse_date(&date), parse_time(&time)) {
                (Ok(date), Ok(time)) => return Ok(Utc.from_utc_datetime(&NaiveDateTime::new(date, time))),
                _ => self.say(format!("invalid {} date/time format", what))?,
            }
        }
    }

    fn kind(&mut self) -> Result<ItemKind> {
        loop {
            let answer = self.line("Enter event type [event, todo]: ")?;
            if let Ok(kind) = answer.parse() {
                return Ok(kind);
            }
        }
    }

    /// Read attendee addresses until `0`, then the organizer when there is at least one attendee
    fn attendees(&mut self) -> Result<(Vec<String>, Option<String>)> {
        let mut attendees = Vec::new();
        loop {
            let attendee = self.line("Enter attendee email (or 0 to finish): ")?;
            if attendee == "0" || attendee.is_empty() {
                break;
            }
            attendees.push(attendee);
        }
        if attendees.is_empty() {
            return Ok((attendees, None));
        }
        let organizer = self.line("Enter organizer email: ")?;
        Ok((attendees, Some(organizer)))
    }

    fn alarm(&mut self) -> Result<Option<Alarm>> {
        let answer = self.line("Add alarm [y/n]: ")?;
        if !answer.eq_ignore_ascii_case("y") {
            return Ok(None);
        }
        let action = loop {
            match self.line("Enter action: [d - display, e - email]: ")?.as_str() {
                "d" => break AlarmAction::Display,
                "e" => break AlarmAction::Email,
                _ => continue,
            }
        };
        let minutes = self.int("Minutes before start: ")?;
        if !(-MAX_ALARM_MINUTES..=MAX_ALARM_MINUTES).contains(&minutes) {
            return Err(Error::Validation(format!("an alarm cannot go off {} minutes before the start", minutes)));
        }
        Ok(Some(Alarm::new(action, Duration::minutes(minutes))))
    }

    fn event_of_kind(&mut self, summary: String, kind: ItemKind) -> Result<Event> {
        let start = self.date_time("start")?;
        let end = match kind {
            ItemKind::Event => self.date_time("end")?,
            ItemKind::Todo => self.date_time("due")?,
        };
        let mut event = Event::new(kind, summary, start, end);

        let (attendees, organizer) = self.attendees()?;
        if let Some(organizer) = organizer {
            event = event.with_attendees(organizer, attendees);
        }
        if let Some(alarm) = self.alarm()? {
            event = event.with_alarm(alarm);
        }
        Ok(event)
    }

    /// Read a new event or to-do
    pub fn event(&mut self) -> Result<Event> {
        let summary = self.line("Enter event summary: ")?;
        let kind = self.kind()?;
        self.event_of_kind(summary, kind)
    }

    /// Read a new event, then its recurrence rule
    pub fn recurring_event(&mut self) -> Result<Event> {
        let summary = self.line("Enter event summary: ")?;
        let event = self.event_of_kind(summary, ItemKind::Event)?;
        let rule = self.recurrence()?;
        Ok(event.with_recurrence(rule))
    }

    fn frequency(&mut self) -> Result<RecurrenceRuleBuilder> {
        loop {
            let answer = self.line("Enter frequency [Y, MO, W, D, H, MI, S]: ")?;
            match RecurrenceRule::builder(&answer) {
                Ok(builder) => return Ok(builder),
                Err(err) => self.say(err.to_string())?,
            }
        }
    }

    pub fn recurrence(&mut self) -> Result<RecurrenceRule> {
        let mut builder = self.frequency()?;

        let interval = self.line("Enter interval (empty for 1): ")?;
        if !interval.is_empty() {
            let interval = interval.parse::<u32>()
                .map_err(|_| Error::Validation(format!("{:?} is not a valid interval", interval)))?;
            builder = builder.interval(interval);
        }

        match self.int("Count, until or skip? [1/2/0]: ")? {
            1 => {
                let count = self.int("Enter count: ")?;
                let count = u32::try_from(count)
                    .map_err(|_| Error::Validation(format!("{} is not a valid count", count)))?;
                builder = builder.count(count);
            },
            2 => builder = builder.until(self.date_time("until")?),
            _ => {},
        }

        builder = builder
            .by_day(self.ints("Enter by days (0 = monday .. 6 = sunday): ")?)
            .by_month_day(self.ints("Enter by month days: ")?)
            .by_year_day(self.ints("Enter by year days: ")?)
            .by_month(self.ints("Enter by months: ")?)
            .by_week_no(self.ints("Enter by week numbers: ")?)
            .by_set_pos(self.ints("Enter position by set: ")?)
            .by_hour(self.ints("Enter by hour numbers: ")?);

        builder.build()
    }

    /// Read the reply to an invitation
    pub fn reply(&mut self) -> Result<Reply> {
        let email = self.line("Enter your attendee email: ")?;
        loop {
            match self.line("Accept, decline or delegate? [a/d/g]: ")?.as_str() {
                "a" => {
                    let calendar = self.line("Enter calendar name to store the event in: ")?;
                    return Ok(Reply::accept(email, calendar));
                },
                "d" => return Ok(Reply::decline(email)),
                "g" => {
                    let to = self.line("Enter delegate email: ")?;
                    return Ok(Reply::delegate(email, to));
                },
                _ => continue,
            }
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;
    use chrono::Timelike;
    use crate::error::ErrorKind;
    use crate::rrule::{Frequency, RecurrenceEnd};
    use crate::workflow::Decision;

    fn console(script: &str) -> Console<Cursor<Vec<u8>>, Vec<u8>> {
        Console::new(Cursor::new(script.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_parsers() {
        assert_eq!(parse_date("2024.05.02").unwrap(), NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert!(parse_date("2024-05-02").is_err());
        assert_eq!(parse_time("10.30.00").unwrap().minute(), 30);
        assert!(parse_time("25.00.00").is_err());
        assert_eq!(parse_ints(" 1, 2,3 ").unwrap(), vec![1, 2, 3]);
        assert!(parse_ints("").unwrap().is_empty());
        assert!(parse_ints("1,x").is_err());
    }

    #[test]
    fn test_read_event() {
        let mut console = console("Planning\nevent\n2024.05.02\n10.00.00\n2024.05.02\n11.00.00\nb@x.com\nc@x.com\n0\na@x.com\ny\nd\n15\n");
        let event = console.event().unwrap();
        assert_eq!(event.summary(), "Planning");
        assert_eq!(event.kind(), ItemKind::Event);
        assert_eq!(event.start(), &Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap());
        assert_eq!(event.attendees(), &["b@x.com".to_string(), "c@x.com".to_string()]);
        assert_eq!(event.organizer(), Some("a@x.com"));
        assert_eq!(event.alarm().unwrap().trigger(), "-PT15M");
    }

    #[test]
    fn test_invalid_date_is_asked_again() {
        let mut console = console("Chore\ntodo\n2024/05/02\n10.00.00\n2024.05.02\n10.00.00\n2024.05.03\n09.00.00\n0\nn\n");
        let todo = console.event().unwrap();
        assert_eq!(todo.kind(), ItemKind::Todo);
        assert!(todo.attendees().is_empty());
        assert!(todo.alarm().is_none());
        let output = String::from_utf8(console.writer().clone()).unwrap();
        assert!(output.contains("invalid start date/time format"));
    }

    #[test]
    fn test_read_recurrence() {
        let mut console = console("X\nw\n2\n1\n4\n0,2\n\n\n\n\n\n\n");
        let rule = console.recurrence().unwrap();
        assert_eq!(rule.frequency(), Frequency::Weekly);
        assert_eq!(rule.interval(), 2);
        assert_eq!(rule.end(), RecurrenceEnd::Count(4));
        assert_eq!(rule.to_string(), "FREQ=WEEKLY;INTERVAL=2;COUNT=4;BYDAY=MO,WE;WKST=MO");
        let output = String::from_utf8(console.writer().clone()).unwrap();
        assert!(output.contains("invalid frequency"));
    }

    #[test]
    fn test_read_reply() {
        let mut accept = console("b@x.com\na\npersonal\n");
        let reply = accept.reply().unwrap();
        assert_eq!(reply.email, "b@x.com");
        assert_eq!(reply.decision, Decision::Accept { calendar: "personal".into() });

        let mut delegate = console("b@x.com\nq\ng\nd@x.com\n");
        assert_eq!(delegate.reply().unwrap().decision, Decision::Delegate { to: "d@x.com".into() });
    }

    #[test]
    fn test_alarm_offset_out_of_range() {
        let mut huge = console("Planning\nevent\n2024.05.02\n10.00.00\n2024.05.02\n11.00.00\n0\ny\nd\n9223372036854775807\n");
        assert_eq!(huge.event().unwrap_err().kind(), ErrorKind::Validation);

        let mut lowest = console("Planning\nevent\n2024.05.02\n10.00.00\n2024.05.02\n11.00.00\n0\ny\ne\n-9223372036854775808\n");
        assert_eq!(lowest.event().unwrap_err().kind(), ErrorKind::Validation);

        let mut week = console("Planning\nevent\n2024.05.02\n10.00.00\n2024.05.02\n11.00.00\n0\ny\ne\n10080\n");
        assert_eq!(week.event().unwrap().alarm().unwrap().trigger(), "-PT10080M");
    }

    #[test]
    fn test_end_of_input() {
        let mut console = console("Planning\n");
        assert!(console.event().unwrap_err().is_end_of_input());
    }
}
