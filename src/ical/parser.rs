//! A module to parse ICal files

use ical::parser::ical::component::IcalCalendar;

use crate::error::{Error, Result};


/// Parse the content of an `.ics` object into a single `VCALENDAR` container
pub fn parse(content: &str) -> Result<IcalCalendar> {
    let mut reader = ical::IcalParser::new(content.as_bytes());
    let calendar = match reader.next() {
        None => return Err(Error::Ical("no VCALENDAR to parse".into())),
        Some(item) => match item {
            Err(err) => return Err(Error::Ical(format!("unable to parse iCal data: {}", err))),
            Ok(calendar) => calendar,
        }
    };

    // What to do with multiple items?
    if reader.next().map(|r| r.is_ok()) == Some(true) {
        return Err(Error::Ical("parsing multiple calendars is not supported".into()));
    }

    Ok(calendar)
}
