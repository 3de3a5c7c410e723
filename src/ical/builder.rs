//! A module to build ICal files

use chrono::Utc;
use ics::components::Property;
use ics::properties::{Attendee, CalScale, Description, DtEnd, DtStart, Due, Organizer, RRule, Status, Summary, Trigger};
use ics::{escape_text, parameters, Alarm, ICalendar, ToDo};

use crate::error::Result;
use crate::event::{AlarmAction, Event};
use crate::ical::format_date_time;
use crate::item::ItemKind;

/// Build a `VEVENT` component out of a new [`Event`]
///
/// Every attendee is added with `PARTSTAT=NEEDS-ACTION` and `ROLE=REQ-PARTICIPANT`.
pub fn build_event(event: &Event) -> ics::Event<'static> {
    let mut vevent = ics::Event::new(event.uid().to_string(), format_date_time(&Utc::now()));
    for property in common_properties(event) {
        vevent.push(property);
    }
    vevent.push(DtEnd::new(format_date_time(event.end())));

    if let Some(alarm) = build_alarm(event) {
        vevent.add_alarm(alarm);
    }
    vevent
}

/// Build a `VTODO` component. Its end date is used as the due date.
pub fn build_todo(event: &Event) -> ToDo<'static> {
    let mut todo = ToDo::new(event.uid().to_string(), format_date_time(&Utc::now()));
    for property in common_properties(event) {
        todo.push(property);
    }
    todo.push(Due::new(format_date_time(event.end())));
    todo.push(Status::needs_action());

    if let Some(alarm) = build_alarm(event) {
        todo.add_alarm(alarm);
    }
    todo
}

/// Create a complete iCal file (a `VCALENDAR` containing one component) from an [`Event`]
pub fn build_from(event: &Event, prod_id: &str) -> Result<String> {
    event.validate()?;

    let mut calendar = ICalendar::new("2.0", prod_id.to_string());
    calendar.push(CalScale::new("GREGORIAN"));
    match event.kind() {
        ItemKind::Event => calendar.add_event(build_event(event)),
        ItemKind::Todo => calendar.add_todo(build_todo(event)),
    }

    Ok(calendar.to_string())
}

fn common_properties(event: &Event) -> Vec<Property<'static>> {
    let mut properties: Vec<Property<'static>> = vec![
        Summary::new(escape_text(event.summary().to_string())).into(),
        DtStart::new(format_date_time(event.start())).into(),
    ];

    if let Some(rule) = event.recurrence() {
        properties.push(RRule::new(rule.to_string()).into());
    }

    if let Some(organizer) = event.organizer() {
        properties.push(Organizer::new(format!("mailto:{}", organizer)).into());
    }
    for email in event.attendees() {
        let mut attendee = Attendee::new(format!("mailto:{}", email));
        attendee.append(parameters!(
            "PARTSTAT" => "NEEDS-ACTION";
            "ROLE" => "REQ-PARTICIPANT"
        ));
        properties.push(attendee.into());
    }
    properties
}

fn build_alarm(event: &Event) -> Option<Alarm<'static>> {
    let alarm = event.alarm()?;
    let trigger = Trigger::new(alarm.trigger());
    let description = Description::new(escape_text(event.summary().to_string()));
    let built = match alarm.action() {
        AlarmAction::Display => Alarm::display(trigger, description),
        AlarmAction::Email => Alarm::email(trigger, description, Summary::new(escape_text(event.summary().to_string()))),
    };
    Some(built)
}
