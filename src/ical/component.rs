//! Calendar components fetched from a server, and the few mutations the invitation workflow needs

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use ical::generator::Emitter;
use ical::parser::ical::component::{IcalCalendar, IcalEvent, IcalTodo};
use ical::property::Property;

use crate::error::{Error, Result};
use crate::ical::{format_date_time, parse_date_time};
use crate::item::ItemKind;


/// The `PARTSTAT` of an attendee
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParticipationStatus {
    NeedsAction,
    Accepted,
    Declined,
    /// Delegated to the contained email address
    Delegated(String),
    /// Any other value allowed by RFC5545 (`TENTATIVE`, `COMPLETED`...)
    Other(String),
}

impl ParticipationStatus {
    pub fn as_partstat(&self) -> &str {
        match self {
            ParticipationStatus::NeedsAction => "NEEDS-ACTION",
            ParticipationStatus::Accepted => "ACCEPTED",
            ParticipationStatus::Declined => "DECLINED",
            ParticipationStatus::Delegated(_) => "DELEGATED",
            ParticipationStatus::Other(other) => other,
        }
    }

    pub fn delegate_to(&self) -> Option<&str> {
        match self {
            ParticipationStatus::Delegated(to) => Some(to),
            _ => None,
        }
    }

    fn from_property(property: &Property) -> Self {
        match param(property, "PARTSTAT").map(|p| p.to_uppercase()).as_deref() {
            None | Some("NEEDS-ACTION") => ParticipationStatus::NeedsAction,
            Some("ACCEPTED") => ParticipationStatus::Accepted,
            Some("DECLINED") => ParticipationStatus::Declined,
            Some("DELEGATED") => {
                let to = param(property, "DELEGATED-TO").map(normalize_address).unwrap_or_default();
                ParticipationStatus::Delegated(to)
            },
            Some(other) => ParticipationStatus::Other(other.to_string()),
        }
    }
}

impl Display for ParticipationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParticipationStatus::Delegated(to) => write!(f, "DELEGATED to {}", to),
            other => write!(f, "{}", other.as_partstat()),
        }
    }
}


/// The participation of one attendee to one event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParticipationRecord {
    email: String,
    status: ParticipationStatus,
}

impl ParticipationRecord {
    pub fn new<S: AsRef<str>>(email: S, status: ParticipationStatus) -> Self {
        Self { email: normalize_address(email.as_ref()), status }
    }

    pub fn email(&self) -> &str { &self.email }
    pub fn status(&self) -> &ParticipationStatus { &self.status }
    pub fn delegate_to(&self) -> Option<&str> { self.status.delegate_to() }
}


/// A `VEVENT` or `VTODO`, as parsed from a fetched `VCALENDAR`
#[derive(Clone, Debug)]
pub enum Component {
    Event(IcalEvent),
    Todo(IcalTodo),
}

impl Component {
    pub fn kind(&self) -> ItemKind {
        match self {
            Component::Event(_) => ItemKind::Event,
            Component::Todo(_) => ItemKind::Todo,
        }
    }

    pub fn properties(&self) -> &[Property] {
        match self {
            Component::Event(e) => &e.properties,
            Component::Todo(t) => &t.properties,
        }
    }

    fn properties_mut(&mut self) -> &mut Vec<Property> {
        match self {
            Component::Event(e) => &mut e.properties,
            Component::Todo(t) => &mut t.properties,
        }
    }

    /// The value of the first property with this name
    pub fn text(&self, name: &str) -> Option<&str> {
        self.properties().iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .and_then(|p| p.value.as_deref())
    }

    pub fn uid(&self) -> Option<&str> { self.text("UID") }
    /// The summary, with its TEXT escapes resolved
    pub fn summary(&self) -> Option<String> { self.text("SUMMARY").map(unescape_text) }

    pub fn date_time(&self, name: &str) -> Option<DateTime<Utc>> {
        self.text(name).and_then(parse_date_time)
    }

    pub fn organizer(&self) -> Option<String> {
        self.text("ORGANIZER").map(normalize_address)
    }

    /// Every attendee, in the order they appear in the component
    pub fn attendees(&self) -> Vec<ParticipationRecord> {
        self.properties().iter()
            .filter(|p| p.name.eq_ignore_ascii_case("ATTENDEE"))
            .filter_map(|p| {
                let email = normalize_address(p.value.as_deref()?);
                Some(ParticipationRecord { email, status: ParticipationStatus::from_property(p) })
            })
            .collect()
    }

    /// The attendee matching this email address
    pub fn attendee(&self, email: &str) -> Option<ParticipationRecord> {
        let email = normalize_address(email);
        self.attendees().into_iter().find(|record| record.email == email)
    }

    fn attendee_property_mut(&mut self, email: &str) -> Option<&mut Property> {
        let email = normalize_address(email);
        self.properties_mut().iter_mut()
            .filter(|p| p.name.eq_ignore_ascii_case("ATTENDEE"))
            .find(|p| p.value.as_deref().map(normalize_address).as_ref() == Some(&email))
    }

    /// Overwrite the `PARTSTAT` of the attendee whose address matches `email`.
    ///
    /// There is no fallback on another attendee: in case nobody matches, a `NotFound` error is returned
    pub fn set_participation_status(&mut self, email: &str, status: &ParticipationStatus) -> Result<()> {
        let property = match self.attendee_property_mut(email) {
            None => return Err(Error::attendee_not_found(email)),
            Some(p) => p,
        };
        set_param(property, "PARTSTAT", status.as_partstat().to_string());
        match status.delegate_to() {
            Some(to) => set_param(property, "DELEGATED-TO", quoted_address(to)),
            None => remove_param(property, "DELEGATED-TO"),
        }
        Ok(())
    }

    /// Append a new `ATTENDEE` property
    pub fn add_attendee(&mut self, email: &str, status: &ParticipationStatus, delegated_from: Option<&str>) {
        let mut params = vec![
            (String::from("PARTSTAT"), vec![status.as_partstat().to_string()]),
            (String::from("ROLE"), vec![String::from("REQ-PARTICIPANT")]),
        ];
        if let Some(from) = delegated_from {
            params.push((String::from("DELEGATED-FROM"), vec![quoted_address(from)]));
        }
        if let Some(to) = status.delegate_to() {
            params.push((String::from("DELEGATED-TO"), vec![quoted_address(to)]));
        }
        self.properties_mut().push(Property {
            name: String::from("ATTENDEE"),
            params: Some(params),
            value: Some(format!("mailto:{}", normalize_address(email))),
        });
    }

    /// Replace (or add) a date-time property
    pub fn set_date_time(&mut self, name: &str, dt: &DateTime<Utc>) {
        let value = Some(format_date_time(dt));
        let properties = self.properties_mut();
        match properties.iter_mut().find(|p| p.name.eq_ignore_ascii_case(name)) {
            Some(property) => {
                property.params = None;
                property.value = value;
            },
            None => properties.push(Property { name: name.to_uppercase(), params: None, value }),
        }
    }

    pub fn set_last_modified(&mut self, dt: &DateTime<Utc>) {
        self.set_date_time("LAST-MODIFIED", dt);
    }

    /// Wrap this component into a new `VCALENDAR` container
    pub fn to_calendar(&self, prod_id: &str) -> IcalCalendar {
        let mut calendar = IcalCalendar::new();
        calendar.properties.push(text_property("VERSION", "2.0"));
        calendar.properties.push(text_property("PRODID", prod_id));
        calendar.properties.push(text_property("CALSCALE", "GREGORIAN"));
        match self {
            Component::Event(e) => {
                let mut event = e.clone();
                quote_params(&mut event.properties);
                calendar.events.push(event);
            },
            Component::Todo(t) => {
                let mut todo = t.clone();
                quote_params(&mut todo.properties);
                calendar.todos.push(todo);
            },
        }
        calendar
    }

    /// Serialize this component, wrapped into a `VCALENDAR`
    pub fn to_ical(&self, prod_id: &str) -> String {
        self.to_calendar(prod_id).generate()
    }
}

/// Every event then every to-do of a fetched container
pub fn components(container: &IcalCalendar) -> impl Iterator<Item = Component> + '_ {
    let events = container.events.iter().map(|e| Component::Event(e.clone()));
    let todos = container.todos.iter().map(|t| Component::Todo(t.clone()));
    events.chain(todos)
}

/// Scan the components of a fetched container for the one with this UID
pub fn find_component_by_uid(container: &IcalCalendar, uid: &str) -> Result<Component> {
    for component in components(container) {
        match component.uid() {
            None => {
                log::warn!("Ignoring a {} without UID", component.kind());
                continue;
            },
            Some(found) if found == uid => return Ok(component),
            Some(_) => continue,
        }
    }
    Err(Error::uid_not_found(uid))
}

fn text_property(name: &str, value: &str) -> Property {
    Property { name: name.to_string(), params: None, value: Some(value.to_string()) }
}

/// Resolve the backslash escapes of a TEXT value
fn unescape_text(value: &str) -> String {
    let mut text = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            text.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => text.push('\n'),
            Some(other) => text.push(other),
            None => text.push('\\'),
        }
    }
    text
}

/// `mailto:Bob@X.com` and `bob@x.com` are the same calendar user
fn normalize_address(address: &str) -> String {
    let address = address.trim().trim_matches('"');
    let address = match address.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("mailto:") => &address[7..],
        _ => address,
    };
    address.to_lowercase()
}

/// A calendar user address as a parameter value. It contains a colon, so it must be quoted
fn quoted_address(address: &str) -> String {
    format!("\"mailto:{}\"", normalize_address(address))
}

/// Quote the parameter values the generator would otherwise backslash-escape
fn quote_params(properties: &mut [Property]) {
    for property in properties.iter_mut() {
        let params = match property.params.as_mut() {
            None => continue,
            Some(params) => params,
        };
        for (_, values) in params.iter_mut() {
            for value in values.iter_mut() {
                if !value.starts_with('"') && [':', ';', ','].iter().any(|c| value.contains(*c)) {
                    *value = format!("\"{}\"", value);
                }
            }
        }
    }
}

fn param<'p>(property: &'p Property, name: &str) -> Option<&'p str> {
    property.params.as_ref()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(|value| value.trim_matches('"'))
}

fn set_param(property: &mut Property, name: &str, value: String) {
    let params = property.params.get_or_insert_with(Vec::new);
    match params.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
        Some((_, values)) => *values = vec![value],
        None => params.push((name.to_string(), vec![value])),
    }
}

fn remove_param(property: &mut Property, name: &str) {
    if let Some(params) = property.params.as_mut() {
        params.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }
}
