//! CalDAV items (events and to-dos) as they are found on a server

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use ical::parser::ical::component::IcalCalendar;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::location::object_name;


/// The iCal component type of an item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// `VEVENT`
    Event,
    /// `VTODO`
    Todo,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Event => "VEVENT",
            ItemKind::Todo => "VTODO",
        }
    }
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = Error;

    /// Accepts `event`/`todo` as well as `VEVENT`/`VTODO`, case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "EVENT" | "VEVENT" => Ok(ItemKind::Event),
            "TODO" | "VTODO" => Ok(ItemKind::Todo),
            other => Err(Error::Validation(format!("unknown item type {:?}, expected event or todo", other))),
        }
    }
}


/// A VersionTag is basically a CalDAV `etag`. Whenever it changes, this means the data has changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTag {
    tag: String
}

impl From<String> for VersionTag {
    fn from(tag: String) -> VersionTag {
        Self { tag }
    }
}

impl VersionTag {
    /// Get the inner version tag (usually a WebDAV `etag`)
    pub fn as_str(&self) -> &str {
        &self.tag
    }

    /// Generate a random VersionTag
    pub fn random() -> Self {
        let random = uuid::Uuid::new_v4().to_hyphenated().to_string();
        Self { tag: random }
    }
}


/// A calendar object fetched from a store
#[derive(Clone, Debug)]
pub struct StoredObject {
    url: Url,
    version_tag: Option<VersionTag>,
    calendar: IcalCalendar,
}

impl StoredObject {
    pub fn new(url: Url, version_tag: Option<VersionTag>, calendar: IcalCalendar) -> Self {
        Self { url, version_tag, calendar }
    }

    pub fn url(&self) -> &Url { &self.url }
    pub fn version_tag(&self) -> Option<&VersionTag> { self.version_tag.as_ref() }
    /// The parsed `VCALENDAR` container
    pub fn calendar(&self) -> &IcalCalendar { &self.calendar }

    /// The path token of this object (its file name, without `.ics`)
    pub fn name(&self) -> Option<String> {
        object_name(&self.url)
    }
}
