//! Where calendars and calendar objects live on a server

use std::fmt::{Display, Formatter};

use url::Url;

use crate::error::Result;

/// A calendar collection, identified by the home set it belongs to and its name
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CalendarLocation {
    home_set: Url,
    name: String,
}

impl CalendarLocation {
    pub fn new<S: ToString>(home_set: &Url, name: S) -> Self {
        let mut home_set = home_set.clone();
        if !home_set.path().ends_with('/') {
            let path = format!("{}/", home_set.path());
            home_set.set_path(&path);
        }
        Self { home_set, name: name.to_string() }
    }

    pub fn home_set(&self) -> &Url { &self.home_set }
    pub fn name(&self) -> &str { &self.name }

    /// The URL of the collection (always with a trailing slash)
    pub fn url(&self) -> Result<Url> {
        Ok(self.home_set.join(&format!("{}/", self.name))?)
    }

    /// The location of an object stored in this calendar
    pub fn object<S: ToString>(&self, name: S) -> ObjectLocation {
        ObjectLocation { calendar: self.clone(), name: name.to_string() }
    }
}

impl Display for CalendarLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}/", self.home_set, self.name)
    }
}

/// A single stored `.ics` object.
///
/// `name` is the path token of the object, i.e. its file name without the `.ics` extension.
/// Several copies of the same event (organizer calendar, attendee inbox, attendee calendar) have distinct locations.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    calendar: CalendarLocation,
    name: String,
}

impl ObjectLocation {
    pub fn calendar(&self) -> &CalendarLocation { &self.calendar }
    pub fn name(&self) -> &str { &self.name }

    pub fn url(&self) -> Result<Url> {
        Ok(self.calendar.url()?.join(&format!("{}.ics", self.name))?)
    }

    /// Same object name, in another calendar of the same home set
    pub fn moved_to<S: ToString>(&self, calendar_name: S) -> ObjectLocation {
        CalendarLocation::new(self.calendar.home_set(), calendar_name).object(&self.name)
    }
}

impl Display for ObjectLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}.ics", self.calendar, self.name)
    }
}

/// Extract the path token (last path segment, without `.ics`) from an object URL
pub fn object_name(url: &Url) -> Option<String> {
    let last = url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()?;
    Some(last.trim_end_matches(".ics").to_string())
}
