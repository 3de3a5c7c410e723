//! Calendar collections, as listed in a calendar home set

use std::convert::TryFrom;

use serde::{Deserialize, Serialize};
use url::Url;

use bitflags::bitflags;

use crate::error::Error;
use crate::location::CalendarLocation;

bitflags! {
    #[derive(Serialize, Deserialize)]
    pub struct SupportedComponents: u8 {
        /// An event, such as a calendar meeting
        const EVENT = 1;
        /// A to-do item, such as a reminder
        const TODO = 2;
    }
}

impl TryFrom<minidom::Element> for SupportedComponents {
    type Error = Error;

    /// Create an instance from an XML <supported-calendar-component-set> element
    fn try_from(element: minidom::Element) -> Result<Self, Self::Error> {
        if element.name() != "supported-calendar-component-set" {
            return Err(Error::MalformedResponse("Element must be a <supported-calendar-component-set>".into()));
        }

        let mut flags = Self::empty();
        for child in element.children() {
            match child.attr("name") {
                None => continue,
                Some("VEVENT") => flags.insert(Self::EVENT),
                Some("VTODO") => flags.insert(Self::TODO),
                Some(other) => {
                    log::warn!("Unimplemented supported component type: {:?}. Ignoring it", other);
                    continue
                },
            };
        }

        Ok(flags)
    }
}

impl std::fmt::Display for SupportedComponents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::EVENT) { names.push("VEVENT"); }
        if self.contains(Self::TODO) { names.push("VTODO"); }
        write!(f, "{}", names.join(","))
    }
}


/// A calendar found in a home set
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarInfo {
    /// The path token of the collection
    name: String,
    display_name: String,
    url: Url,
    description: Option<String>,
    supported_components: SupportedComponents,
}

impl CalendarInfo {
    pub fn new(name: String, display_name: String, url: Url, description: Option<String>, supported_components: SupportedComponents) -> Self {
        Self { name, display_name, url, description, supported_components }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn display_name(&self) -> &str { &self.display_name }
    pub fn url(&self) -> &Url { &self.url }
    pub fn description(&self) -> Option<&str> { self.description.as_deref() }
    pub fn supported_components(&self) -> SupportedComponents { self.supported_components }

    pub fn location(&self, home_set: &Url) -> CalendarLocation {
        CalendarLocation::new(home_set, &self.name)
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_supported_components() {
        let xml = r#"<c:supported-calendar-component-set xmlns:c="urn:ietf:params:xml:ns:caldav">
            <c:comp name="VEVENT"/>
            <c:comp name="VJOURNAL"/>
            <c:comp name="VTODO"/>
        </c:supported-calendar-component-set>"#;
        let element: minidom::Element = xml.parse().unwrap();
        let flags = SupportedComponents::try_from(element).unwrap();
        assert_eq!(flags, SupportedComponents::EVENT | SupportedComponents::TODO);
        assert_eq!(flags.to_string(), "VEVENT,VTODO");

        let wrong: minidom::Element = r#"<d:prop xmlns:d="DAV:"/>"#.parse().unwrap();
        assert!(SupportedComponents::try_from(wrong).is_err());
    }
}
