//! CalDAV `calendar-query` REPORT bodies, and their local evaluation

use chrono::{DateTime, Utc};
use ical::parser::ical::component::IcalCalendar;

use crate::ical::{format_date_time, Component};
use crate::item::ItemKind;
use crate::utils::escape_xml;


/// What a query restricts the objects of a calendar to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryFilter {
    /// Every object of the queried kind
    None,
    /// Objects whose `UID` is exactly this value
    Uid(String),
    /// Objects that overlap this time range
    TimeRange { start: DateTime<Utc>, end: DateTime<Utc> },
}

/// A `calendar-query` REPORT
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalendarQuery {
    kind: ItemKind,
    filter: QueryFilter,
    expand: bool,
}

impl CalendarQuery {
    pub fn new(kind: ItemKind) -> Self {
        Self { kind, filter: QueryFilter::None, expand: false }
    }

    pub fn events() -> Self { Self::new(ItemKind::Event) }
    pub fn todos() -> Self { Self::new(ItemKind::Todo) }

    pub fn by_uid<S: ToString>(mut self, uid: S) -> Self {
        self.filter = QueryFilter::Uid(uid.to_string());
        self
    }

    pub fn in_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.filter = QueryFilter::TimeRange { start, end };
        self
    }

    /// Ask the server to expand recurring objects into their instances.
    ///
    /// This only has an effect on time-range queries, since an expansion needs bounds.
    pub fn expanded(mut self) -> Self {
        self.expand = true;
        self
    }

    pub fn kind(&self) -> ItemKind { self.kind }
    pub fn filter(&self) -> &QueryFilter { &self.filter }
    pub fn is_expanded(&self) -> bool { self.expand }

    /// The XML body of the REPORT request
    pub fn to_xml(&self) -> String {
        let calendar_data = match (&self.filter, self.expand) {
            (QueryFilter::TimeRange { start, end }, true) => format!(
                r#"<C:calendar-data><C:expand start="{}" end="{}"/></C:calendar-data>"#,
                format_date_time(start), format_date_time(end)
            ),
            _ => String::from("<C:calendar-data/>"),
        };

        let filter = match &self.filter {
            QueryFilter::None => String::new(),
            QueryFilter::Uid(uid) => format!(
                r#"<C:prop-filter name="UID"><C:text-match collation="i;octet">{}</C:text-match></C:prop-filter>"#,
                escape_xml(uid)
            ),
            QueryFilter::TimeRange { start, end } => format!(
                r#"<C:time-range start="{}" end="{}"/>"#,
                format_date_time(start), format_date_time(end)
            ),
        };

        format!(r#"
    <C:calendar-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
        <D:prop>
            <D:getetag/>
            {}
        </D:prop>
        <C:filter>
            <C:comp-filter name="VCALENDAR">
                <C:comp-filter name="{}">{}</C:comp-filter>
            </C:comp-filter>
        </C:filter>
    </C:calendar-query>
"#, calendar_data, self.kind.as_str(), filter)
    }

    /// Whether a fetched `VCALENDAR` would be returned by this query
    pub fn matches(&self, calendar: &IcalCalendar) -> bool {
        let components: Vec<Component> = match self.kind {
            ItemKind::Event => calendar.events.iter().cloned().map(Component::Event).collect(),
            ItemKind::Todo => calendar.todos.iter().cloned().map(Component::Todo).collect(),
        };

        components.iter().any(|component| match &self.filter {
            QueryFilter::None => true,
            QueryFilter::Uid(uid) => component.uid() == Some(uid.as_str()),
            QueryFilter::TimeRange { start, end } => overlaps(component, start, end),
        })
    }
}

/// RFC4791 9.9: a component overlaps `[start, end)` according to its `DTSTART` and `DTEND` (or `DUE`)
fn overlaps(component: &Component, start: &DateTime<Utc>, end: &DateTime<Utc>) -> bool {
    let comp_start = component.date_time("DTSTART");
    let comp_end = component.date_time("DTEND").or_else(|| component.date_time("DUE"));

    match (comp_start, comp_end) {
        (Some(s), Some(e)) if e > s => s < *end && e > *start,
        (Some(instant), _) | (None, Some(instant)) => instant >= *start && instant < *end,
        (None, None) => false,
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;
    use crate::ical::parse;

    const MEETING: &str = "BEGIN:VCALENDAR\r
VERSION:2.0\r
PRODID:-//Test//EN\r
BEGIN:VEVENT\r
UID:meeting\r
DTSTART:20240502T100000Z\r
DTEND:20240502T110000Z\r
SUMMARY:Planning\r
END:VEVENT\r
END:VCALENDAR\r
";

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_xml_body() {
        let xml = CalendarQuery::todos().to_xml();
        assert!(xml.contains(r#"<C:comp-filter name="VTODO">"#));
        assert!(xml.contains("<C:calendar-data/>"));

        let xml = CalendarQuery::events().by_uid("a<b>&c").to_xml();
        assert!(xml.contains(r#"<C:comp-filter name="VEVENT">"#));
        assert!(xml.contains("a&lt;b&gt;&amp;c</C:text-match>"));

        let xml = CalendarQuery::events().in_range(at(9), at(12)).expanded().to_xml();
        assert!(xml.contains(r#"<C:time-range start="20240502T090000Z" end="20240502T120000Z"/>"#));
        assert!(xml.contains(r#"<C:expand start="20240502T090000Z" end="20240502T120000Z"/>"#));

        // The body must be well-formed
        let root: minidom::Element = xml.trim().parse().unwrap();
        assert_eq!(root.name(), "calendar-query");
    }

    #[test]
    fn test_local_matching() {
        let calendar = parse(MEETING).unwrap();
        assert!(CalendarQuery::events().matches(&calendar));
        assert!(!CalendarQuery::todos().matches(&calendar));
        assert!(CalendarQuery::events().by_uid("meeting").matches(&calendar));
        assert!(!CalendarQuery::events().by_uid("other").matches(&calendar));

        assert!(CalendarQuery::events().in_range(at(9), at(12)).matches(&calendar));
        assert!(CalendarQuery::events().in_range(at(10), at(11)).matches(&calendar));
        assert!(!CalendarQuery::events().in_range(at(11), at(12)).matches(&calendar));
        assert!(!CalendarQuery::events().in_range(at(8), at(10)).matches(&calendar));
    }
}
