//! Tests of the HTTP CalDAV client, against a mocked server

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use caldav_rsvp::calendar::SupportedComponents;
use caldav_rsvp::client::Client;
use caldav_rsvp::ical::find_component_by_uid;
use caldav_rsvp::traits::CalendarStore;
use caldav_rsvp::{CalendarQuery, Config, Credentials, ErrorKind};

static PRINCIPAL_RESPONSE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/dav.php/</d:href>
    <d:propstat>
      <d:prop>
        <d:current-user-principal><d:href>/dav.php/principals/bob/</d:href></d:current-user-principal>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

static HOMESET_RESPONSE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:" xmlns:cal="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>/dav.php/principals/bob/</d:href>
    <d:propstat>
      <d:prop>
        <cal:calendar-home-set><d:href>/dav.php/calendars/bob/</d:href></cal:calendar-home-set>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

static CALENDARS_RESPONSE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:" xmlns:cal="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>/dav.php/calendars/bob/</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype><d:collection/></d:resourcetype>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/dav.php/calendars/bob/work/</d:href>
    <d:propstat>
      <d:prop>
        <d:displayname>Work</d:displayname>
        <d:resourcetype><d:collection/><cal:calendar/></d:resourcetype>
        <cal:calendar-description>Meetings and deadlines</cal:calendar-description>
        <cal:supported-calendar-component-set>
          <cal:comp name="VEVENT"/>
          <cal:comp name="VTODO"/>
        </cal:supported-calendar-component-set>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/dav.php/calendars/bob/inbox/</d:href>
    <d:propstat>
      <d:prop>
        <d:displayname>inbox</d:displayname>
        <d:resourcetype><d:collection/><cal:schedule-inbox/></d:resourcetype>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/dav.php/calendars/bob/root/</d:href>
    <d:propstat>
      <d:prop>
        <d:displayname>root</d:displayname>
        <d:resourcetype><d:collection/><cal:calendar/></d:resourcetype>
        <cal:supported-calendar-component-set/>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

static REPORT_RESPONSE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:" xmlns:cal="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>/dav.php/calendars/bob/work/shared.ics</d:href>
    <d:propstat>
      <d:prop>
        <d:getetag>"etag-1"</d:getetag>
        <cal:calendar-data>BEGIN:VCALENDAR
VERSION:2.0
PRODID:-//Test//EN
BEGIN:VEVENT
UID:shared
DTSTAMP:20240401T080000Z
DTSTART:20240502T100000Z
DTEND:20240502T110000Z
SUMMARY:Planning
ORGANIZER:mailto:a@x.com
ATTENDEE;PARTSTAT=NEEDS-ACTION;ROLE=REQ-PARTICIPANT:mailto:b@x.com
END:VEVENT
END:VCALENDAR
</cal:calendar-data>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/dav.php/calendars/bob/work/broken.ics</d:href>
    <d:propstat>
      <d:prop>
        <d:getetag>"etag-2"</d:getetag>
        <cal:calendar-data>this is not iCal</cal:calendar-data>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

static EVENT: &str = "BEGIN:VCALENDAR\r
VERSION:2.0\r
PRODID:-//Test//EN\r
BEGIN:VEVENT\r
UID:lunch\r
DTSTAMP:20240401T080000Z\r
SUMMARY:Lunch\r
END:VEVENT\r
END:VCALENDAR\r
";

fn multistatus(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(207)
        .insert_header("Content-Type", "application/xml; charset=utf-8")
        .set_body_string(body)
}

/// A mocked server that knows the principal and the home set of bob
async fn mock_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .and(path("/dav.php/"))
        .respond_with(multistatus(PRINCIPAL_RESPONSE))
        .mount(&server)
        .await;
    Mock::given(method("PROPFIND"))
        .and(path("/dav.php/principals/bob/"))
        .respond_with(multistatus(HOMESET_RESPONSE))
        .mount(&server)
        .await;
    server
}

fn config(server: &MockServer) -> Config {
    Config::new(format!("{}/dav.php/", server.uri()).parse().unwrap())
}

async fn connect(server: &MockServer) -> Client {
    Client::connect(&config(server), Credentials::new("bob", "secret")).await.unwrap()
}

#[tokio::test]
async fn test_connect_and_find_home_set() {
    let _ = env_logger::builder().is_test(true).try_init();
    let server = mock_server().await;

    let client = connect(&server).await;
    let home_set = client.find_home_set().await.unwrap();
    assert_eq!(home_set.path(), "/dav.php/calendars/bob/");

    let inbox = client.inbox().await.unwrap();
    assert_eq!(inbox.url().unwrap().path(), "/dav.php/calendars/bob/inbox/");
}

#[tokio::test]
async fn test_wrong_credentials() {
    let _ = env_logger::builder().is_test(true).try_init();
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = Client::connect(&config(&server), Credentials::new("bob", "wrong")).await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Authentication);
}

#[tokio::test]
async fn test_list_calendars() {
    let _ = env_logger::builder().is_test(true).try_init();
    let server = mock_server().await;
    Mock::given(method("PROPFIND"))
        .and(path("/dav.php/calendars/bob/"))
        .and(header("Depth", "1"))
        .respond_with(multistatus(CALENDARS_RESPONSE))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let calendars = client.list_calendars().await.unwrap();
    // The home set, the inbox and the root calendar collection are filtered out
    assert_eq!(calendars.len(), 1);
    let work = &calendars[0];
    assert_eq!(work.name(), "work");
    assert_eq!(work.display_name(), "Work");
    assert_eq!(work.description(), Some("Meetings and deadlines"));
    assert_eq!(work.supported_components(), SupportedComponents::EVENT | SupportedComponents::TODO);

    let found = client.find_calendar("work").await.unwrap();
    assert_eq!(found.url().unwrap().path(), "/dav.php/calendars/bob/work/");
    let err = client.find_calendar("holidays").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_create_calendar() {
    let _ = env_logger::builder().is_test(true).try_init();
    let server = mock_server().await;
    Mock::given(method("MKCALENDAR"))
        .and(path("/dav.php/calendars/bob/personal/"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("MKCALENDAR"))
        .and(path("/dav.php/calendars/bob/work/"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let personal = client.create_calendar("personal", "My own stuff").await.unwrap();
    assert_eq!(personal.name(), "personal");

    let err = client.create_calendar("work", "Already there").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_query_skips_unparsable_objects() {
    let _ = env_logger::builder().is_test(true).try_init();
    let server = mock_server().await;
    Mock::given(method("REPORT"))
        .and(path("/dav.php/calendars/bob/work/"))
        .respond_with(multistatus(REPORT_RESPONSE))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let work = client.calendar("work").await.unwrap();
    let objects = client.query(&work, &CalendarQuery::events()).await.unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].name().as_deref(), Some("shared"));
    assert_eq!(objects[0].version_tag().map(|t| t.as_str()), Some("\"etag-1\""));

    let stored = client.get_by_uid(&work, "shared").await.unwrap();
    let component = find_component_by_uid(stored.calendar(), "shared").unwrap();
    assert_eq!(component.organizer().as_deref(), Some("a@x.com"));
}

#[tokio::test]
async fn test_put_get_delete() {
    let _ = env_logger::builder().is_test(true).try_init();
    let server = mock_server().await;
    Mock::given(method("PUT"))
        .and(path("/dav.php/calendars/bob/work/lunch.ics"))
        .and(header("Content-Type", "text/calendar; charset=utf-8"))
        .respond_with(ResponseTemplate::new(201).insert_header("ETag", "\"etag-3\""))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dav.php/calendars/bob/work/lunch.ics"))
        .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"etag-3\"").set_body_string(EVENT))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/dav.php/calendars/bob/work/lunch.ics"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/dav.php/calendars/bob/nowhere/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let work = client.calendar("work").await.unwrap();
    let location = work.object("lunch");

    let tag = client.put(&location, EVENT.to_string()).await.unwrap();
    assert_eq!(tag.unwrap().as_str(), "\"etag-3\"");

    let fetched = client.get_object(&location).await.unwrap();
    assert!(find_component_by_uid(fetched.calendar(), "lunch").is_ok());

    client.delete_object(&location).await.unwrap();

    // Deleting a calendar that does not exist is never a silent success
    let nowhere = client.calendar("nowhere").await.unwrap();
    let err = client.delete_calendar(&nowhere).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
