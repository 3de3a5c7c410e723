//! This module provides a client to connect to a CalDAV server

use std::convert::TryFrom;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, ETAG};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use minidom::Element;
use url::Url;

use crate::calendar::{CalendarInfo, SupportedComponents};
use crate::config::Config;
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::item::{StoredObject, VersionTag};
use crate::location::{object_name, CalendarLocation, ObjectLocation};
use crate::query::CalendarQuery;
use crate::traits::{CalendarStore, Connector};
use crate::utils::{escape_xml, find_elem, find_elems};


static DAVCLIENT_BODY: &str = r#"
    <d:propfind xmlns:d="DAV:">
       <d:prop>
           <d:current-user-principal />
       </d:prop>
    </d:propfind>
"#;

static HOMESET_BODY: &str = r#"
    <d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav" >
      <d:self/>
      <d:prop>
        <c:calendar-home-set />
      </d:prop>
    </d:propfind>
"#;

static CAL_BODY: &str = r#"
    <d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav" >
       <d:prop>
         <d:displayname />
         <d:resourcetype />
         <c:calendar-description />
         <c:supported-calendar-component-set />
       </d:prop>
    </d:propfind>
"#;


/// A CalDAV session, authenticated with HTTP Basic authentication
pub struct Client {
    url: Url,
    credentials: Credentials,
    inbox: String,
    calendar_timezone: Option<String>,
    http: reqwest::Client,

    principal: Url,
    calendar_home_set: Mutex<Option<Url>>,
}

impl Client {
    /// Authenticate against the server, and discover the principal URL of the user
    pub async fn connect(config: &Config, credentials: Credentials) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        let mut client = Self {
            url: config.url.clone(),
            credentials,
            inbox: config.inbox.clone(),
            calendar_timezone: config.calendar_timezone.clone(),
            http,
            principal: config.url.clone(),
            calendar_home_set: Mutex::new(None),
        };

        let href = client.sub_request_and_process(&config.url, DAVCLIENT_BODY.into(), &["current-user-principal", "href"]).await?;
        client.principal = client.url.join(&href)?;
        log::debug!("Principal URL is {}", client.principal);
        log::info!("Logged in as {}", client.credentials.username());
        Ok(client)
    }

    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    fn request(&self, method: Method, url: &Url) -> RequestBuilder {
        self.http
            .request(method, url.as_str())
            .basic_auth(self.credentials.username(), Some(self.credentials.password()))
    }

    async fn sub_request(&self, method: &[u8], url: &Url, body: String, depth: u32) -> Result<String> {
        let res = self.request(dav_method(method)?, url)
            .header("Depth", depth)
            .header(CONTENT_TYPE, "application/xml")
            .body(body)
            .send()
            .await?;
        let res = self.check_status(url, res)?;
        let text = res.text().await?;
        Ok(text)
    }

    async fn sub_request_and_process(&self, url: &Url, body: String, items: &[&str]) -> Result<String> {
        let text = self.sub_request(b"PROPFIND", url, body, 0).await?;

        let root: Element = text.parse()?;
        let mut current_element: &Element = &root;
        for item in items {
            current_element = match find_elem(current_element, item) {
                Some(elem) => elem,
                None => return Err(Error::MalformedResponse(format!("no <{}> in the response from {}", item, url))),
            };
        }

        Ok(current_element.text())
    }

    /// Map failed HTTP statuses onto the error taxonomy of this crate
    fn check_status(&self, url: &Url, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        log::debug!("{} returned HTTP {}", url, status);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Authentication(self.username().to_string())),
            StatusCode::NOT_FOUND => Err(Error::object_not_found(url)),
            other => Err(Error::UnexpectedStatus { url: url.clone(), status: other.as_u16() }),
        }
    }

    fn mkcalendar_body(&self, name: &str, description: &str) -> String {
        let timezone = match &self.calendar_timezone {
            None => String::new(),
            Some(tz) => format!("<C:calendar-timezone>{}</C:calendar-timezone>", escape_xml(tz)),
        };
        format!(r#"<?xml version="1.0" encoding="utf-8" ?>
    <C:mkcalendar xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
      <D:set>
        <D:prop>
          <D:displayname>{}</D:displayname>
          <C:calendar-description>{}</C:calendar-description>
          {}
        </D:prop>
      </D:set>
    </C:mkcalendar>
"#, escape_xml(name), escape_xml(description), timezone)
    }
}

#[async_trait]
impl CalendarStore for Client {
    /// Return the Homeset URL, or fetch it from server if not known yet
    async fn find_home_set(&self) -> Result<Url> {
        let cached = lock(&self.calendar_home_set).clone();
        if let Some(h) = cached {
            return Ok(h);
        }

        let href = self.sub_request_and_process(&self.principal, HOMESET_BODY.into(), &["calendar-home-set", "href"]).await?;
        let chs_url = self.url.join(&href)?;
        log::debug!("Calendar home set URL is {:?}", chs_url.path());
        *lock(&self.calendar_home_set) = Some(chs_url.clone());

        Ok(chs_url)
    }

    fn inbox_name(&self) -> &str {
        &self.inbox
    }

    async fn list_calendars(&self) -> Result<Vec<CalendarInfo>> {
        let cal_home_set = self.find_home_set().await?;

        let text = self.sub_request(b"PROPFIND", &cal_home_set, CAL_BODY.into(), 1).await?;

        let root: Element = text.parse()?;
        let reps = find_elems(&root, "response");
        let mut calendars = Vec::new();
        for rep in reps {
            let display_name = find_elem(rep, "displayname").map(|e| e.text()).unwrap_or("<no name>".to_string());
            log::debug!("Considering calendar {}", display_name);

            // We filter out non-calendar items
            let resource_types = match find_elem(rep, "resourcetype") {
                None => continue,
                Some(rt) => rt,
            };
            if !resource_types.children().any(|rt| rt.name() == "calendar") {
                continue;
            }

            // We filter out the root calendar collection, that has an empty supported-calendar-component-set
            let el_supported_comps = match find_elem(rep, "supported-calendar-component-set") {
                None => continue,
                Some(comps) => comps,
            };
            if el_supported_comps.children().count() == 0 {
                continue;
            }

            let calendar_href = match find_elem(rep, "href") {
                None => {
                    log::warn!("Calendar {} has no URL! Ignoring it.", display_name);
                    continue;
                },
                Some(h) => h.text(),
            };
            let this_calendar_url = self.url.join(&calendar_href)?;
            let name = match object_name(&this_calendar_url) {
                None => {
                    log::warn!("Calendar {} has an invalid URL ({})! Ignoring it.", display_name, this_calendar_url);
                    continue;
                },
                Some(name) => name,
            };

            let supported_components = match SupportedComponents::try_from(el_supported_comps.clone()) {
                Err(err) => {
                    log::warn!("Calendar {} has invalid supported components ({})! Ignoring it.", display_name, err);
                    continue;
                },
                Ok(sc) => sc,
            };
            let description = find_elem(rep, "calendar-description")
                .map(|e| e.text())
                .filter(|d| !d.is_empty());

            log::info!("Found calendar {}", display_name);
            calendars.push(CalendarInfo::new(name, display_name, this_calendar_url, description, supported_components));
        }

        Ok(calendars)
    }

    async fn create_calendar(&self, name: &str, description: &str) -> Result<CalendarLocation> {
        let location = self.calendar(name).await?;
        let url = location.url()?;

        let response = self.request(dav_method(b"MKCALENDAR")?, &url)
            .header(CONTENT_TYPE, "application/xml")
            .body(self.mkcalendar_body(name, description))
            .send()
            .await?;
        let response = self.check_status(&url, response)?;
        if response.status() != StatusCode::CREATED {
            return Err(Error::UnexpectedStatus { url, status: response.status().as_u16() });
        }

        log::info!("Created calendar {}", location);
        Ok(location)
    }

    async fn query(&self, calendar: &CalendarLocation, query: &CalendarQuery) -> Result<Vec<StoredObject>> {
        let url = calendar.url()?;
        let text = self.sub_request(b"REPORT", &url, query.to_xml(), 1).await?;

        let root: Element = text.parse()?;
        let mut objects = Vec::new();
        for response in find_elems(&root, "response") {
            let href = match find_elem(response, "href") {
                None => {
                    log::warn!("Ignoring a response without href in {}", url);
                    continue;
                },
                Some(h) => h.text(),
            };
            let data = match find_elem(response, "calendar-data") {
                None => continue,
                Some(d) => d.text(),
            };
            let object_url = self.url.join(&href)?;
            let version_tag = find_elem(response, "getetag")
                .map(|e| e.text())
                .filter(|e| !e.is_empty())
                .map(VersionTag::from);

            match crate::ical::parse(&data) {
                Err(err) => {
                    log::warn!("Unable to parse {}: {}. Ignoring it.", object_url, err);
                    continue;
                },
                Ok(parsed) => objects.push(StoredObject::new(object_url, version_tag, parsed)),
            }
        }
        log::debug!("Query on {} returned {} objects", url, objects.len());

        Ok(objects)
    }

    async fn get_object(&self, location: &ObjectLocation) -> Result<StoredObject> {
        let url = location.url()?;
        let response = self.request(Method::GET, &url).send().await?;
        let response = self.check_status(&url, response)?;

        let version_tag = etag(&response)?;
        let text = response.text().await?;
        let parsed = crate::ical::parse(&text)?;
        Ok(StoredObject::new(url, version_tag, parsed))
    }

    async fn put(&self, location: &ObjectLocation, ical: String) -> Result<Option<VersionTag>> {
        let url = location.url()?;
        let response = self.request(Method::PUT, &url)
            .header(CONTENT_TYPE, "text/calendar; charset=utf-8")
            .body(ical)
            .send()
            .await?;
        let response = self.check_status(&url, response)?;

        log::info!("Stored {}", url);
        etag(&response)
    }

    async fn delete(&self, url: &Url) -> Result<()> {
        let response = self.request(Method::DELETE, url).send().await?;
        self.check_status(url, response)?;

        log::info!("Deleted {}", url);
        Ok(())
    }
}

#[async_trait]
impl Connector for Config {
    type Store = Client;

    async fn connect(&self, credentials: &Credentials) -> Result<Client> {
        Client::connect(self, credentials.clone()).await
    }
}


fn dav_method(name: &[u8]) -> Result<Method> {
    Method::from_bytes(name)
        .map_err(|err| Error::Invariant(format!("cannot create HTTP method: {}", err)))
}

fn etag(response: &Response) -> Result<Option<VersionTag>> {
    match response.headers().get(ETAG) {
        None => Ok(None),
        Some(etag) => {
            let vtag_str = etag.to_str()
                .map_err(|err| Error::MalformedResponse(format!("invalid ETag header: {}", err)))?;
            Ok(Some(VersionTag::from(String::from(vtag_str))))
        },
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
