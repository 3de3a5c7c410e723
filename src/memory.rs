//! This module provides an in-memory calendar server
//!
//! It behaves like a CalDAV server with scheduling support: organizers' writes are delivered to the inboxes of their
//! attendees, and attendees' replies are delivered to the inbox of the organizer.
//! Failures can be injected with a [`MockBehaviour`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use ical::parser::ical::component::IcalCalendar;
use url::Url;

use crate::calendar::{CalendarInfo, SupportedComponents};
use crate::config::Config;
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::ical::{components, Component, ParticipationStatus};
use crate::item::{StoredObject, VersionTag};
use crate::location::{object_name, CalendarLocation, ObjectLocation};
use crate::mock_behaviour::MockBehaviour;
use crate::query::CalendarQuery;
use crate::traits::{CalendarStore, Connector};
use crate::utils::extract_name_from_email;

static BASE_URL: &str = "http://memory.localhost/dav.php/";


#[derive(Debug)]
struct Account {
    password: String,
    email: String,
    home_set: Url,
}

#[derive(Debug)]
struct Collection {
    display_name: String,
    description: Option<String>,
    supported_components: SupportedComponents,
    /// The scheduling inbox is a collection, but not a calendar
    is_calendar: bool,
}

#[derive(Debug)]
struct StoredText {
    version_tag: VersionTag,
    ical: String,
}

#[derive(Default, Debug)]
struct ServerState {
    accounts: HashMap<String, Account>,
    collections: BTreeMap<Url, Collection>,
    objects: BTreeMap<Url, StoredText>,
    behaviour: MockBehaviour,
}

impl ServerState {
    /// Store a copy of an object into the inbox of the user that has this email address
    fn deliver(&mut self, inbox: &str, email: &str, name: &str, ical: &str) {
        // Addresses without a registered account fall back on the account named after their local part
        let account = self.accounts.values()
            .find(|account| account.email.eq_ignore_ascii_case(email))
            .or_else(|| extract_name_from_email(email).and_then(|name| self.accounts.get(name)));
        let home_set = match account {
            None => {
                log::debug!("No local account for {}, not delivering {}", email, name);
                return;
            },
            Some(account) => account.home_set.clone(),
        };

        let url = match CalendarLocation::new(&home_set, inbox).object(name).url() {
            Err(err) => {
                log::warn!("Unable to deliver {} to {}: {}", name, email, err);
                return;
            },
            Ok(url) => url,
        };
        log::info!("Delivering {} to the inbox of {}", name, email);
        self.objects.insert(url, StoredText { version_tag: VersionTag::random(), ical: ical.to_string() });
    }
}


/// A calendar server that lives in memory. Clones share the same data
#[derive(Clone, Debug)]
pub struct MemoryServer {
    base: Url,
    inbox: String,
    state: Arc<Mutex<ServerState>>,
}

impl Default for MemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryServer {
    pub fn new() -> Self {
        let base = Url::parse(BASE_URL).expect("invalid memory server URL");
        Self {
            base,
            inbox: String::from("inbox"),
            state: Arc::new(Mutex::new(ServerState::default())),
        }
    }

    pub fn base_url(&self) -> &Url { &self.base }

    /// A configuration that points to this server
    pub fn config(&self) -> Config {
        let mut config = Config::new(self.base.clone());
        config.inbox = self.inbox.clone();
        config
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a user. Its home set and its scheduling inbox are created as well
    pub fn add_account(&self, username: &str, password: &str, email: &str) -> Result<()> {
        let home_set = self.base.join(&format!("calendars/{}/", username))?;
        let inbox = CalendarLocation::new(&home_set, &self.inbox).url()?;

        let mut state = self.lock();
        state.collections.insert(inbox, Collection {
            display_name: self.inbox.clone(),
            description: None,
            supported_components: SupportedComponents::EVENT | SupportedComponents::TODO,
            is_calendar: false,
        });
        state.accounts.insert(username.to_string(), Account {
            password: password.to_string(),
            email: email.to_lowercase(),
            home_set,
        });
        Ok(())
    }

    pub fn set_mock_behaviour(&self, behaviour: MockBehaviour) {
        self.lock().behaviour = behaviour;
    }

    /// Open a session. Wrong credentials are an `Authentication` error
    pub fn login(&self, username: &str, password: &str) -> Result<MemorySession> {
        let mut state = self.lock();
        state.behaviour.can_connect()?;
        match state.accounts.get(username) {
            Some(account) if account.password == password => {
                log::info!("Logged in as {}", username);
                Ok(MemorySession {
                    server: self.clone(),
                    username: username.to_string(),
                    email: account.email.clone(),
                    home_set: account.home_set.clone(),
                })
            },
            _ => Err(Error::Authentication(username.to_string())),
        }
    }
}

#[async_trait]
impl Connector for MemoryServer {
    type Store = MemorySession;

    async fn connect(&self, credentials: &Credentials) -> Result<MemorySession> {
        self.login(credentials.username(), credentials.password())
    }
}


/// A session on a [`MemoryServer`]
#[derive(Clone, Debug)]
pub struct MemorySession {
    server: MemoryServer,
    username: String,
    email: String,
    home_set: Url,
}

impl MemorySession {
    pub fn username(&self) -> &str { &self.username }
    pub fn email(&self) -> &str { &self.email }

    /// Users can only access their own home set
    fn check_access(&self, url: &Url) -> Result<()> {
        if url.as_str().starts_with(self.home_set.as_str()) {
            Ok(())
        } else {
            log::warn!("{} is not allowed to access {}", self.username, url);
            Err(Error::Authentication(self.username.clone()))
        }
    }

    /// Emulate the server-side scheduling of a write
    fn schedule(&self, state: &mut ServerState, location: &ObjectLocation, calendar: &IcalCalendar, ical: &str, previous: Option<&IcalCalendar>) {
        let component = match first_component(calendar) {
            None => return,
            Some(c) => c,
        };
        let organizer = match component.organizer() {
            None => return,
            Some(o) => o,
        };

        if organizer == self.email {
            // Only new attendees receive the invitation
            let already_invited: Vec<String> = previous
                .and_then(first_component)
                .map(|c| c.attendees().iter().map(|a| a.email().to_string()).collect())
                .unwrap_or_default();
            for attendee in component.attendees() {
                if attendee.email() == self.email || already_invited.iter().any(|a| a == attendee.email()) {
                    continue;
                }
                state.deliver(&self.server.inbox, attendee.email(), location.name(), ical);
            }
        } else if let Some(me) = component.attendee(&self.email) {
            if me.status() != &ParticipationStatus::NeedsAction {
                let reply_name = format!("{}-reply-{}", location.name(), self.username);
                state.deliver(&self.server.inbox, &organizer, &reply_name, ical);
            }
        }
    }
}

#[async_trait]
impl CalendarStore for MemorySession {
    async fn find_home_set(&self) -> Result<Url> {
        Ok(self.home_set.clone())
    }

    fn inbox_name(&self) -> &str {
        &self.server.inbox
    }

    async fn list_calendars(&self) -> Result<Vec<CalendarInfo>> {
        let mut state = self.server.lock();
        state.behaviour.can_list_calendars()?;

        let calendars = state.collections.iter()
            .filter(|(url, collection)| collection.is_calendar && url.as_str().starts_with(self.home_set.as_str()))
            .filter_map(|(url, collection)| {
                let name = object_name(url)?;
                Some(CalendarInfo::new(
                    name,
                    collection.display_name.clone(),
                    url.clone(),
                    collection.description.clone(),
                    collection.supported_components,
                ))
            })
            .collect();
        Ok(calendars)
    }

    async fn create_calendar(&self, name: &str, description: &str) -> Result<CalendarLocation> {
        let location = CalendarLocation::new(&self.home_set, name);
        let url = location.url()?;
        self.check_access(&url)?;

        let mut state = self.server.lock();
        state.behaviour.can_create_calendar()?;
        if state.collections.contains_key(&url) {
            return Err(Error::UnexpectedStatus { url, status: 405 });
        }
        state.collections.insert(url, Collection {
            display_name: name.to_string(),
            description: Some(description.to_string()).filter(|d| !d.is_empty()),
            supported_components: SupportedComponents::EVENT | SupportedComponents::TODO,
            is_calendar: true,
        });
        log::info!("Created calendar {}", location);
        Ok(location)
    }

    async fn query(&self, calendar: &CalendarLocation, query: &CalendarQuery) -> Result<Vec<StoredObject>> {
        let url = calendar.url()?;
        self.check_access(&url)?;

        let mut state = self.server.lock();
        state.behaviour.can_query()?;
        if !state.collections.contains_key(&url) {
            return Err(Error::calendar_not_found(calendar.name()));
        }

        let mut objects = Vec::new();
        for (object_url, stored) in state.objects.iter() {
            if collection_of(object_url).as_ref() != Some(&url) {
                continue;
            }
            let parsed = match crate::ical::parse(&stored.ical) {
                Err(err) => {
                    log::warn!("Unable to parse {}: {}. Ignoring it.", object_url, err);
                    continue;
                },
                Ok(parsed) => parsed,
            };
            if query.matches(&parsed) {
                objects.push(StoredObject::new(object_url.clone(), Some(stored.version_tag.clone()), parsed));
            }
        }
        Ok(objects)
    }

    async fn get_object(&self, location: &ObjectLocation) -> Result<StoredObject> {
        let url = location.url()?;
        self.check_access(&url)?;

        let mut state = self.server.lock();
        state.behaviour.can_get_object()?;
        match state.objects.get(&url) {
            None => Err(Error::object_not_found(&url)),
            Some(stored) => {
                let parsed = crate::ical::parse(&stored.ical)?;
                Ok(StoredObject::new(url, Some(stored.version_tag.clone()), parsed))
            },
        }
    }

    async fn put(&self, location: &ObjectLocation, ical: String) -> Result<Option<VersionTag>> {
        let url = location.url()?;
        self.check_access(&url)?;
        let collection = location.calendar().url()?;

        let mut state = self.server.lock();
        state.behaviour.can_put()?;
        if !state.collections.contains_key(&collection) {
            return Err(Error::calendar_not_found(location.calendar().name()));
        }
        let parsed = crate::ical::parse(&ical)?;
        let previous = match state.objects.get(&url) {
            None => None,
            Some(stored) => crate::ical::parse(&stored.ical).ok(),
        };

        let version_tag = VersionTag::random();
        state.objects.insert(url.clone(), StoredText { version_tag: version_tag.clone(), ical: ical.clone() });
        log::info!("Stored {}", url);

        self.schedule(&mut state, location, &parsed, &ical, previous.as_ref());
        Ok(Some(version_tag))
    }

    async fn delete(&self, url: &Url) -> Result<()> {
        self.check_access(url)?;

        let mut state = self.server.lock();
        state.behaviour.can_delete()?;
        if state.objects.remove(url).is_some() {
            log::info!("Deleted {}", url);
            return Ok(());
        }
        if state.collections.remove(url).is_some() {
            state.objects.retain(|object_url, _| collection_of(object_url).as_ref() != Some(url));
            log::info!("Deleted calendar {}", url);
            return Ok(());
        }
        Err(Error::object_not_found(url))
    }
}


fn first_component(calendar: &IcalCalendar) -> Option<Component> {
    components(calendar).next()
}

/// The URL of the collection an object belongs to
fn collection_of(object_url: &Url) -> Option<Url> {
    object_url.join("./").ok()
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;

    fn server() -> MemoryServer {
        let server = MemoryServer::new();
        server.add_account("alice", "secret", "a@x.com").unwrap();
        server.add_account("bob", "secret", "b@x.com").unwrap();
        server
    }

    const EVENT: &str = "BEGIN:VCALENDAR\r
VERSION:2.0\r
PRODID:-//Test//EN\r
BEGIN:VEVENT\r
UID:lunch\r
DTSTAMP:20240401T080000Z\r
SUMMARY:Lunch\r
END:VEVENT\r
END:VCALENDAR\r
";

    #[test]
    fn test_login() {
        let server = server();
        assert!(server.login("alice", "secret").is_ok());
        assert_eq!(server.login("alice", "wrong").unwrap_err().kind(), ErrorKind::Authentication);
        assert_eq!(server.login("mallory", "secret").unwrap_err().kind(), ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn test_calendars() {
        let alice = server().login("alice", "secret").unwrap();
        assert!(alice.list_calendars().await.unwrap().is_empty());

        let work = alice.create_calendar("work", "Work stuff").await.unwrap();
        let calendars = alice.list_calendars().await.unwrap();
        assert_eq!(calendars.len(), 1);
        assert_eq!(calendars[0].name(), "work");
        assert_eq!(calendars[0].description(), Some("Work stuff"));
        assert_eq!(alice.find_calendar("work").await.unwrap(), work);
        assert!(alice.create_calendar("work", "").await.is_err());

        alice.delete_calendar(&work).await.unwrap();
        assert!(alice.list_calendars().await.unwrap().is_empty());
        let err = alice.delete_calendar(&work).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_objects() {
        let alice = server().login("alice", "secret").unwrap();
        let work = alice.create_calendar("work", "").await.unwrap();
        let location = work.object("lunch");

        alice.put(&location, EVENT.to_string()).await.unwrap();
        let fetched = alice.get_object(&location).await.unwrap();
        assert_eq!(fetched.name().as_deref(), Some("lunch"));
        assert!(alice.get_by_uid(&work, "lunch").await.is_ok());
        assert_eq!(alice.get_by_uid(&work, "dinner").await.unwrap_err().kind(), ErrorKind::NotFound);

        alice.delete_object(&location).await.unwrap();
        assert_eq!(alice.get_object(&location).await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_put_into_missing_calendar() {
        let alice = server().login("alice", "secret").unwrap();
        let nowhere = alice.calendar("nowhere").await.unwrap();
        let err = alice.put(&nowhere.object("lunch"), EVENT.to_string()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_no_access_to_other_home_sets() {
        let server = server();
        let alice = server.login("alice", "secret").unwrap();
        let bob = server.login("bob", "secret").unwrap();
        let work = alice.create_calendar("work", "").await.unwrap();

        let err = bob.put(&work.object("lunch"), EVENT.to_string()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn test_inbox_is_not_a_calendar() {
        let alice = server().login("alice", "secret").unwrap();
        let inbox = alice.inbox().await.unwrap();
        assert_eq!(inbox.name(), "inbox");
        assert!(alice.query(&inbox, &CalendarQuery::events()).await.unwrap().is_empty());
        assert!(alice.list_calendars().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_by_local_part() {
        let server = server();
        let alice = server.login("alice", "secret").unwrap();
        let bob = server.login("bob", "secret").unwrap();
        let work = alice.create_calendar("work", "").await.unwrap();

        let invitation = EVENT.replace(
            "SUMMARY:Lunch\r\n",
            "SUMMARY:Lunch\r\nORGANIZER:mailto:a@x.com\r\nATTENDEE;PARTSTAT=NEEDS-ACTION:mailto:bob@elsewhere.org\r\n",
        );
        alice.put(&work.object("lunch"), invitation).await.unwrap();

        let inbox = bob.inbox().await.unwrap();
        assert!(bob.get_by_uid(&inbox, "lunch").await.is_ok());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let server = server();
        let alice = server.login("alice", "secret").unwrap();
        server.set_mock_behaviour(MockBehaviour { create_calendar_behaviour: (0, 1), ..MockBehaviour::default() });

        let err = alice.create_calendar("work", "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(alice.create_calendar("work", "").await.is_ok());
    }
}
