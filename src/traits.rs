//! Traits used by the workflow and the menus to talk to calendar stores

use async_trait::async_trait;
use url::Url;

use crate::calendar::CalendarInfo;
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::ical::find_component_by_uid;
use crate::item::{ItemKind, StoredObject, VersionTag};
use crate::location::{CalendarLocation, ObjectLocation};
use crate::query::CalendarQuery;

/// An authenticated session on a CalDAV server (or anything that behaves like one).
///
/// Every call is a round-trip to the store: nothing is cached, except the home set URL.
#[async_trait]
pub trait CalendarStore: Send + Sync {
    /// The URL of the calendar home set of the logged-in user
    async fn find_home_set(&self) -> Result<Url>;

    /// Name of the scheduling inbox collection inside the home set
    fn inbox_name(&self) -> &str;

    /// Returns the calendars of the home set. The scheduling inbox is not a calendar and is not part of them
    async fn list_calendars(&self) -> Result<Vec<CalendarInfo>>;

    /// Create a new calendar collection in the home set
    async fn create_calendar(&self, name: &str, description: &str) -> Result<CalendarLocation>;

    /// Run a `calendar-query` REPORT on a calendar collection
    async fn query(&self, calendar: &CalendarLocation, query: &CalendarQuery) -> Result<Vec<StoredObject>>;

    /// Fetch a single object
    async fn get_object(&self, location: &ObjectLocation) -> Result<StoredObject>;

    /// Store an iCal file, replacing whatever was there
    async fn put(&self, location: &ObjectLocation, ical: String) -> Result<Option<VersionTag>>;

    /// Delete a collection or an object. Deleting something that does not exist is a `NotFound` error
    async fn delete(&self, url: &Url) -> Result<()>;


    /// The scheduling inbox of the logged-in user
    async fn inbox(&self) -> Result<CalendarLocation> {
        let home_set = self.find_home_set().await?;
        Ok(CalendarLocation::new(&home_set, self.inbox_name()))
    }

    /// A calendar of the home set, whether it exists or not
    async fn calendar(&self, name: &str) -> Result<CalendarLocation> {
        let home_set = self.find_home_set().await?;
        Ok(CalendarLocation::new(&home_set, name))
    }

    /// An existing calendar of the home set
    async fn find_calendar(&self, name: &str) -> Result<CalendarLocation> {
        let home_set = self.find_home_set().await?;
        self.list_calendars().await?
            .iter()
            .find(|info| info.name() == name)
            .map(|info| info.location(&home_set))
            .ok_or_else(|| Error::calendar_not_found(name))
    }

    /// Returns the object of this calendar that contains a component with this UID
    async fn get_by_uid(&self, calendar: &CalendarLocation, uid: &str) -> Result<StoredObject> {
        for kind in &[ItemKind::Event, ItemKind::Todo] {
            let query = CalendarQuery::new(*kind).by_uid(uid);
            for object in self.query(calendar, &query).await? {
                if find_component_by_uid(object.calendar(), uid).is_ok() {
                    return Ok(object);
                }
            }
        }
        Err(Error::uid_not_found(uid))
    }

    async fn delete_calendar(&self, calendar: &CalendarLocation) -> Result<()> {
        self.delete(&calendar.url()?).await
    }

    async fn delete_object(&self, location: &ObjectLocation) -> Result<()> {
        self.delete(&location.url()?).await
    }
}


/// Something that can open a [`CalendarStore`] session for a user
#[async_trait]
pub trait Connector: Send + Sync {
    type Store: CalendarStore;

    async fn connect(&self, credentials: &Credentials) -> Result<Self::Store>;
}
