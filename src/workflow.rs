//! The invitation and attendance workflow
//!
//! An organizer creates an event with attendees in one of their calendars. The server delivers a copy into the
//! scheduling inbox of every attendee. Each attendee then finds the invitation by UID and replies to it:
//! * declining deletes the inbox copy,
//! * accepting writes an updated copy into one of the attendee's calendars, and leaves the inbox copy in place,
//! * delegating updates the inbox copy in place.
//!
//! The organizer's copy only reflects replies once [`AttendanceWorkflow::sync_reply_to_organizer_copy`] has been called.

use chrono::Utc;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::ical::{build_from, components, find_component_by_uid, Component, ParticipationRecord, ParticipationStatus};
use crate::location::{CalendarLocation, ObjectLocation};
use crate::query::CalendarQuery;
use crate::traits::CalendarStore;


/// What an attendee decides to do with an invitation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Accept, and keep a copy of the event in this calendar of the attendee
    Accept { calendar: String },
    Decline,
    /// Hand the invitation over to someone else
    Delegate { to: String },
}

/// The reply of one attendee to an invitation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    /// The address the attendee was invited with
    pub email: String,
    pub decision: Decision,
}

impl Reply {
    pub fn accept<S: ToString, T: ToString>(email: S, calendar: T) -> Self {
        Self { email: email.to_string(), decision: Decision::Accept { calendar: calendar.to_string() } }
    }

    pub fn decline<S: ToString>(email: S) -> Self {
        Self { email: email.to_string(), decision: Decision::Decline }
    }

    pub fn delegate<S: ToString, T: ToString>(email: S, to: T) -> Self {
        Self { email: email.to_string(), decision: Decision::Delegate { to: to.to_string() } }
    }
}

/// The state an invitation ends up in, for the replying attendee
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvitationState {
    /// The accepted copy has been written at this location
    Accepted(ObjectLocation),
    Declined,
    Delegated(String),
}

/// An invitation found in the scheduling inbox
#[derive(Clone, Debug)]
pub struct Invitation {
    uid: String,
    location: ObjectLocation,
    component: Component,
}

impl Invitation {
    pub fn uid(&self) -> &str { &self.uid }
    /// Where the inbox copy is stored
    pub fn location(&self) -> &ObjectLocation { &self.location }
    pub fn component(&self) -> &Component { &self.component }

    /// The participation of an attendee, as currently stored in the inbox copy
    pub fn status_of(&self, email: &str) -> Result<ParticipationStatus> {
        self.component.attendee(email)
            .map(|record| record.status().clone())
            .ok_or_else(|| Error::attendee_not_found(email))
    }
}


/// Runs the invitation workflow against a [`CalendarStore`].
///
/// Every step issues its store calls one after the other, and returns the first error unchanged.
/// Nothing is retried, and writes to several locations are not transactional.
pub struct AttendanceWorkflow<S: CalendarStore> {
    store: S,
    prod_id: String,
}

impl<S: CalendarStore> AttendanceWorkflow<S> {
    pub fn new(store: S, config: &Config) -> Self {
        Self { store, prod_id: config.prod_id() }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Store a new event (or to-do) in a calendar.
    ///
    /// When it has attendees, the server is expected to deliver it to their inboxes.
    /// The object is named after the UID of the event.
    pub async fn create_event(&self, calendar: &CalendarLocation, event: &Event) -> Result<ObjectLocation> {
        let ical = build_from(event, &self.prod_id)?;
        let location = calendar.object(event.uid());
        self.store.put(&location, ical).await?;
        log::info!("Created {} {} with {} attendees", event.kind(), event.uid(), event.attendees().len());
        Ok(location)
    }

    /// Invite one more person to an existing event
    pub async fn add_attendee(&self, location: &ObjectLocation, uid: &str, email: &str) -> Result<()> {
        let stored = self.store.get_object(location).await?;
        let mut component = find_component_by_uid(stored.calendar(), uid)?;

        if component.organizer().is_none() {
            return Err(Error::Invariant(format!("event {} has no organizer, attendees cannot be added", uid)));
        }
        if component.attendee(email).is_some() {
            return Err(Error::Validation(format!("{} is already invited to {}", email, uid)));
        }

        component.add_attendee(email, &ParticipationStatus::NeedsAction, None);
        component.set_last_modified(&Utc::now());
        self.store.put(location, component.to_ical(&self.prod_id)).await?;
        log::info!("Invited {} to {}", email, uid);
        Ok(())
    }

    /// Every invitation currently in the inbox
    pub async fn list_invitations(&self) -> Result<Vec<Invitation>> {
        let inbox = self.store.inbox().await?;
        let mut invitations = Vec::new();
        for query in &[CalendarQuery::events(), CalendarQuery::todos()] {
            for object in self.store.query(&inbox, query).await? {
                let name = match object.name() {
                    None => continue,
                    Some(name) => name,
                };
                let found = components(object.calendar())
                    .filter(|component| component.kind() == query.kind());
                for component in found {
                    if let Some(uid) = component.uid().map(String::from) {
                        invitations.push(Invitation { uid, location: inbox.object(&name), component });
                    }
                }
            }
        }
        Ok(invitations)
    }

    /// Locate an invitation in the inbox
    pub async fn find_invitation(&self, uid: &str) -> Result<Invitation> {
        let inbox = self.store.inbox().await?;
        let stored = self.store.get_by_uid(&inbox, uid).await?;
        let name = stored.name()
            .ok_or_else(|| Error::MalformedResponse(format!("{} has no object name", stored.url())))?;
        let component = find_component_by_uid(stored.calendar(), uid)?;

        log::info!("Found invitation {} at {}", uid, name);
        Ok(Invitation { uid: uid.to_string(), location: inbox.object(name), component })
    }

    /// Apply the reply of an attendee to an invitation
    pub async fn respond(&self, invitation: Invitation, reply: &Reply) -> Result<InvitationState> {
        let Invitation { uid, location, mut component } = invitation;

        // The attendee must be invited, whatever the decision
        if component.attendee(&reply.email).is_none() {
            return Err(Error::attendee_not_found(&reply.email));
        }

        match &reply.decision {
            Decision::Decline => {
                self.store.delete_object(&location).await?;
                log::info!("{} declined {}", reply.email, uid);
                Ok(InvitationState::Declined)
            },
            Decision::Accept { calendar } => {
                component.set_participation_status(&reply.email, &ParticipationStatus::Accepted)?;
                component.set_last_modified(&Utc::now());

                let target = location.moved_to(calendar);
                self.store.put(&target, component.to_ical(&self.prod_id)).await?;
                log::info!("{} accepted {}, stored at {}", reply.email, uid, target);
                Ok(InvitationState::Accepted(target))
            },
            Decision::Delegate { to } => {
                if reply.email.eq_ignore_ascii_case(to) {
                    return Err(Error::Validation(format!("{} cannot delegate to themselves", reply.email)));
                }
                component.set_participation_status(&reply.email, &ParticipationStatus::Delegated(to.clone()))?;
                if component.attendee(to).is_none() {
                    component.add_attendee(to, &ParticipationStatus::NeedsAction, Some(&reply.email));
                }
                component.set_last_modified(&Utc::now());

                self.store.put(&location, component.to_ical(&self.prod_id)).await?;
                log::info!("{} delegated {} to {}", reply.email, uid, to);
                Ok(InvitationState::Delegated(to.clone()))
            },
        }
    }

    /// Find the invitation with this UID in the inbox, and reply to it
    pub async fn modify_attendance(&self, uid: &str, reply: &Reply) -> Result<InvitationState> {
        let invitation = self.find_invitation(uid).await?;
        self.respond(invitation, reply).await
    }

    /// Reflect the replies found in the organizer's inbox onto the organizer's own copy of an event.
    ///
    /// Returns the participation records that have been applied.
    pub async fn sync_reply_to_organizer_copy(&self, uid: &str, organizer_calendar: &str) -> Result<Vec<ParticipationRecord>> {
        let calendar = self.store.find_calendar(organizer_calendar).await?;
        let stored = self.store.get_by_uid(&calendar, uid).await?;
        let name = stored.name()
            .ok_or_else(|| Error::MalformedResponse(format!("{} has no object name", stored.url())))?;
        let mut organizer_copy = find_component_by_uid(stored.calendar(), uid)?;

        let inbox = self.store.inbox().await?;
        let query = CalendarQuery::new(organizer_copy.kind()).by_uid(uid);
        let replies = self.store.query(&inbox, &query).await?;
        if replies.is_empty() {
            return Err(Error::uid_not_found(uid));
        }

        let mut applied = Vec::new();
        for reply in replies {
            let reply = match find_component_by_uid(reply.calendar(), uid) {
                Err(_) => continue,
                Ok(component) => component,
            };
            for record in reply.attendees() {
                if record.status() == &ParticipationStatus::NeedsAction {
                    continue;
                }
                if organizer_copy.attendee(record.email()).as_ref() == Some(&record) {
                    continue;
                }
                match organizer_copy.set_participation_status(record.email(), record.status()) {
                    Err(err) if err.is_not_found() => organizer_copy.add_attendee(record.email(), record.status(), None),
                    Err(err) => return Err(err),
                    Ok(()) => {},
                }
                if let Some(delegate) = record.delegate_to() {
                    if organizer_copy.attendee(delegate).is_none() {
                        organizer_copy.add_attendee(delegate, &ParticipationStatus::NeedsAction, Some(record.email()));
                    }
                }
                log::debug!("{} is now {} for {}", record.email(), record.status(), uid);
                applied.push(record);
            }
        }

        organizer_copy.set_last_modified(&Utc::now());
        self.store.put(&calendar.object(name), organizer_copy.to_ical(&self.prod_id)).await?;
        log::info!("Synced {} replies into the organizer copy of {}", applied.len(), uid);
        Ok(applied)
    }
}
