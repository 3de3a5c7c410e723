//! This crate provides a CalDAV client, with support for meeting invitations.
//!
//! It provides a CalDAV client in the [`client`] module, that talks to a server over HTTP. \
//! An in-memory server that emulates server-side scheduling is available in the [`memory`] module. \
//! Both implement the [`CalendarStore`](traits::CalendarStore) trait.
//!
//! On top of any store, an [`AttendanceWorkflow`](workflow::AttendanceWorkflow) lets organizers invite attendees,
//! and lets attendees accept, decline or delegate the invitations they find in their scheduling inbox.

pub mod error;
pub use error::{Error, ErrorKind, Result};
pub mod config;
pub use config::Config;
pub mod credentials;
pub use credentials::{CredentialSource, Credentials};

pub mod traits;
pub mod calendar;
pub mod location;
pub use location::{CalendarLocation, ObjectLocation};
mod item;
pub use item::{ItemKind, StoredObject, VersionTag};
mod event;
pub use event::{Alarm, AlarmAction, Event};
pub mod rrule;
pub use rrule::RecurrenceRule;
pub mod ical;
pub mod query;
pub use query::CalendarQuery;

pub mod client;
pub mod memory;
pub mod mock_behaviour;
pub mod workflow;
pub use workflow::{AttendanceWorkflow, Decision, Invitation, InvitationState, Reply};

pub mod input;
pub mod menu;
pub mod utils;
