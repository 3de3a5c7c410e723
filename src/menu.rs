//! The interactive menus of the `caldav-rsvp` binary
//!
//! Errors are printed and the current menu goes on. Only the end of the input stops everything.

use std::io::{BufRead, Write};

use crate::config::Config;
use crate::credentials::CredentialSource;
use crate::error::{ErrorKind, Result};
use crate::ical::components;
use crate::input::Console;
use crate::item::{ItemKind, StoredObject};
use crate::location::CalendarLocation;
use crate::query::CalendarQuery;
use crate::traits::{CalendarStore, Connector};
use crate::workflow::{AttendanceWorkflow, InvitationState};


pub struct Menu<C, R, W> {
    connector: C,
    config: Config,
    credential_source: CredentialSource,
    console: Console<R, W>,
}

impl<C, R, W> Menu<C, R, W>
where
    C: Connector,
    R: BufRead,
    W: Write,
{
    pub fn new(connector: C, config: Config, credential_source: CredentialSource, console: Console<R, W>) -> Self {
        Self { connector, config, credential_source, console }
    }

    /// Give back the console, e.g. to inspect what has been printed
    pub fn into_console(self) -> Console<R, W> {
        self.console
    }

    /// Run the main menu, until `0` or the end of the input
    pub async fn run(&mut self) -> Result<()> {
        let result = self.main_menu().await;
        match result {
            Err(err) if err.is_end_of_input() => {
                log::debug!("End of input");
                Ok(())
            },
            other => other,
        }
    }

    /// Read a menu choice. Anything that is not a number is an invalid choice
    fn choice(&mut self) -> Result<Option<i64>> {
        let answer = self.console.line("> ")?;
        Ok(answer.parse().ok())
    }

    /// Print a failed operation, unless the input is exhausted
    fn report(&mut self, result: Result<()>) -> Result<()> {
        match result {
            Err(err) if err.is_end_of_input() => Err(err),
            Err(err) => self.console.say(format!("error: {}", err)),
            Ok(()) => Ok(()),
        }
    }

    async fn main_menu(&mut self) -> Result<()> {
        self.console.say("Main menu:")?;
        loop {
            self.console.say("1. Log in")?;
            self.console.say("0. Exit")?;
            match self.choice()? {
                Some(1) => {
                    let store = match self.log_in().await {
                        Ok(None) => return self.console.say("Shutting down..."),
                        Ok(Some(store)) => store,
                        Err(err) => {
                            self.report(Err(err))?;
                            continue;
                        },
                    };
                    let workflow = AttendanceWorkflow::new(store, &self.config);
                    let result = self.calendar_menu(&workflow).await;
                    self.report(result)?;
                },
                Some(0) => return self.console.say("Shutting down..."),
                _ => continue,
            }
        }
    }

    /// Connect, asking again after wrong credentials. `None` means the user gave up
    async fn log_in(&mut self) -> Result<Option<C::Store>> {
        loop {
            let credentials = self.credential_source.read(&mut self.console)?;
            match self.connector.connect(&credentials).await {
                Ok(store) => return Ok(Some(store)),
                Err(err) if err.kind() == ErrorKind::Authentication => {
                    let answer = self.console.line("Wrong username or password, try again? [y/n]: ")?;
                    if !answer.eq_ignore_ascii_case("y") {
                        return Ok(None);
                    }
                },
                Err(err) => return Err(err),
            }
        }
    }

    async fn calendar_menu(&mut self, workflow: &AttendanceWorkflow<C::Store>) -> Result<()> {
        let store = workflow.store();
        store.find_home_set().await?;
        loop {
            self.console.say("1. List calendars")?;
            self.console.say("2. Goto calendar")?;
            self.console.say("3. Create calendar")?;
            self.console.say("4. Check inbox")?;
            self.console.say("5. Delete calendar")?;
            self.console.say("6. Sync replies into an event")?;
            self.console.say("0. Log out")?;
            let result = match self.choice()? {
                Some(1) => self.list_calendars(store).await,
                Some(2) => {
                    let name = self.console.line("Enter calendar name to go to: ")?;
                    match store.find_calendar(&name).await {
                        Err(err) => Err(err),
                        Ok(calendar) => self.event_menu(workflow, &calendar).await,
                    }
                },
                Some(3) => {
                    let name = self.console.line("Enter new calendar name: ")?;
                    let description = self.console.line("Enter new calendar description: ")?;
                    match store.create_calendar(&name, &description).await {
                        Err(err) => Err(err),
                        Ok(_) => self.console.say(format!("Calendar {} created", name)),
                    }
                },
                Some(4) => self.inbox_menu(workflow).await,
                Some(5) => {
                    let name = self.console.line("Enter calendar name to delete: ")?;
                    match delete_calendar(store, &name).await {
                        Err(err) => Err(err),
                        Ok(()) => self.console.say(format!("Calendar {} deleted", name)),
                    }
                },
                Some(6) => {
                    let uid = self.console.line("Enter event UID: ")?;
                    let calendar = self.console.line("Enter the calendar the event is in: ")?;
                    match workflow.sync_reply_to_organizer_copy(&uid, &calendar).await {
                        Err(err) => Err(err),
                        Ok(records) => {
                            for record in records {
                                self.console.say(format!("{}: {}", record.email(), record.status()))?;
                            }
                            self.console.say("Event updated")
                        },
                    }
                },
                Some(0) => return self.console.say("Logging out..."),
                _ => continue,
            };
            self.report(result)?;
        }
    }

    async fn list_calendars(&mut self, store: &C::Store) -> Result<()> {
        for info in store.list_calendars().await? {
            self.console.say(format!(
                "{}\t{}\t[{}]\t{}",
                info.name(), info.display_name(), info.supported_components(), info.description().unwrap_or("")
            ))?;
        }
        Ok(())
    }

    async fn event_menu(&mut self, workflow: &AttendanceWorkflow<C::Store>, calendar: &CalendarLocation) -> Result<()> {
        let store = workflow.store();
        self.console.say(format!("Current calendar: {}", calendar.name()))?;
        loop {
            self.console.say("1. List events")?;
            self.console.say("2. Create event")?;
            self.console.say("3. Create recurrent event")?;
            self.console.say("4. Find events by time range")?;
            self.console.say("5. Delete event")?;
            self.console.say("6. Add attendee")?;
            self.console.say("0. Back to calendar menu")?;
            let result = match self.choice()? {
                Some(1) => self.list_objects(store, calendar).await,
                Some(2) => {
                    let event = self.console.event();
                    match event {
                        Err(err) => Err(err),
                        Ok(event) => match workflow.create_event(calendar, &event).await {
                            Err(err) => Err(err),
                            Ok(_) if event.kind() == ItemKind::Todo => self.console.say("Todo created"),
                            Ok(_) => self.console.say("Event created"),
                        },
                    }
                },
                Some(3) => {
                    let event = self.console.recurring_event();
                    match event {
                        Err(err) => Err(err),
                        Ok(event) => match workflow.create_event(calendar, &event).await {
                            Err(err) => Err(err),
                            Ok(_) => self.console.say("Recurrent event created"),
                        },
                    }
                },
                Some(4) => {
                    let start = self.console.date_time("range start")?;
                    let end = self.console.date_time("range end")?;
                    let query = CalendarQuery::events().in_range(start, end).expanded();
                    match store.query(calendar, &query).await {
                        Err(err) => Err(err),
                        Ok(objects) => self.print_objects(&objects),
                    }
                },
                Some(5) => {
                    let name = self.console.line("Enter event path to delete (without .ics): ")?;
                    match store.delete_object(&calendar.object(&name)).await {
                        Err(err) => Err(err),
                        Ok(()) => self.console.say("Event deleted"),
                    }
                },
                Some(6) => {
                    let name = self.console.line("Enter event path (without .ics): ")?;
                    let uid = self.console.line("Enter event UID: ")?;
                    let email = self.console.line("Enter attendee email: ")?;
                    match workflow.add_attendee(&calendar.object(&name), &uid, &email).await {
                        Err(err) => Err(err),
                        Ok(()) => self.console.say(format!("{} invited", email)),
                    }
                },
                Some(0) => return self.console.say("Returning to calendar menu..."),
                _ => continue,
            };
            self.report(result)?;
        }
    }

    async fn list_objects(&mut self, store: &C::Store, calendar: &CalendarLocation) -> Result<()> {
        self.console.say(format!("{} EVENTS:", calendar.name()))?;
        let events = store.query(calendar, &CalendarQuery::events()).await?;
        self.print_objects(&events)?;
        self.console.say(format!("{} TODOS:", calendar.name()))?;
        let todos = store.query(calendar, &CalendarQuery::todos()).await?;
        self.print_objects(&todos)
    }

    async fn inbox_menu(&mut self, workflow: &AttendanceWorkflow<C::Store>) -> Result<()> {
        self.console.say(format!("Current calendar: {}", workflow.store().inbox_name()))?;
        loop {
            self.console.say("1. List invitations")?;
            self.console.say("2. Reply to an invitation")?;
            self.console.say("0. Return to calendar menu")?;
            let result = match self.choice()? {
                Some(1) => match workflow.list_invitations().await {
                    Err(err) => Err(err),
                    Ok(invitations) => {
                        for invitation in invitations {
                            let summary = invitation.component().summary().unwrap_or_default();
                            self.console.say(format!("{}\t{}\t{}", invitation.location().name(), invitation.uid(), summary))?;
                        }
                        Ok(())
                    },
                },
                Some(2) => {
                    let uid = self.console.line("Enter event UID: ")?;
                    let reply = self.console.reply()?;
                    match workflow.modify_attendance(&uid, &reply).await {
                        Err(err) => Err(err),
                        Ok(InvitationState::Accepted(location)) => self.console.say(format!("Event accepted, stored in {}", location.calendar().name())),
                        Ok(InvitationState::Declined) => self.console.say("Event declined"),
                        Ok(InvitationState::Delegated(to)) => self.console.say(format!("Event delegated to {}", to)),
                    }
                },
                Some(0) => return Ok(()),
                _ => continue,
            };
            self.report(result)?;
        }
    }

    fn print_objects(&mut self, objects: &[StoredObject]) -> Result<()> {
        for object in objects {
            self.console.say(format!("path: {}", object.name().unwrap_or_default()))?;
            for component in components(object.calendar()) {
                for property in component.properties() {
                    self.console.say(format!("{}: {}", property.name, property.value.as_deref().unwrap_or("")))?;
                }
                self.console.say("")?;
            }
        }
        Ok(())
    }
}

async fn delete_calendar<S: CalendarStore>(store: &S, name: &str) -> Result<()> {
    let calendar = store.calendar(name).await?;
    store.delete_calendar(&calendar).await
}
