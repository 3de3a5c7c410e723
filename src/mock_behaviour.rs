//! This module provides ways to tweak the in-memory server, so that it can return errors on some tests

use crate::error::{Error, Result};

/// This stores some behaviour tweaks, that describe how a mocked store will behave during a given test
///
/// So that a functions fails _n_ times after _m_ initial successes, set `(m, n)` for the suited parameter
#[derive(Default, Clone, Debug)]
pub struct MockBehaviour {
    /// If this is true, every action will be allowed
    pub is_suspended: bool,

    pub connect_behaviour: (u32, u32),
    pub list_calendars_behaviour: (u32, u32),
    pub create_calendar_behaviour: (u32, u32),
    pub query_behaviour: (u32, u32),
    pub get_object_behaviour: (u32, u32),
    pub put_behaviour: (u32, u32),
    pub delete_behaviour: (u32, u32),
}

impl MockBehaviour {
    pub fn new() -> Self {
        Self::default()
    }

    /// All operations will fail at once, for `n_fails` times
    pub fn fail_now(n_fails: u32) -> Self {
        Self {
            is_suspended: false,
            connect_behaviour: (0, n_fails),
            list_calendars_behaviour: (0, n_fails),
            create_calendar_behaviour: (0, n_fails),
            query_behaviour: (0, n_fails),
            get_object_behaviour: (0, n_fails),
            put_behaviour: (0, n_fails),
            delete_behaviour: (0, n_fails),
        }
    }

    /// Suspend this mock behaviour until you call `resume`
    pub fn suspend(&mut self) {
        self.is_suspended = true;
    }
    /// Make this behaviour active again
    pub fn resume(&mut self) {
        self.is_suspended = false;
    }

    pub fn can_connect(&mut self) -> Result<()> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.connect_behaviour, "connect")
    }
    pub fn can_list_calendars(&mut self) -> Result<()> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.list_calendars_behaviour, "list_calendars")
    }
    pub fn can_create_calendar(&mut self) -> Result<()> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.create_calendar_behaviour, "create_calendar")
    }
    pub fn can_query(&mut self) -> Result<()> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.query_behaviour, "query")
    }
    pub fn can_get_object(&mut self) -> Result<()> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.get_object_behaviour, "get_object")
    }
    pub fn can_put(&mut self) -> Result<()> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.put_behaviour, "put")
    }
    pub fn can_delete(&mut self) -> Result<()> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.delete_behaviour, "delete")
    }
}


/// Return Ok(()) in case the value is `(1+, _)` or `(_, 0)`, or return Err and decrement otherwise
fn decrement(value: &mut (u32, u32), descr: &str) -> Result<()> {
    let remaining_successes = value.0;
    let remaining_failures = value.1;

    if remaining_successes > 0 {
        value.0 -= 1;
        log::debug!("Mock behaviour: allowing a {} ({:?})", descr, value);
        Ok(())
    } else if remaining_failures > 0 {
        value.1 -= 1;
        log::debug!("Mock behaviour: failing a {} ({:?})", descr, value);
        Err(Error::Mocked(format!("Mocked behaviour requires this {} to fail this time. ({:?})", descr, value)))
    } else {
        log::debug!("Mock behaviour: allowing a {} ({:?})", descr, value);
        Ok(())
    }
}
