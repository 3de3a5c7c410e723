//! Support for client configuration options

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;

fn default_inbox() -> String {
    String::from("inbox")
}

fn default_org_name() -> String {
    String::from("My organization")
}

fn default_product_name() -> String {
    String::from("CalDavRsvp")
}

/// Everything a session needs to know about the server it talks to.
///
/// This is passed explicitly to the entry points that need it, there are no process-wide settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the CalDAV server, e.g. `http://127.0.0.1:90/dav.php/`
    pub url: Url,
    /// Timeout applied to every request. No timeout when `None`
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Name of the scheduling inbox collection, inside the calendar home set
    #[serde(default = "default_inbox")]
    pub inbox: String,
    /// Part of the ProdID string that describes the organization (example of a ProdID string: `-//ABC Corporation//My Product//EN`).
    #[serde(default = "default_org_name")]
    pub org_name: String,
    /// Part of the ProdID string that describes the product name
    #[serde(default = "default_product_name")]
    pub product_name: String,
    /// VTIMEZONE text sent along with MKCALENDAR requests
    #[serde(default)]
    pub calendar_timezone: Option<String>,
}

impl Config {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            timeout_secs: None,
            inbox: default_inbox(),
            org_name: default_org_name(),
            product_name: default_product_name(),
            calendar_timezone: None,
        }
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config = serde_json::from_reader(file)?;
        Ok(config)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// The PRODID written into every iCal file this crate generates
    pub fn prod_id(&self) -> String {
        format!("-//{}//{}//EN", self.org_name, self.product_name)
    }
}
