//! Errors returned by every layer of this crate

use std::fmt::{Display, Formatter};

use thiserror::Error;
use url::Url;

/// The coarse category an [`Error`] belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad credentials
    Authentication,
    /// A calendar, object, UID or attendee is absent
    NotFound,
    /// Network or HTTP-level failure
    Transport,
    /// Malformed user input (dates, frequency tokens...)
    Validation,
    /// Data that breaks an assumption of the workflow
    Invariant,
}

/// What could not be found
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Missing {
    Calendar(String),
    Object(String),
    Uid(String),
    Attendee(String),
}

impl Display for Missing {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Missing::Calendar(name) => write!(f, "calendar with name {}", name),
            Missing::Object(path) => write!(f, "object at {}", path),
            Missing::Uid(uid) => write!(f, "event with UID {}", uid),
            Missing::Attendee(email) => write!(f, "attendee {}", email),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("authentication failed for user {0}")]
    Authentication(String),

    #[error("{0} not found")]
    NotFound(Missing),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} for {url}")]
    UnexpectedStatus { url: Url, status: u16 },

    #[error("invalid XML in server response: {0}")]
    Xml(#[from] minidom::Error),

    #[error("malformed server response: {0}")]
    MalformedResponse(String),

    #[error("invalid iCal data: {0}")]
    Ical(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("invalid frequency {0:?}, expected one of Y, MO, W, D, H, MI, S")]
    InvalidFrequency(String),

    #[error("{0}")]
    Invariant(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("mocked failure: {0}")]
    Mocked(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Authentication(_) => ErrorKind::Authentication,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Http(_)
            | Error::UnexpectedStatus { .. }
            | Error::Xml(_)
            | Error::MalformedResponse(_)
            | Error::Mocked(_)
            | Error::Io(_) => ErrorKind::Transport,
            Error::Validation(_)
            | Error::InvalidFrequency(_)
            | Error::Config(_)
            | Error::Url(_) => ErrorKind::Validation,
            Error::Ical(_) | Error::Invariant(_) => ErrorKind::Invariant,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Whether this error means the input stream is exhausted
    pub fn is_end_of_input(&self) -> bool {
        match self {
            Error::Io(err) => err.kind() == std::io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }

    pub(crate) fn calendar_not_found<S: ToString>(name: S) -> Self {
        Error::NotFound(Missing::Calendar(name.to_string()))
    }

    pub(crate) fn object_not_found<S: ToString>(path: S) -> Self {
        Error::NotFound(Missing::Object(path.to_string()))
    }

    pub(crate) fn uid_not_found<S: ToString>(uid: S) -> Self {
        Error::NotFound(Missing::Uid(uid.to_string()))
    }

    pub(crate) fn attendee_not_found<S: ToString>(email: S) -> Self {
        Error::NotFound(Missing::Attendee(email.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
