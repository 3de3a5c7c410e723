//! Username and password used for HTTP Basic authentication

use std::io::{BufRead, Write};

use crate::error::Result;
use crate::input::Console;

/// Where credentials are read from when logging in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialSource {
    /// Username from the console, password typed on the terminal without echo
    Terminal,
    /// Both lines read from the console, like the rest of the input
    Input,
}

impl CredentialSource {
    pub fn read<R: BufRead, W: Write>(&self, console: &mut Console<R, W>) -> Result<Credentials> {
        let username = console.line("username: ")?;
        let password = match self {
            CredentialSource::Terminal => rpassword::prompt_password("password: ")?,
            CredentialSource::Input => console.line("password: ")?,
        };
        Ok(Credentials::new(username, password))
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new<S: ToString, T: ToString>(username: S, password: T) -> Self {
        Self { username: username.to_string(), password: password.to_string() }
    }

    pub fn username(&self) -> &str { &self.username }
    pub fn password(&self) -> &str { &self.password }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<hidden>")
            .finish()
    }
}
