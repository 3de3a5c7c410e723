use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use url::Url;

use caldav_rsvp::config::Config;
use caldav_rsvp::credentials::CredentialSource;
use caldav_rsvp::input::Console;
use caldav_rsvp::menu::Menu;

const DEFAULT_URL: &str = "http://127.0.0.1:90/dav.php/";

#[derive(Parser)]
#[command(name = "caldav-rsvp")]
#[command(about = "Manage CalDAV calendars, events, to-dos and meeting invitations")]
struct Cli {
    /// Base URL of the CalDAV server (overrides the one of the config file)
    url: Option<Url>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Read the password from the standard input instead of prompting for it
    #[arg(long)]
    password_from_stdin: bool,
}

fn load_config(cli: &Cli) -> caldav_rsvp::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::new(Url::parse(DEFAULT_URL)?),
    };
    if let Some(url) = &cli.url {
        config.url = url.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {}", err);
            return ExitCode::FAILURE;
        },
    };
    log::debug!("Using server {}", config.url);

    let credential_source = if cli.password_from_stdin { CredentialSource::Input } else { CredentialSource::Terminal };
    let stdin = std::io::stdin();
    let console = Console::new(stdin.lock(), std::io::stdout());
    let mut menu = Menu::new(config.clone(), config, credential_source, console);

    match menu.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        },
    }
}
