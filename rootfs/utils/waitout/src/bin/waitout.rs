use std::{ffi::OsString, process::ExitCode};

use clap::Parser;
use tracing::Level;
use waitout::{
    error::WaitError,
    target::WatchTarget,
    watcher::{Outcome, WaitConfig, Watcher},
};

const EXIT_FAILURE: u8 = 1;
const EXIT_TIMED_OUT: u8 = 2;

/// Wait for a file to appear
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Give up after this many seconds (negative = wait forever)
    #[arg(short = 't', value_name = "seconds", allow_negative_numbers = true)]
    timeout: Option<i64>,

    /// Remove any existing file at the path before waiting
    #[arg(short = 'p')]
    purge: bool,

    /// More logging on stderr (-vv for trace)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path of the file to wait for (must contain a '/')
    target: OsString,
}

impl Cli {
    fn into_config(self) -> Result<WaitConfig, WaitError> {
        Ok(WaitConfig {
            target: WatchTarget::parse(&self.target)?,
            timeout_secs: self.timeout,
            purge: self.purge,
        })
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            e.print().ok();
            // 2 means "timed out" here, so usage errors can't use clap's default
            return if e.use_stderr() {
                ExitCode::from(EXIT_FAILURE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(match cli.verbose {
            0 => Level::WARN,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        })
        .init();

    let result = cli
        .into_config()
        .and_then(|config| Watcher::new().wait_for(&config));

    match result {
        Ok(Outcome::Satisfied) => ExitCode::SUCCESS,
        Ok(Outcome::Expired) => ExitCode::from(EXIT_TIMED_OUT),
        Err(e) => {
            eprintln!("waitout: {}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
