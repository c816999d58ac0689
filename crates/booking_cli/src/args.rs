use std::path::PathBuf;

use booking_engine::{Command, RunSettings, SlotSelection};
use clap::{Parser, Subcommand};
use contact_store::DEFAULT_CONTACT_FILE;

/// Command line of `slot-booker`
#[derive(Parser, Debug)]
#[command(name = "slot-booker")]
#[command(about = "Finds and books appointment slots; without a subcommand an interactive menu starts")]
#[command(version)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Contact-data file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Only collect and save contact data
    #[arg(short, long, global = true)]
    pub configure_only: bool,

    /// Use the contact-data file as-is, never prompt for contact data
    #[arg(short, long, global = true)]
    pub read_only: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

/// Subcommands; none starts the interactive menu
#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Search for an appointment and book it
    Search {
        /// Seconds to wait between probes
        #[arg(short = 's', long = "retry-sec", default_value_t = 60)]
        retry_sec: u64,

        /// Which offer to book when several are available (first, earliest)
        #[arg(long, default_value = "first")]
        selection: SlotSelection,
    },

    /// Obtain a booking code via SMS verification
    Code,
}

impl Cli {
    /// Command to run, `None` for the interactive menu
    pub fn command(&self) -> Option<Command> {
        self.command.as_ref().map(|command| match command {
            CliCommand::Search { .. } => Command::Search,
            CliCommand::Code => Command::Code,
        })
    }

    /// Run settings as given on the command line, not yet validated
    pub fn settings(&self) -> RunSettings {
        let retry_seconds = match &self.command {
            Some(CliCommand::Search { retry_sec, .. }) => *retry_sec,
            _ => RunSettings::default().retry_seconds,
        };

        RunSettings {
            configure_only: self.configure_only,
            read_only: self.read_only,
            retry_seconds,
        }
    }

    /// Offer selection for the search command
    pub fn selection(&self) -> SlotSelection {
        match &self.command {
            Some(CliCommand::Search { selection, .. }) => *selection,
            _ => SlotSelection::default(),
        }
    }

    /// Contact-data file, defaulting to `data/kontaktdaten.json`
    pub fn contact_file(&self) -> PathBuf {
        self.file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTACT_FILE))
    }

    /// Default log filter
    pub fn log_filter(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}
