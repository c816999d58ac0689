//! # Booking CLI
//!
//! Command line front end of the slot booker: argument parsing, prompts for
//! contact data and SMS codes, and the interactive menu.

/// Command line arguments
mod args;
pub use args::*;

/// Engine configuration from arguments and environment
mod config;
pub use config::*;

/// Line-based prompts
mod prompt;
pub use prompt::*;

/// Ctrl-C routing to the running command
mod interrupt;
pub use interrupt::*;

/// Running the search and code commands
mod commands;
pub use commands::*;

/// Interactive menu
mod menu;
pub use menu::*;
