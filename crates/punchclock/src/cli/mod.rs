//! Command-line interface for punchclock.
//!
//! This module provides the CLI structure for the `pclock` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, HistoryCommand, LoginCommand, StatusCommand, TodayCommand, UserCommand,
};

use crate::logging::Verbosity;

/// pclock - Location-stamped attendance clock
///
/// Records clock-in and clock-out events together with where they happened.
#[derive(Debug, Parser)]
#[command(name = "pclock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),

    /// Log in as a registered user
    Login(LoginCommand),

    /// Log out the current user
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Clock in at the current location
    In,

    /// Clock out at the current location
    Out,

    /// Show today's records of the current user
    Today(TodayCommand),

    /// Show all records of the current user
    History(HistoryCommand),

    /// Show store and session status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}
