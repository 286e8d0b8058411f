//! Command-line interface for lotkeeper.
//!
//! This module provides the CLI structure for the `lotk` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ActivityCommand, CheckinCommand, ConfigCommand, HistoryCommand, OutputFormat, ReportCommand,
    ReportPeriodArg, SpaceKindArg, SpaceStatusArg, SpacesCommand, StatusCommand, TicketCommand,
};

use crate::logging::Verbosity;

/// lotk - Parking lot ticketing
///
/// Check vehicles in and out, quote fees, track occupancy and write
/// revenue reports.
#[derive(Debug, Parser)]
#[command(name = "lotk")]
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
    /// Check a vehicle into a space
    Checkin(CheckinCommand),

    /// Check a vehicle out and charge its fee
    Checkout(TicketCommand),

    /// Show the fee a ticket owes right now
    Fee(TicketCommand),

    /// Look up a ticket
    Find(TicketCommand),

    /// List past tickets for a plate
    History(HistoryCommand),

    /// Manage zones and spaces
    #[command(subcommand)]
    Spaces(SpacesCommand),

    /// Show lot occupancy
    Status(StatusCommand),

    /// Show recent check-ins and check-outs
    Activity(ActivityCommand),

    /// Write a revenue and occupancy report
    Report(ReportCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
