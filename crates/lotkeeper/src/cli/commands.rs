//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::lot::{SpaceKind, SpaceStatus};
use crate::report::ReportPeriod;

/// Check-in arguments.
#[derive(Debug, Args)]
pub struct CheckinCommand {
    /// License plate
    #[arg(short, long)]
    pub plate: String,

    /// Owner's name
    #[arg(short, long)]
    pub owner: String,

    /// Vehicle model
    #[arg(short, long)]
    pub model: String,

    /// Space to park in (e.g. A1)
    #[arg(short, long)]
    pub space: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Arguments for commands that act on one ticket.
#[derive(Debug, Args)]
pub struct TicketCommand {
    /// Ticket id, or a scanned QR payload with --scan
    pub ticket: String,

    /// Treat the argument as a scanned QR payload
    #[arg(long)]
    pub scan: bool,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Zone and space management commands.
#[derive(Debug, Subcommand)]
pub enum SpacesCommand {
    /// List spaces
    List {
        /// Only spaces in this zone
        #[arg(short, long)]
        zone: Option<String>,

        /// Only available spaces
        #[arg(short, long)]
        available: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Add spaces to a zone, creating the zone if needed
    Add {
        /// Zone code (e.g. D)
        #[arg(short, long)]
        zone: String,

        /// Zone display name for a new zone (defaults to "Zone <code>")
        #[arg(short, long)]
        name: Option<String>,

        /// Number of spaces to add
        #[arg(long)]
        count: usize,

        /// Kind of the new spaces
        #[arg(short, long, value_enum, default_value = "covered")]
        kind: SpaceKindArg,

        /// Hourly rate for the zone, in cents
        #[arg(long)]
        rate_cents: Option<u64>,

        /// Description for the new spaces
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Set the administrative status of a space
    SetStatus {
        /// Space id
        space: String,

        /// New status
        #[arg(value_enum)]
        status: SpaceStatusArg,
    },

    /// Load the demo zones and spaces
    SeedDemo,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Only this zone
    #[arg(short, long)]
    pub zone: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Activity command arguments.
#[derive(Debug, Args)]
pub struct ActivityCommand {
    /// Maximum number of events
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// History command arguments.
#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Licence plate (case and surrounding spaces are ignored)
    pub plate: String,

    /// Maximum number of tickets
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Report command arguments.
#[derive(Debug, Args)]
pub struct ReportCommand {
    /// Period to report on
    #[arg(value_enum)]
    pub period: ReportPeriodArg,

    /// Directory to write the CSV into (defaults to the configured one)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Print the CSV instead of writing a file
    #[arg(long, conflicts_with = "output")]
    pub stdout: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Space kind argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SpaceKindArg {
    /// Under a roof
    Covered,
    /// Open air
    Uncovered,
}

impl From<SpaceKindArg> for SpaceKind {
    fn from(arg: SpaceKindArg) -> Self {
        match arg {
            SpaceKindArg::Covered => Self::Covered,
            SpaceKindArg::Uncovered => Self::Uncovered,
        }
    }
}

/// Administrative space status. `occupied` is set by check-in only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SpaceStatusArg {
    /// Open for check-in
    Available,
    /// Held back
    Reserved,
    /// Out of service
    Maintenance,
}

impl From<SpaceStatusArg> for SpaceStatus {
    fn from(arg: SpaceStatusArg) -> Self {
        match arg {
            SpaceStatusArg::Available => Self::Available,
            SpaceStatusArg::Reserved => Self::Reserved,
            SpaceStatusArg::Maintenance => Self::Maintenance,
        }
    }
}

/// Report period argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportPeriodArg {
    /// Since midnight
    Daily,
    /// Since Monday
    Weekly,
    /// Since the first of the month
    Monthly,
}

impl From<ReportPeriodArg> for ReportPeriod {
    fn from(arg: ReportPeriodArg) -> Self {
        match arg {
            ReportPeriodArg::Daily => Self::Daily,
            ReportPeriodArg::Weekly => Self::Weekly,
            ReportPeriodArg::Monthly => Self::Monthly,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_kind_arg_conversion() {
        assert_eq!(SpaceKind::from(SpaceKindArg::Covered), SpaceKind::Covered);
        assert_eq!(SpaceKind::from(SpaceKindArg::Uncovered), SpaceKind::Uncovered);
    }

    #[test]
    fn test_space_status_arg_conversion() {
        assert_eq!(
            SpaceStatus::from(SpaceStatusArg::Available),
            SpaceStatus::Available
        );
        assert_eq!(
            SpaceStatus::from(SpaceStatusArg::Reserved),
            SpaceStatus::Reserved
        );
        assert_eq!(
            SpaceStatus::from(SpaceStatusArg::Maintenance),
            SpaceStatus::Maintenance
        );
    }

    #[test]
    fn test_status_args_are_administrative() {
        for arg in [
            SpaceStatusArg::Available,
            SpaceStatusArg::Reserved,
            SpaceStatusArg::Maintenance,
        ] {
            assert!(SpaceStatus::from(arg).is_administrative());
        }
    }

    #[test]
    fn test_report_period_arg_conversion() {
        assert_eq!(ReportPeriod::from(ReportPeriodArg::Daily), ReportPeriod::Daily);
        assert_eq!(
            ReportPeriod::from(ReportPeriodArg::Weekly),
            ReportPeriod::Weekly
        );
        assert_eq!(
            ReportPeriod::from(ReportPeriodArg::Monthly),
            ReportPeriod::Monthly
        );
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Plain);
    }
}
