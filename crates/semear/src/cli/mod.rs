//! Command-line interface for semear.
//!
//! This module provides the CLI structure for the `semear` binary: the
//! admin console over the family and donation collections.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, DonationAddArgs, DonationCommand, DonationFilterArg, DonationListArgs,
    DonationTypeArg, FamilyAddArgs, FamilyCommand, FamilyEditArgs, FamilyListArgs, HistoryCommand,
    OutputFormat, ReportCommand, SearchCommand, StatusCommand, WatchCommand, WatchTarget,
};

/// semear - donation management console
///
/// Register beneficiary families, log donations delivered to them, browse
/// and filter the records, and view aggregate reports.
#[derive(Debug, Parser)]
#[command(name = "semear")]
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

    /// Account identifier, required when an admin credential is configured
    #[arg(long, global = true, value_name = "EMAIL")]
    pub identifier: Option<String>,

    /// Account secret, required when an admin credential is configured
    #[arg(long, global = true, value_name = "SECRET")]
    pub secret: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage family records
    #[command(subcommand)]
    Family(FamilyCommand),

    /// Manage donation records
    #[command(subcommand)]
    Donation(DonationCommand),

    /// Show the donation history of one family
    History(HistoryCommand),

    /// Search families by name or neighborhood
    Search(SearchCommand),

    /// Show aggregate statistics
    Report(ReportCommand),

    /// Follow a collection live, printing each full snapshot
    Watch(WatchCommand),

    /// Show store status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
