//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::model::DonationType;

/// Family record commands.
#[derive(Debug, Subcommand)]
pub enum FamilyCommand {
    /// Register a new family
    Add(FamilyAddArgs),

    /// List families, newest registration first
    List(FamilyListArgs),

    /// Show one family in full
    Show {
        /// The family id
        id: i64,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Edit fields of an existing family
    Edit(FamilyEditArgs),

    /// Delete a family record (donation history is kept)
    Remove {
        /// The family id
        id: i64,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for registering a family.
#[derive(Debug, Args)]
pub struct FamilyAddArgs {
    /// Name of the person responsible for the household
    #[arg(long)]
    pub responsible: String,

    /// Contact phone
    #[arg(long)]
    pub phone: String,

    /// Contact e-mail
    #[arg(long)]
    pub email: Option<String>,

    /// Postal code (CEP)
    #[arg(long)]
    pub cep: String,

    /// Street address
    #[arg(long)]
    pub address: String,

    /// Neighborhood
    #[arg(long)]
    pub neighborhood: String,

    /// City
    #[arg(long)]
    pub city: String,

    /// State
    #[arg(long)]
    pub state: String,

    /// House number
    #[arg(long)]
    pub number: Option<String>,

    /// Address complement (apartment, block)
    #[arg(long)]
    pub complemento: Option<String>,

    /// Free-text notes
    #[arg(long)]
    pub observations: Option<String>,

    /// Member ages, comma separated (e.g. 34,12,8)
    #[arg(long, value_delimiter = ',')]
    pub ages: Vec<u32>,
}

/// Arguments for listing families.
#[derive(Debug, Args)]
pub struct FamilyListArgs {
    /// Free-text filter on responsible name or neighborhood
    #[arg(short, long)]
    pub term: Option<String>,

    /// Only families in this neighborhood
    #[arg(long)]
    pub neighborhood: Option<String>,

    /// Filter by donation recency
    #[arg(short, long, value_enum)]
    pub filter: Option<DonationFilterArg>,

    /// Maximum number of rows (defaults to the configured list limit)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for editing a family.
///
/// Only the flags that are passed are written; everything else is left
/// untouched. Passing `--ages` replaces the whole member list.
#[derive(Debug, Args)]
pub struct FamilyEditArgs {
    /// The family id
    pub id: i64,

    /// New responsible name
    #[arg(long)]
    pub responsible: Option<String>,

    /// New contact phone
    #[arg(long)]
    pub phone: Option<String>,

    /// New contact e-mail
    #[arg(long)]
    pub email: Option<String>,

    /// New postal code (CEP)
    #[arg(long)]
    pub cep: Option<String>,

    /// New street address
    #[arg(long)]
    pub address: Option<String>,

    /// New neighborhood
    #[arg(long)]
    pub neighborhood: Option<String>,

    /// New city
    #[arg(long)]
    pub city: Option<String>,

    /// New state
    #[arg(long)]
    pub state: Option<String>,

    /// New house number
    #[arg(long)]
    pub number: Option<String>,

    /// New address complement
    #[arg(long)]
    pub complemento: Option<String>,

    /// New free-text notes
    #[arg(long)]
    pub observations: Option<String>,

    /// Replacement member ages, comma separated
    #[arg(long, value_delimiter = ',')]
    pub ages: Option<Vec<u32>>,
}

/// Donation record commands.
#[derive(Debug, Subcommand)]
pub enum DonationCommand {
    /// Register a donation for a family
    Add(DonationAddArgs),

    /// List donations, most recent date first
    List(DonationListArgs),

    /// Delete a donation record
    Remove {
        /// The donation id
        id: i64,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for registering a donation.
#[derive(Debug, Args)]
pub struct DonationAddArgs {
    /// Id of the receiving family
    #[arg(long)]
    pub family: i64,

    /// Category of the donated goods
    #[arg(long = "type", value_enum)]
    pub donation_type: DonationTypeArg,

    /// Quantity or description (e.g. "5kg", "one basket")
    #[arg(long)]
    pub quantity: String,

    /// Effective date, YYYY-MM-DD or RFC 3339 (defaults to now)
    #[arg(long)]
    pub date: Option<String>,

    /// Name of the person delivering it
    #[arg(long)]
    pub responsible: String,

    /// Free-text notes
    #[arg(long)]
    pub observations: Option<String>,
}

/// Arguments for listing donations.
#[derive(Debug, Args)]
pub struct DonationListArgs {
    /// Maximum number of rows (defaults to the configured list limit)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the per-family donation history.
#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// The family id
    pub family: i64,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the free-text family search.
#[derive(Debug, Args)]
pub struct SearchCommand {
    /// The search term (matches responsible name or neighborhood)
    pub term: String,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the aggregate report.
#[derive(Debug, Args)]
pub struct ReportCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Arguments for following a collection live.
#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Which collection to follow
    #[arg(value_enum)]
    pub target: WatchTarget,
}

/// Arguments for the status command.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
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

/// Donation category argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DonationTypeArg {
    /// Non-perishable food
    NonPerishableFood,
    /// Perishable food
    PerishableFood,
    /// Clothing
    Clothing,
    /// Shoes
    Shoes,
    /// Hygiene products
    Hygiene,
    /// Cleaning products
    Cleaning,
    /// Medicine
    Medicine,
    /// Furniture
    Furniture,
    /// Appliances
    Appliances,
    /// School supplies
    SchoolSupplies,
    /// Toys
    Toys,
    /// Other
    Other,
}

impl From<DonationTypeArg> for DonationType {
    fn from(arg: DonationTypeArg) -> Self {
        match arg {
            DonationTypeArg::NonPerishableFood => Self::NonPerishableFood,
            DonationTypeArg::PerishableFood => Self::PerishableFood,
            DonationTypeArg::Clothing => Self::Clothing,
            DonationTypeArg::Shoes => Self::Shoes,
            DonationTypeArg::Hygiene => Self::Hygiene,
            DonationTypeArg::Cleaning => Self::Cleaning,
            DonationTypeArg::Medicine => Self::Medicine,
            DonationTypeArg::Furniture => Self::Furniture,
            DonationTypeArg::Appliances => Self::Appliances,
            DonationTypeArg::SchoolSupplies => Self::SchoolSupplies,
            DonationTypeArg::Toys => Self::Toys,
            DonationTypeArg::Other => Self::Other,
        }
    }
}

/// Donation recency filter for family listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DonationFilterArg {
    /// Donation within the recent window
    Recent,
    /// No donation within the recent window (but at least one ever)
    Stale,
    /// Never received a donation
    Never,
}

/// Collection to follow with the watch command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WatchTarget {
    /// The families collection
    Families,
    /// The donations collection
    Donations,
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Formatted table
    #[default]
    Table,
    /// JSON output
    Json,
}
