//! `semear` - Donation and beneficiary family management for a charity
//!
//! This library provides the record model, embedded document store, and
//! consistency rules behind the `semear` admin console: registering
//! beneficiary families, logging donations to them, browsing and filtering
//! records, and building aggregate reports.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
mod consistency;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod query;
pub mod report;
pub mod session;
pub mod subscription;

pub use config::Config;
pub use error::{Error, Result};
pub use ledger::{Ledger, LedgerStats};
pub use logging::init_logging;
pub use model::{
    Donation, DonationDraft, DonationType, Family, FamilyDraft, FamilyMember, FamilyPatch,
};
pub use report::Report;
pub use session::{AuthError, Authenticator, Session};
pub use subscription::Subscription;
