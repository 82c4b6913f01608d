#![forbid(unsafe_code)]

//! Core domain model and business logic for DoseMatch.
//!
//! This crate provides:
//! - Domain types (dosing instructions, packages, recommendations)
//! - Unit canonicalization
//! - Rule-based SIG parsing with a fallback cascade
//! - Quantity calculation
//! - Pack recommendation and advisory warnings
//! - Catalog loading and configuration

pub mod types;
pub mod error;
pub mod units;
pub mod sig;
pub mod resolve;
pub mod quantity;
pub mod pack;
pub mod warnings;
pub mod catalog;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use units::{normalize, to_canonical, units_match};
pub use sig::{parse, SigParser, MIN_CONFIDENCE};
pub use resolve::{default_assumption, resolve_dosing, FallbackParser};
pub use quantity::{compute_total_units, compute_total_units_or_zero, MAX_TOTAL_UNITS};
pub use pack::{recommend, score, PackOptions};
pub use warnings::{generate_warnings, sig_warnings};
pub use catalog::{load_catalog, load_valid_catalog, validate_catalog};
pub use config::Config;
