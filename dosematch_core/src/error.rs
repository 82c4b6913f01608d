//! Error types for the dosematch_core library.

use crate::CanonicalUnit;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dosematch_core operations
///
/// Parser abstention is deliberately absent here: it is an expected outcome
/// and is modelled by [`crate::ParseOutcome::Abstained`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A dosing or search input was not strictly positive
    #[error("Invalid input: {field} must be positive")]
    InvalidInput { field: &'static str },

    /// Computed quantity is above the dispensing safety ceiling
    #[error("Calculated quantity ({total}) exceeds safety limit of {limit} units")]
    LimitExceeded { total: f64, limit: u32 },

    /// Catalog contains no package in the requested unit
    #[error("No packages found matching unit: {unit}")]
    NoMatchingUnit { unit: CanonicalUnit },

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog validation error
    #[error("Catalog validation error: {0}")]
    CatalogValidation(String),

    /// Fallback parser failure
    #[error("Fallback parser error: {0}")]
    Fallback(String),
}
