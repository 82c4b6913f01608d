//! Core domain types for the DoseMatch system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Canonical units
//! - Parsed dosing instructions and parser outcomes
//! - Package records and recommendation options
//! - Advisory warnings

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Units
// ============================================================================

/// Common basis for quantity comparison
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CanonicalUnit {
    #[serde(rename = "EA")]
    Each,
    #[serde(rename = "mL")]
    Milliliter,
    #[serde(rename = "g")]
    Gram,
    #[serde(rename = "U")]
    Unit,
    #[serde(rename = "actuations")]
    Actuation,
}

impl CanonicalUnit {
    pub const ALL: [CanonicalUnit; 5] = [
        CanonicalUnit::Each,
        CanonicalUnit::Milliliter,
        CanonicalUnit::Gram,
        CanonicalUnit::Unit,
        CanonicalUnit::Actuation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalUnit::Each => "EA",
            CanonicalUnit::Milliliter => "mL",
            CanonicalUnit::Gram => "g",
            CanonicalUnit::Unit => "U",
            CanonicalUnit::Actuation => "actuations",
        }
    }
}

impl fmt::Display for CanonicalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Dosing Instruction Types
// ============================================================================

/// Which parser produced a dosing instruction
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParseOrigin {
    Rules,
    Fallback,
}

/// Unit of a therapy duration
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    Days,
    Weeks,
    Months,
}

/// Therapy duration stated in the instruction (e.g. "for 2 weeks")
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TherapyDuration {
    pub value: u32,
    pub unit: DurationUnit,
}

/// Product strength mentioned without an administration verb (e.g. "500mg")
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Strength {
    pub value: f64,
    pub unit: String,
}

/// Structured dosing parameters extracted from a SIG
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DosingInstruction {
    pub amount_per_dose: f64,
    pub amount_max: Option<f64>,
    pub unit: CanonicalUnit,
    pub frequency_per_day: u32,
    pub frequency_max: Option<u32>,
    pub days_supply: u32,
    pub route: Option<String>,
    pub duration: Option<TherapyDuration>,
    pub indication: Option<String>,
    pub is_as_needed: bool,
    pub max_daily_dose: f64,
    pub confidence: f64,
    pub origin: ParseOrigin,
    #[serde(default)]
    pub strength: Option<Strength>,
    #[serde(default)]
    pub rationale: Option<String>,
}

/// Why the rule parser declined to produce an instruction
#[derive(Clone, Debug, PartialEq)]
pub enum AbstainReason {
    /// No dose pattern matched
    NoDose,
    /// An instruction was extracted but scored below the acceptance threshold;
    /// it is kept so a caller can still use it when nothing better exists
    LowConfidence(Box<DosingInstruction>),
}

impl AbstainReason {
    /// Confidence of the rejected instruction, if one was extracted
    pub fn confidence(&self) -> Option<f64> {
        match self {
            AbstainReason::NoDose => None,
            AbstainReason::LowConfidence(rejected) => Some(rejected.confidence),
        }
    }
}

/// Result of running the rule parser
///
/// Abstention is a normal outcome telling the caller to use a fallback.
#[derive(Clone, Debug, PartialEq)]
pub enum ParseOutcome {
    Parsed(DosingInstruction),
    Abstained(AbstainReason),
}

impl ParseOutcome {
    pub fn into_parsed(self) -> Option<DosingInstruction> {
        match self {
            ParseOutcome::Parsed(d) => Some(d),
            ParseOutcome::Abstained(_) => None,
        }
    }

    pub fn is_abstained(&self) -> bool {
        matches!(self, ParseOutcome::Abstained(_))
    }
}

// ============================================================================
// Package and Recommendation Types
// ============================================================================

/// Marketing status of a package
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    Active,
    Inactive,
    Unknown,
}

impl PackageStatus {
    /// Lenient, case-insensitive status parsing; anything unrecognised is Unknown
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "active" => PackageStatus::Active,
            "inactive" => PackageStatus::Inactive,
            _ => PackageStatus::Unknown,
        }
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageStatus::Active => f.write_str("ACTIVE"),
            PackageStatus::Inactive => f.write_str("INACTIVE"),
            PackageStatus::Unknown => f.write_str("UNKNOWN"),
        }
    }
}

/// A dispensable package from an external drug catalog
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PackageRecord {
    pub id: String,
    pub package_size: f64,
    pub unit: CanonicalUnit,
    pub status: PackageStatus,
    #[serde(default)]
    pub labeler: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
}

impl PackageRecord {
    pub fn is_active(&self) -> bool {
        self.status == PackageStatus::Active
    }
}

/// One package identifier and how many of it are dispensed
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackComposition {
    pub package_id: String,
    pub count: u32,
}

/// How a recommendation option relates to the target quantity
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    MultiPack,
    Overfill,
    Underfill,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::Exact => f.write_str("exact"),
            MatchType::MultiPack => f.write_str("multi-pack"),
            MatchType::Overfill => f.write_str("overfill"),
            MatchType::Underfill => f.write_str("underfill"),
        }
    }
}

/// A scored way of dispensing the target quantity
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RecommendationOption {
    pub primary_package_id: String,
    pub package_size: f64,
    pub unit: CanonicalUnit,
    pub status: PackageStatus,
    pub packs_used: Vec<PackComposition>,
    pub match_type: MatchType,
    pub overfill_percent: f64,
    pub underfill_percent: f64,
    pub total_dispensed: f64,
    pub badges: Vec<String>,
    pub rationale: String,
    pub score: f64,
}

impl RecommendationOption {
    /// Total number of physical packs across all compositions
    pub fn total_packs(&self) -> u32 {
        self.packs_used.iter().map(|p| p.count).sum()
    }
}

/// Best option plus up to three ranked alternatives
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub recommended: RecommendationOption,
    pub alternatives: Vec<RecommendationOption>,
}

// ============================================================================
// Warning Types
// ============================================================================

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Info,
}

/// Human-readable advisory attached to a recommendation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Warning {
    pub code: String,
    pub message: String,
    pub severity: Severity,
}
