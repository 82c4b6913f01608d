//! Pack recommendation engine.
//!
//! Searches a package catalog in three tiers:
//! 1. **Exact**: a single package equal to the target (returned immediately)
//! 2. **Multi-pack**: 2..=N packs of the same Active package, bounded overfill
//! 3. **Nearest**: the single package closest to the target (always computed)
//!
//! Tier 2 and 3 candidates are scored and ranked; the best becomes the
//! recommendation and the rest become alternatives.

use crate::{
    CanonicalUnit, Error, MatchType, PackComposition, PackageRecord, PackageStatus,
    Recommendation, RecommendationOption, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DEFAULT_MAX_PACKS_PER_GROUP: u32 = 3;
pub const DEFAULT_OVERFILL_CAP: f64 = 0.20;
pub const DEFAULT_MULTI_PACK_CANDIDATE_LIMIT: usize = 20;

/// Overfill below which no larger pack count is tried for a package
const NEAR_PERFECT_OVERFILL_PERCENT: f64 = 5.0;
/// Overfill above which an option gets an overfill badge
const OVERFILL_BADGE_PERCENT: f64 = 10.0;
const MAX_ALTERNATIVES: usize = 3;

/// Search bounds for the recommendation engine
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PackOptions {
    #[serde(default = "default_max_packs_per_group")]
    pub max_packs_per_group: u32,

    /// Maximum multi-pack overfill as a fraction of the target
    #[serde(default = "default_overfill_cap")]
    pub overfill_cap: f64,

    /// How many Active packages (in catalog order) the multi-pack tier examines
    #[serde(default = "default_multi_pack_candidate_limit")]
    pub multi_pack_candidate_limit: usize,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            max_packs_per_group: default_max_packs_per_group(),
            overfill_cap: default_overfill_cap(),
            multi_pack_candidate_limit: default_multi_pack_candidate_limit(),
        }
    }
}

fn default_max_packs_per_group() -> u32 {
    DEFAULT_MAX_PACKS_PER_GROUP
}

fn default_overfill_cap() -> f64 {
    DEFAULT_OVERFILL_CAP
}

fn default_multi_pack_candidate_limit() -> usize {
    DEFAULT_MULTI_PACK_CANDIDATE_LIMIT
}

/// Recommend how to dispense `target` units from `catalog`
///
/// Only records in `unit` are considered.
///
/// # Errors
/// - `InvalidInput` if `target` is not a positive finite number
/// - `NoMatchingUnit` if no catalog record uses `unit`
pub fn recommend(
    target: f64,
    unit: CanonicalUnit,
    catalog: &[PackageRecord],
    options: &PackOptions,
) -> Result<Recommendation> {
    if !target.is_finite() || target <= 0.0 {
        return Err(Error::InvalidInput { field: "target" });
    }

    tracing::debug!(
        "Pack selection: target {} {}, {} catalog records",
        target,
        unit,
        catalog.len()
    );

    let matching: Vec<&PackageRecord> = catalog.iter().filter(|p| p.unit == unit).collect();
    if matching.is_empty() {
        return Err(Error::NoMatchingUnit { unit });
    }

    if let Some(exact) = find_exact_match(target, &matching) {
        tracing::debug!("Exact match: {}", exact.primary_package_id);
        return Ok(Recommendation {
            recommended: exact,
            alternatives: Vec::new(),
        });
    }

    let multi_pack = find_multi_pack(target, &matching, options);
    let nearest = find_nearest_match(target, &matching).ok_or(Error::NoMatchingUnit { unit })?;

    let mut ranked: Vec<RecommendationOption> =
        multi_pack.into_iter().chain(std::iter::once(nearest)).collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut ranked = ranked.into_iter();
    let recommended = ranked.next().ok_or(Error::NoMatchingUnit { unit })?;
    let alternatives: Vec<_> = ranked.take(MAX_ALTERNATIVES).collect();

    tracing::info!(
        "Recommended {} ({:?}, score {:.1}) with {} alternative(s)",
        recommended.primary_package_id,
        recommended.match_type,
        recommended.score,
        alternatives.len()
    );

    Ok(Recommendation {
        recommended,
        alternatives,
    })
}

/// Score an option; higher is better
pub fn score(option: &RecommendationOption) -> f64 {
    let mut score = 0.0;

    if option.status == PackageStatus::Active {
        score += 1000.0;
    }

    match option.match_type {
        MatchType::Exact => score += 500.0,
        MatchType::MultiPack => score += 300.0,
        MatchType::Overfill | MatchType::Underfill => {}
    }

    score -= option.overfill_percent * 2.0;

    let compositions = option.packs_used.len() as f64;
    let distinct_ids: HashSet<&str> = option
        .packs_used
        .iter()
        .map(|p| p.package_id.as_str())
        .collect();

    if distinct_ids.len() == 1 && option.total_packs() > 1 {
        score += 100.0;
    } else {
        score -= compositions * 20.0;
    }

    score -= compositions * 5.0;

    if option.total_packs() == 1 {
        score += 50.0;
    }

    score
}

fn same_quantity(a: f64, b: f64) -> bool {
    (a - b).abs() <= f64::EPSILON * a.abs().max(b.abs()).max(1.0)
}

fn status_rank(status: PackageStatus) -> u8 {
    match status {
        PackageStatus::Active => 0,
        PackageStatus::Unknown => 1,
        PackageStatus::Inactive => 2,
    }
}

/// Build and score an option using `count` packs of `package`
fn build_option(
    package: &PackageRecord,
    count: u32,
    target: f64,
    match_type: MatchType,
) -> RecommendationOption {
    let total = package.package_size * f64::from(count);
    let (overfill, underfill) = match match_type {
        MatchType::Exact => (0.0, 0.0),
        _ => (
            ((total - target) / target * 100.0).max(0.0),
            ((target - total) / target * 100.0).max(0.0),
        ),
    };

    let mut badges = Vec::new();
    if match_type == MatchType::Exact {
        badges.push("Exact Match".to_string());
    }
    if match_type == MatchType::MultiPack {
        badges.push(if count > 1 {
            format!("{} Packs", count)
        } else {
            "Multi-Pack".to_string()
        });
    }
    if package.status == PackageStatus::Inactive {
        badges.push("Inactive".to_string());
    }
    if overfill > OVERFILL_BADGE_PERCENT {
        badges.push(format!("+{:.0}% Overfill", overfill));
    }
    if underfill > 0.0 {
        badges.push(format!("-{:.0}% Short", underfill));
    }

    let size = package.package_size;
    let unit = package.unit;
    let rationale = match match_type {
        MatchType::Exact if package.is_active() => {
            format!("Perfect match: 1 pack of {} {}", size, unit)
        }
        MatchType::Exact => "Exact quantity match, but package is not active".to_string(),
        MatchType::MultiPack => {
            format!("{}× packs of {} {} = {} {}", count, size, unit, total, unit)
        }
        MatchType::Overfill => format!(
            "Nearest available: {} {} ({:.1}% overfill)",
            size, unit, overfill
        ),
        MatchType::Underfill => format!(
            "Partial fill: {} {} ({:.1}% short)",
            size, unit, underfill
        ),
    };

    let option = RecommendationOption {
        primary_package_id: package.id.clone(),
        package_size: size,
        unit,
        status: package.status,
        packs_used: vec![PackComposition {
            package_id: package.id.clone(),
            count,
        }],
        match_type,
        overfill_percent: overfill,
        underfill_percent: underfill,
        total_dispensed: total,
        badges,
        rationale,
        score: 0.0,
    };

    RecommendationOption {
        score: score(&option),
        ..option
    }
}

/// Tier 1: a single package equal to the target, Active first
fn find_exact_match(target: f64, packages: &[&PackageRecord]) -> Option<RecommendationOption> {
    packages
        .iter()
        .filter(|p| same_quantity(p.package_size, target))
        .min_by_key(|p| status_rank(p.status))
        .map(|p| build_option(p, 1, target, MatchType::Exact))
}

/// Tier 2: best same-package multi-pack within the overfill cap
fn find_multi_pack(
    target: f64,
    packages: &[&PackageRecord],
    options: &PackOptions,
) -> Option<RecommendationOption> {
    let ceiling = target * (1.0 + options.overfill_cap);
    let mut candidates = Vec::new();

    for package in packages
        .iter()
        .filter(|p| p.is_active())
        .take(options.multi_pack_candidate_limit)
    {
        for count in 2..=options.max_packs_per_group {
            let total = package.package_size * f64::from(count);
            if total < target {
                continue;
            }
            if total > ceiling {
                break;
            }

            let option = build_option(package, count, target, MatchType::MultiPack);
            let near_perfect = option.overfill_percent < NEAR_PERFECT_OVERFILL_PERCENT;
            candidates.push(option);
            if near_perfect {
                break;
            }
        }
    }

    tracing::debug!("Multi-pack tier produced {} candidate(s)", candidates.len());

    candidates
        .into_iter()
        .reduce(|best, c| if c.score > best.score { c } else { best })
}

/// Whether `candidate` should replace `best` as the nearest package
fn prefer_nearest(candidate: &PackageRecord, best: &PackageRecord, target: f64) -> bool {
    match (candidate.status, best.status) {
        (PackageStatus::Active, PackageStatus::Inactive) => true,
        (PackageStatus::Inactive, PackageStatus::Active) => false,
        _ => {
            let candidate_diff = (candidate.package_size - target).abs();
            let best_diff = (best.package_size - target).abs();
            candidate_diff < best_diff
                || (candidate_diff == best_diff && candidate.is_active() && !best.is_active())
        }
    }
}

/// Tier 3: closest single package, classified as over- or underfill
fn find_nearest_match(target: f64, packages: &[&PackageRecord]) -> Option<RecommendationOption> {
    let best = packages.iter().copied().reduce(|best, candidate| {
        if prefer_nearest(candidate, best, target) {
            candidate
        } else {
            best
        }
    })?;

    let match_type = if best.package_size > target {
        MatchType::Overfill
    } else {
        MatchType::Underfill
    };

    Some(build_option(best, 1, target, match_type))
}
