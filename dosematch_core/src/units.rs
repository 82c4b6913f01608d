//! Unit canonicalization.
//!
//! Free-form unit spellings from instructions and catalogs are mapped onto
//! the five [`CanonicalUnit`]s so quantities can be compared.

use crate::CanonicalUnit;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Alias table, built once and never mutated
static UNIT_ALIASES: Lazy<HashMap<&'static str, CanonicalUnit>> = Lazy::new(|| {
    use CanonicalUnit::*;

    let groups: [(CanonicalUnit, &[&'static str]); 5] = [
        (
            Each,
            &[
                "ea", "each", "tab", "tabs", "tablet", "tablets", "cap", "caps", "capsule",
                "capsules", "patch", "patches", "supp", "suppository", "suppositories",
            ],
        ),
        (Milliliter, &["ml", "milliliter", "milliliters", "cc"]),
        (Gram, &["g", "gram", "grams", "mg"]),
        (Unit, &["u", "unit", "units", "iu"]),
        (
            Actuation,
            &[
                "actuations", "actuation", "puff", "puffs", "inhalation", "inhalations",
            ],
        ),
    ];

    groups
        .iter()
        .flat_map(|(unit, aliases)| aliases.iter().map(move |alias| (*alias, *unit)))
        .collect()
});

/// Map a raw unit spelling to its canonical unit
///
/// Unrecognised spellings default to [`CanonicalUnit::Each`]; this never fails.
pub fn normalize(raw: &str) -> CanonicalUnit {
    let cleaned = raw.trim().to_lowercase();
    match UNIT_ALIASES.get(cleaned.as_str()) {
        Some(unit) => *unit,
        None => {
            tracing::trace!("Unrecognised unit {:?}, defaulting to EA", raw);
            CanonicalUnit::Each
        }
    }
}

/// Convert an amount expressed in `raw_unit` into its canonical unit
///
/// Milligrams are scaled to grams; every other alias keeps its amount.
pub fn to_canonical(amount: f64, raw_unit: &str) -> (f64, CanonicalUnit) {
    if raw_unit.trim().eq_ignore_ascii_case("mg") {
        return (amount / 1000.0, CanonicalUnit::Gram);
    }
    (amount, normalize(raw_unit))
}

/// Whether two unit spellings refer to the same canonical unit
pub fn units_match(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}
