//! Advisory warnings for pharmacy staff.

use crate::{
    DosingInstruction, MatchType, PackageRecord, PackageStatus, Recommendation, Severity, Warning,
};

/// Overfill above which a recommendation is flagged
const HIGH_OVERFILL_PERCENT: f64 = 20.0;

fn warning(code: &str, message: String, severity: Severity) -> Warning {
    Warning {
        code: code.to_string(),
        message,
        severity,
    }
}

/// Warnings describing a recommendation against the catalog it came from
pub fn generate_warnings(
    recommendation: &Recommendation,
    catalog: &[PackageRecord],
    target: f64,
) -> Vec<Warning> {
    let rec = &recommendation.recommended;
    let mut warnings = Vec::new();

    if rec.status == PackageStatus::Inactive {
        warnings.push(warning(
            "INACTIVE_PACKAGE_RECOMMENDED",
            format!(
                "Recommended package {} is marked INACTIVE. Verify product availability before dispensing.",
                rec.primary_package_id
            ),
            Severity::Warning,
        ));
    }

    let inactive_count = catalog
        .iter()
        .filter(|p| p.status == PackageStatus::Inactive)
        .count();
    if inactive_count > 0 && rec.status == PackageStatus::Active {
        warnings.push(warning(
            "INACTIVE_PACKAGES_PRESENT",
            format!(
                "{} inactive package(s) found in catalog. Showing active alternatives when available.",
                inactive_count
            ),
            Severity::Info,
        ));
    }

    if rec.match_type != MatchType::Exact {
        warnings.push(warning(
            "NO_EXACT_MATCH",
            format!(
                "No exact package size match found. Recommendation uses {} strategy.",
                rec.match_type
            ),
            Severity::Info,
        ));
    }

    if rec.overfill_percent > HIGH_OVERFILL_PERCENT {
        warnings.push(warning(
            "HIGH_OVERFILL",
            format!(
                "Recommended package results in {:.1}% overfill ({} units vs. {} target). Consider splitting prescription if appropriate.",
                rec.overfill_percent, rec.total_dispensed, target
            ),
            Severity::Warning,
        ));
    }

    if rec.underfill_percent > 0.0 {
        warnings.push(warning(
            "PARTIAL_FILL",
            format!(
                "Recommended package is {:.1}% short of target quantity ({} units vs. {} target). Patient may need refill sooner.",
                rec.underfill_percent, rec.total_dispensed, target
            ),
            Severity::Warning,
        ));
    }

    tracing::debug!("Generated {} recommendation warning(s)", warnings.len());
    warnings
}

/// Warnings about how trustworthy the dosing interpretation is
///
/// `min_confidence` should be the threshold the parser was run with.
pub fn sig_warnings(dosing: &DosingInstruction, min_confidence: f64) -> Vec<Warning> {
    let mut warnings = Vec::new();

    if dosing.confidence < min_confidence {
        warnings.push(warning(
            "LOW_CONFIDENCE_SIG",
            format!(
                "Instructions could not be interpreted confidently ({:.0}% confidence); using {} {} {} time(s) daily. Verify before dispensing.",
                dosing.confidence * 100.0,
                dosing.amount_per_dose,
                dosing.unit,
                dosing.frequency_per_day
            ),
            Severity::Warning,
        ));
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::{recommend, PackOptions};
    use crate::resolve::{default_assumption, resolve_dosing};
    use crate::sig::{parse, SigParser, MIN_CONFIDENCE};
    use crate::CanonicalUnit;

    fn pkg(id: &str, size: f64, status: PackageStatus) -> PackageRecord {
        PackageRecord {
            id: id.into(),
            package_size: size,
            unit: CanonicalUnit::Each,
            status,
            labeler: None,
            product_name: None,
        }
    }

    fn codes(warnings: &[Warning]) -> Vec<&str> {
        warnings.iter().map(|w| w.code.as_str()).collect()
    }

    fn warnings_for(target: f64, catalog: &[PackageRecord]) -> Vec<Warning> {
        let rec = recommend(target, CanonicalUnit::Each, catalog, &PackOptions::default()).unwrap();
        generate_warnings(&rec, catalog, target)
    }

    #[test]
    fn test_exact_active_match_has_no_warnings() {
        let catalog = vec![pkg("a", 30.0, PackageStatus::Active)];
        assert!(warnings_for(30.0, &catalog).is_empty());
    }

    #[test]
    fn test_inactive_recommendation() {
        let catalog = vec![pkg("old", 30.0, PackageStatus::Inactive)];
        let warnings = warnings_for(30.0, &catalog);
        assert_eq!(codes(&warnings), vec!["INACTIVE_PACKAGE_RECOMMENDED"]);
        assert_eq!(warnings[0].severity, Severity::Warning);
        assert!(warnings[0].message.contains("old"));
    }

    #[test]
    fn test_inactive_packages_present() {
        let catalog = vec![
            pkg("a", 30.0, PackageStatus::Active),
            pkg("old", 500.0, PackageStatus::Inactive),
        ];
        let warnings = warnings_for(30.0, &catalog);
        assert_eq!(codes(&warnings), vec!["INACTIVE_PACKAGES_PRESENT"]);
        assert_eq!(warnings[0].severity, Severity::Info);
    }

    #[test]
    fn test_high_overfill() {
        let catalog = vec![pkg("a", 100.0, PackageStatus::Active)];
        let warnings = warnings_for(45.0, &catalog);
        assert_eq!(codes(&warnings), vec!["NO_EXACT_MATCH", "HIGH_OVERFILL"]);
        assert!(warnings[0].message.contains("overfill strategy"));
    }

    #[test]
    fn test_partial_fill() {
        let catalog = vec![pkg("a", 90.0, PackageStatus::Active)];
        let warnings = warnings_for(95.0, &catalog);
        assert_eq!(codes(&warnings), vec!["NO_EXACT_MATCH", "PARTIAL_FILL"]);
        assert!(warnings[1].message.contains("5.3% short"));
    }

    #[test]
    fn test_sig_warnings() {
        let confident = parse("take 1 tablet twice daily", 30).into_parsed().unwrap();
        assert!(sig_warnings(&confident, MIN_CONFIDENCE).is_empty());

        let assumed = default_assumption(30);
        let warnings = sig_warnings(&assumed, MIN_CONFIDENCE);
        assert_eq!(codes(&warnings), vec!["LOW_CONFIDENCE_SIG"]);
        assert!(warnings[0].message.contains("10% confidence"));
    }

    #[test]
    fn test_sig_warnings_use_configured_threshold() {
        let strict = SigParser::new(0.85);
        let rescued = resolve_dosing(&strict, None, "take 2 tablets", 30);

        // Acceptable at the default threshold, flagged under the stricter one
        assert!(sig_warnings(&rescued, MIN_CONFIDENCE).is_empty());
        let warnings = sig_warnings(&rescued, strict.min_confidence());
        assert_eq!(codes(&warnings), vec!["LOW_CONFIDENCE_SIG"]);
        assert!(warnings[0].message.contains("using 2 EA 1 time(s) daily"));
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(serde_json::to_string(&Severity::Warning).unwrap(), r#""warning""#);
        assert_eq!(serde_json::to_string(&Severity::Info).unwrap(), r#""info""#);
        assert!(serde_json::from_str::<Severity>(r#""error""#).is_err());
    }
}
