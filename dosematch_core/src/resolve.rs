//! Rules → fallback cascade for SIG interpretation.
//!
//! The rule parser is tried first. When it abstains, an optional
//! [`FallbackParser`] (typically a language-model service living outside
//! this crate) is consulted. If that is missing or fails, a low-confidence
//! rule parse is used as-is; only when no dose was found at all is a
//! conservative default assumption returned. Callers always get an
//! instruction.

use crate::sig::{self, SigParser};
use crate::{AbstainReason, CanonicalUnit, DosingInstruction, ParseOrigin, ParseOutcome, Result};

/// Confidence attached to the default assumption
pub const DEFAULT_ASSUMPTION_CONFIDENCE: f64 = 0.10;

/// Secondary parser consulted when the rule parser abstains
pub trait FallbackParser {
    fn parse_sig(&self, sig_text: &str, days_supply: u32) -> Result<DosingInstruction>;
}

/// Produce a dosing instruction for `sig_text`, never failing
pub fn resolve_dosing(
    parser: &SigParser,
    fallback: Option<&dyn FallbackParser>,
    sig_text: &str,
    days_supply: u32,
) -> DosingInstruction {
    let reason = match parser.parse(sig_text, days_supply) {
        ParseOutcome::Parsed(dosing) => {
            tracing::debug!("Using rule parser result");
            return dosing;
        }
        ParseOutcome::Abstained(reason) => reason,
    };

    match reason.confidence() {
        Some(confidence) => tracing::info!(
            "Rule parser confidence {:.2} too low, trying fallback",
            confidence
        ),
        None => tracing::info!("Rule parser found no dose, trying fallback"),
    }

    match fallback.map(|f| f.parse_sig(sig_text, days_supply)) {
        Some(Ok(dosing)) => adopt_fallback(dosing, days_supply),
        Some(Err(e)) => {
            tracing::warn!("Fallback parser failed: {}", e);
            last_resort(reason, days_supply)
        }
        None => {
            tracing::warn!("No fallback parser available");
            last_resort(reason, days_supply)
        }
    }
}

/// The rejected rule parse if there is one, else the default assumption
fn last_resort(reason: AbstainReason, days_supply: u32) -> DosingInstruction {
    match reason {
        AbstainReason::LowConfidence(rejected) => {
            tracing::info!("Falling back to low-confidence rule result");
            *rejected
        }
        AbstainReason::NoDose => {
            tracing::warn!("All parsing failed, using default assumption");
            default_assumption(days_supply)
        }
    }
}

/// Tag a fallback result and re-establish the invariants the rule parser guarantees
fn adopt_fallback(dosing: DosingInstruction, days_supply: u32) -> DosingInstruction {
    let max_daily_dose = sig::max_daily_dose(
        dosing.amount_per_dose,
        dosing.amount_max,
        dosing.frequency_per_day,
        dosing.frequency_max,
    );

    DosingInstruction {
        days_supply,
        max_daily_dose,
        confidence: dosing.confidence.clamp(0.0, 1.0),
        origin: ParseOrigin::Fallback,
        ..dosing
    }
}

/// One unit once daily, flagged with very low confidence
pub fn default_assumption(days_supply: u32) -> DosingInstruction {
    DosingInstruction {
        amount_per_dose: 1.0,
        amount_max: None,
        unit: CanonicalUnit::Each,
        frequency_per_day: 1,
        frequency_max: None,
        days_supply,
        route: None,
        duration: None,
        indication: None,
        is_as_needed: false,
        max_daily_dose: 1.0,
        confidence: DEFAULT_ASSUMPTION_CONFIDENCE,
        origin: ParseOrigin::Fallback,
        strength: None,
        rationale: Some("Default fallback: no parsing succeeded".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::cell::Cell;

    struct StubFallback {
        calls: Cell<u32>,
        result: fn(u32) -> Result<DosingInstruction>,
    }

    impl FallbackParser for StubFallback {
        fn parse_sig(&self, _sig_text: &str, days_supply: u32) -> Result<DosingInstruction> {
            self.calls.set(self.calls.get() + 1);
            (self.result)(days_supply)
        }
    }

    fn model_answer(_days: u32) -> Result<DosingInstruction> {
        Ok(DosingInstruction {
            amount_per_dose: 2.0,
            amount_max: Some(3.0),
            unit: CanonicalUnit::Milliliter,
            frequency_per_day: 2,
            frequency_max: None,
            // Deliberately inconsistent; the cascade must fix these up
            days_supply: 999,
            max_daily_dose: 0.0,
            route: None,
            duration: None,
            indication: None,
            is_as_needed: false,
            confidence: 0.8,
            origin: ParseOrigin::Rules,
            strength: None,
            rationale: Some("two to three mL twice a day".into()),
        })
    }

    fn model_failure(_days: u32) -> Result<DosingInstruction> {
        Err(Error::Fallback("service unavailable".into()))
    }

    #[test]
    fn test_rules_result_skips_fallback() {
        let stub = StubFallback {
            calls: Cell::new(0),
            result: model_answer,
        };
        let d = resolve_dosing(&SigParser::default(), Some(&stub), "take 1 tablet bid", 30);

        assert_eq!(d.origin, ParseOrigin::Rules);
        assert_eq!(d.frequency_per_day, 2);
        assert_eq!(stub.calls.get(), 0);
    }

    #[test]
    fn test_abstention_uses_fallback() {
        let stub = StubFallback {
            calls: Cell::new(0),
            result: model_answer,
        };
        let d = resolve_dosing(&SigParser::default(), Some(&stub), "two to three mL bid", 14);

        assert_eq!(stub.calls.get(), 1);
        assert_eq!(d.origin, ParseOrigin::Fallback);
        assert_eq!(d.days_supply, 14);
        assert_eq!(d.amount_per_dose, 2.0);
        assert_eq!(d.max_daily_dose, 6.0);
        assert_eq!(d.unit, CanonicalUnit::Milliliter);
    }

    #[test]
    fn test_fallback_failure_yields_default_assumption() {
        let stub = StubFallback {
            calls: Cell::new(0),
            result: model_failure,
        };
        let d = resolve_dosing(&SigParser::default(), Some(&stub), "as directed", 30);

        assert_eq!(stub.calls.get(), 1);
        assert_eq!(d, default_assumption(30));
        assert_eq!(d.confidence, DEFAULT_ASSUMPTION_CONFIDENCE);
    }

    #[test]
    fn test_missing_fallback_yields_default_assumption() {
        let d = resolve_dosing(&SigParser::default(), None, "as directed", 7);
        assert_eq!(d.origin, ParseOrigin::Fallback);
        assert_eq!(d.amount_per_dose, 1.0);
        assert_eq!(d.frequency_per_day, 1);
        assert_eq!(d.days_supply, 7);
    }

    #[test]
    fn test_low_confidence_abstention_reaches_fallback() {
        let stub = StubFallback {
            calls: Cell::new(0),
            result: model_answer,
        };
        let strict = SigParser::new(0.9);
        let d = resolve_dosing(&strict, Some(&stub), "take 2 tablets", 30);

        assert_eq!(stub.calls.get(), 1);
        assert_eq!(d.origin, ParseOrigin::Fallback);
    }

    #[test]
    fn test_low_confidence_rules_result_kept_without_fallback() {
        let strict = SigParser::new(0.85);
        let d = resolve_dosing(&strict, None, "take 2 tablets", 30);

        assert_eq!(d.origin, ParseOrigin::Rules);
        assert_eq!(d.amount_per_dose, 2.0);
        assert_eq!(d.frequency_per_day, 1);
        assert_eq!(d.days_supply, 30);
        assert!((d.confidence - 0.70).abs() < 1e-9);
        assert_eq!(d.rationale, None);
    }

    #[test]
    fn test_low_confidence_rules_result_kept_when_fallback_fails() {
        let stub = StubFallback {
            calls: Cell::new(0),
            result: model_failure,
        };
        let strict = SigParser::new(0.85);
        let d = resolve_dosing(&strict, Some(&stub), "take 2 tablets", 14);

        assert_eq!(stub.calls.get(), 1);
        assert_eq!(d.origin, ParseOrigin::Rules);
        assert_eq!(d.amount_per_dose, 2.0);
        assert_eq!(d.days_supply, 14);
        assert_ne!(d, default_assumption(14));
    }
}
