//! Rule-based SIG (prescription instruction) parser.
//!
//! Extraction is staged and short-circuiting:
//! - Dose: verb + range, verb + single amount, bare strength token
//! - Frequency: phrase/abbreviation table, "N times a day", "every A-B hours",
//!   "every N hours", else a low-confidence default of once daily
//! - Route, duration, indication and the as-needed flag, each independent
//!
//! Each stage is an ordered list of tagged extractors; the first one that
//! returns `Some` wins.

use crate::{
    units, AbstainReason, CanonicalUnit, DosingInstruction, DurationUnit, ParseOrigin,
    ParseOutcome, Strength, TherapyDuration,
};
use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum confidence for a rule-parsed instruction to be accepted
pub const MIN_CONFIDENCE: f64 = 0.70;

const BASE_CONFIDENCE: f64 = 0.70;
const MAX_CONFIDENCE: f64 = 0.95;
const AUXILIARY_BONUS: f64 = 0.05;

// ============================================================================
// Extractor plumbing
// ============================================================================

/// A named extraction rule
struct Extractor<T> {
    name: &'static str,
    run: fn(&str) -> Option<T>,
}

/// Evaluate extractors in priority order, returning the first hit
fn first_match<T>(extractors: &[Extractor<T>], sig: &str) -> Option<(&'static str, T)> {
    extractors
        .iter()
        .find_map(|e| (e.run)(sig).map(|found| (e.name, found)))
}

fn capture_f64(caps: &regex::Captures<'_>, idx: usize) -> Option<f64> {
    caps.get(idx)?.as_str().parse().ok()
}

fn capture_u32(caps: &regex::Captures<'_>, idx: usize) -> Option<u32> {
    caps.get(idx)?.as_str().parse().ok()
}

// ============================================================================
// Dose
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
struct DoseMatch {
    amount: f64,
    amount_max: Option<f64>,
    unit: CanonicalUnit,
    strength: Option<Strength>,
}

static DOSE_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:take|inject|inhale|apply|use|instill)\s+(\d+\.?\d*)\s*-\s*(\d+\.?\d*)\s*([a-z]+)",
    )
    .unwrap()
});

static SINGLE_DOSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:take|inject|inhale|apply|use|instill)\s+(\d+\.?\d*)\s*([a-z]+)").unwrap()
});

static STRENGTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+\.?\d*)\s*(mg|mcg|g|ml|u)(?:\s+(?:tablet|capsule|cap|tab|puff|dose|unit))?")
        .unwrap()
});

static DOSE_EXTRACTORS: &[Extractor<DoseMatch>] = &[
    Extractor {
        name: "dose_range",
        run: dose_range,
    },
    Extractor {
        name: "single_dose",
        run: single_dose,
    },
    Extractor {
        name: "strength_only",
        run: strength_only,
    },
];

/// "take 1-2 tablets"
fn dose_range(sig: &str) -> Option<DoseMatch> {
    let caps = DOSE_RANGE_RE.captures(sig)?;
    let a = capture_f64(&caps, 1)?;
    let b = capture_f64(&caps, 2)?;
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    if low <= 0.0 {
        return None;
    }

    Some(DoseMatch {
        amount: low,
        amount_max: Some(high),
        unit: units::normalize(caps.get(3)?.as_str()),
        strength: None,
    })
}

/// "take 2 tablets"
fn single_dose(sig: &str) -> Option<DoseMatch> {
    let caps = SINGLE_DOSE_RE.captures(sig)?;
    let amount = capture_f64(&caps, 1)?;
    if amount <= 0.0 {
        return None;
    }

    Some(DoseMatch {
        amount,
        amount_max: None,
        unit: units::normalize(caps.get(2)?.as_str()),
        strength: None,
    })
}

/// "500mg twice daily": one dose unit, the number is product strength
fn strength_only(sig: &str) -> Option<DoseMatch> {
    let caps = STRENGTH_RE.captures(sig)?;
    let value = capture_f64(&caps, 1)?;
    let raw_unit = caps.get(2)?.as_str();

    let unit = match raw_unit {
        "ml" => CanonicalUnit::Milliliter,
        "g" | "mg" | "mcg" => CanonicalUnit::Gram,
        "u" => CanonicalUnit::Unit,
        _ => CanonicalUnit::Each,
    };

    Some(DoseMatch {
        amount: 1.0,
        amount_max: None,
        unit,
        strength: Some(Strength {
            value,
            unit: raw_unit.to_string(),
        }),
    })
}

// ============================================================================
// Frequency
// ============================================================================

/// How strongly the matched frequency pattern supports the parse
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrequencySignal {
    /// Numeric "N times a day" or an hour range
    Explicit,
    /// Table phrase/abbreviation or "every N hours"
    Standard,
    /// Nothing matched; once daily assumed
    Assumed,
}

impl FrequencySignal {
    fn confidence_bonus(self) -> f64 {
        match self {
            FrequencySignal::Explicit => 0.15,
            FrequencySignal::Standard => 0.10,
            FrequencySignal::Assumed => 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct FrequencyMatch {
    per_day: u32,
    max: Option<u32>,
    signal: FrequencySignal,
}

enum PhraseMatcher {
    /// Short abbreviations ("bid", "q6h") need word boundaries
    WordBoundary(Regex),
    Contains,
}

struct FrequencyPhrase {
    key: &'static str,
    per_day: u32,
    matcher: PhraseMatcher,
}

impl FrequencyPhrase {
    fn matches(&self, sig: &str) -> bool {
        match &self.matcher {
            PhraseMatcher::WordBoundary(re) => re.is_match(sig),
            PhraseMatcher::Contains => sig.contains(self.key),
        }
    }
}

const FREQUENCY_PHRASES: &[(&str, u32)] = &[
    ("three times daily", 3),
    ("three times a day", 3),
    ("four times daily", 4),
    ("four times a day", 4),
    ("twice daily", 2),
    ("twice a day", 2),
    ("once daily", 1),
    ("once a day", 1),
    ("every 4 hours", 6),
    ("every 6 hours", 4),
    ("every 8 hours", 3),
    ("every 12 hours", 2),
    ("every 24 hours", 1),
    ("at bedtime", 1),
    ("at night", 1),
    ("in the morning", 1),
    ("each morning", 1),
    ("each bedtime", 1),
    ("qid", 4),
    ("tid", 3),
    ("tds", 3),
    ("bid", 2),
    ("qd", 1),
    ("od", 1),
    ("q4h", 6),
    ("q6h", 4),
    ("q8h", 3),
    ("q12h", 2),
    ("q24h", 1),
    ("qhs", 1),
    ("qam", 1),
];

/// Phrase table ordered longest key first so "twice daily" is never
/// shadowed by a shorter key
static FREQUENCY_TABLE: Lazy<Vec<FrequencyPhrase>> = Lazy::new(|| {
    let mut table: Vec<FrequencyPhrase> = FREQUENCY_PHRASES
        .iter()
        .map(|&(key, per_day)| FrequencyPhrase {
            key,
            per_day,
            matcher: if key.len() <= 3 {
                PhraseMatcher::WordBoundary(
                    Regex::new(&format!(r"\b{}\b", regex::escape(key))).unwrap(),
                )
            } else {
                PhraseMatcher::Contains
            },
        })
        .collect();
    table.sort_by(|a, b| b.key.len().cmp(&a.key.len()));
    table
});

static TIMES_PER_DAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)\s*times?\s*(?:a\s*day|daily|per\s*day)").unwrap()
});

static EVERY_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"every\s+(\d+)\s*-\s*(\d+)\s*(?:hours?|hrs?)").unwrap()
});

static EVERY_HOURS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"every\s+(\d+)\s*(?:hours?|hrs?|h)\b").unwrap());

static FREQUENCY_EXTRACTORS: &[Extractor<FrequencyMatch>] = &[
    Extractor {
        name: "phrase_table",
        run: frequency_phrase,
    },
    Extractor {
        name: "times_per_day",
        run: times_per_day,
    },
    Extractor {
        name: "every_hour_range",
        run: every_hour_range,
    },
    Extractor {
        name: "every_hours",
        run: every_hours,
    },
];

fn doses_per_day(interval_hours: u32) -> Option<u32> {
    if interval_hours == 0 {
        return None;
    }
    Some((24 / interval_hours).max(1))
}

fn frequency_phrase(sig: &str) -> Option<FrequencyMatch> {
    FREQUENCY_TABLE
        .iter()
        .find(|phrase| phrase.matches(sig))
        .map(|phrase| FrequencyMatch {
            per_day: phrase.per_day,
            max: None,
            signal: FrequencySignal::Standard,
        })
}

/// "3 times a day"
fn times_per_day(sig: &str) -> Option<FrequencyMatch> {
    let caps = TIMES_PER_DAY_RE.captures(sig)?;
    let per_day = capture_u32(&caps, 1)?;
    if per_day == 0 {
        return None;
    }

    Some(FrequencyMatch {
        per_day,
        max: None,
        signal: FrequencySignal::Explicit,
    })
}

/// "every 4-6 hours": the longer interval gives the minimum frequency
fn every_hour_range(sig: &str) -> Option<FrequencyMatch> {
    let caps = EVERY_RANGE_RE.captures(sig)?;
    let a = capture_u32(&caps, 1)?;
    let b = capture_u32(&caps, 2)?;
    let (shortest, longest) = (a.min(b), a.max(b));

    Some(FrequencyMatch {
        per_day: doses_per_day(longest)?,
        max: Some(doses_per_day(shortest)?),
        signal: FrequencySignal::Explicit,
    })
}

/// "every 8 hours"
fn every_hours(sig: &str) -> Option<FrequencyMatch> {
    let caps = EVERY_HOURS_RE.captures(sig)?;

    Some(FrequencyMatch {
        per_day: doses_per_day(capture_u32(&caps, 1)?)?,
        max: None,
        signal: FrequencySignal::Standard,
    })
}

// ============================================================================
// Route, duration, indication
// ============================================================================

static PREPOSITION_ROUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:by|via|in|into|through)\s+(mouth|po|topical|skin|eye|eyes|ear|ears|rectum|rectally|vaginally|sublingual|inhaled|inhalation|iv|intravenous|im|intramuscular|sc|subcutaneous)\b",
    )
    .unwrap()
});

static BARE_ROUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(po|iv|im|sc|inhaled|inhalation|topical|sublingual|rectal|rectally|vaginal|vaginally|oral|intravenous|intramuscular|subcutaneous|transdermal)\b",
    )
    .unwrap()
});

static FOR_DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bfor\s+(\d+)\s*(days?|weeks?|months?)\b").unwrap());

static TIMES_DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bx\s*(\d+)\s*(?:days?|d)\b").unwrap());

static INDICATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:for|prn)\s+([a-z\s]+?)(?:\.|,|as needed|$)").unwrap()
});

static ROUTE_EXTRACTORS: &[Extractor<String>] = &[
    Extractor {
        name: "prepositional_route",
        run: prepositional_route,
    },
    Extractor {
        name: "bare_route",
        run: bare_route,
    },
];

static DURATION_EXTRACTORS: &[Extractor<TherapyDuration>] = &[
    Extractor {
        name: "for_duration",
        run: for_duration,
    },
    Extractor {
        name: "times_duration",
        run: times_duration,
    },
];

fn prepositional_route(sig: &str) -> Option<String> {
    Some(PREPOSITION_ROUTE_RE.captures(sig)?.get(1)?.as_str().to_string())
}

fn bare_route(sig: &str) -> Option<String> {
    Some(BARE_ROUTE_RE.captures(sig)?.get(1)?.as_str().to_string())
}

/// "for 7 days", "for 2 weeks"
fn for_duration(sig: &str) -> Option<TherapyDuration> {
    let caps = FOR_DURATION_RE.captures(sig)?;
    let value = capture_u32(&caps, 1)?;
    let word = caps.get(2)?.as_str();

    let unit = if word.starts_with("week") {
        DurationUnit::Weeks
    } else if word.starts_with("month") {
        DurationUnit::Months
    } else {
        DurationUnit::Days
    };

    Some(TherapyDuration { value, unit })
}

/// "x7d", "x 10 days"
fn times_duration(sig: &str) -> Option<TherapyDuration> {
    let caps = TIMES_DURATION_RE.captures(sig)?;

    Some(TherapyDuration {
        value: capture_u32(&caps, 1)?,
        unit: DurationUnit::Days,
    })
}

fn is_as_needed(sig: &str) -> bool {
    sig.contains("prn") || sig.contains("as needed")
}

fn extract_indication(sig: &str) -> Option<String> {
    let text = INDICATION_RE.captures(sig)?.get(1)?.as_str().trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Highest daily exposure implied by the dose and frequency ranges
pub fn max_daily_dose(
    amount_per_dose: f64,
    amount_max: Option<f64>,
    frequency_per_day: u32,
    frequency_max: Option<u32>,
) -> f64 {
    amount_max.unwrap_or(amount_per_dose) * f64::from(frequency_max.unwrap_or(frequency_per_day))
}

/// Rule-based SIG parser with a configurable acceptance threshold
#[derive(Clone, Copy, Debug)]
pub struct SigParser {
    min_confidence: f64,
}

impl Default for SigParser {
    fn default() -> Self {
        Self {
            min_confidence: MIN_CONFIDENCE,
        }
    }
}

impl SigParser {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Parse a SIG into a dosing instruction, or abstain
    pub fn parse(&self, sig_text: &str, days_supply: u32) -> ParseOutcome {
        let sig = sig_text.trim().to_lowercase();
        tracing::debug!("Parsing SIG: {:?}", sig_text);

        let Some((dose_rule, dose)) = first_match(DOSE_EXTRACTORS, &sig) else {
            tracing::debug!("No dose pattern found, abstaining");
            return ParseOutcome::Abstained(AbstainReason::NoDose);
        };

        let (frequency_rule, frequency) =
            first_match(FREQUENCY_EXTRACTORS, &sig).unwrap_or((
                "assumed_once_daily",
                FrequencyMatch {
                    per_day: 1,
                    max: None,
                    signal: FrequencySignal::Assumed,
                },
            ));

        let route = first_match(ROUTE_EXTRACTORS, &sig).map(|(_, r)| r);
        let duration = first_match(DURATION_EXTRACTORS, &sig).map(|(_, d)| d);
        let indication = extract_indication(&sig);
        let as_needed = is_as_needed(&sig);

        let mut confidence = BASE_CONFIDENCE + frequency.signal.confidence_bonus();
        for present in [route.is_some(), duration.is_some(), indication.is_some()] {
            if present {
                confidence += AUXILIARY_BONUS;
            }
        }
        let confidence = confidence.min(MAX_CONFIDENCE);

        let max_daily = max_daily_dose(
            dose.amount,
            dose.amount_max,
            frequency.per_day,
            frequency.max,
        );

        tracing::debug!(
            "Matched dose via {} ({} {}), frequency via {} ({}x/day), PRN: {}, max daily: {}, confidence: {:.2}",
            dose_rule,
            dose.amount,
            dose.unit,
            frequency_rule,
            frequency.per_day,
            as_needed,
            max_daily,
            confidence
        );

        let dosing = DosingInstruction {
            amount_per_dose: dose.amount,
            amount_max: dose.amount_max,
            unit: dose.unit,
            frequency_per_day: frequency.per_day,
            frequency_max: frequency.max,
            days_supply,
            route,
            duration,
            indication,
            is_as_needed: as_needed,
            max_daily_dose: max_daily,
            confidence,
            origin: ParseOrigin::Rules,
            strength: dose.strength,
            rationale: None,
        };

        if confidence < self.min_confidence {
            tracing::info!(
                "SIG confidence {:.2} below threshold {:.2}, abstaining",
                confidence,
                self.min_confidence
            );
            return ParseOutcome::Abstained(AbstainReason::LowConfidence(Box::new(dosing)));
        }

        ParseOutcome::Parsed(dosing)
    }
}

/// Parse with the default acceptance threshold
pub fn parse(sig_text: &str, days_supply: u32) -> ParseOutcome {
    SigParser::default().parse(sig_text, days_supply)
}
