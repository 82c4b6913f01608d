//! Quantity calculator.
//!
//! `total = ceil(amount_per_dose × frequency_per_day × days_supply)`, with
//! input validation and a safety ceiling.

use crate::{DosingInstruction, Error, Result};

/// Largest quantity the calculator will ever return
pub const MAX_TOTAL_UNITS: u32 = 1_000_000;

/// Compute the total number of canonical units to dispense
///
/// # Errors
/// - `InvalidInput` when the dose, frequency or days supply is not positive
/// - `LimitExceeded` when the result is above [`MAX_TOTAL_UNITS`]
pub fn compute_total_units(dosing: &DosingInstruction) -> Result<u32> {
    if dosing.amount_per_dose.is_nan() || dosing.amount_per_dose <= 0.0 {
        return Err(Error::InvalidInput {
            field: "amount_per_dose",
        });
    }
    if dosing.frequency_per_day == 0 {
        return Err(Error::InvalidInput {
            field: "frequency_per_day",
        });
    }
    if dosing.days_supply == 0 {
        return Err(Error::InvalidInput {
            field: "days_supply",
        });
    }

    let total = (dosing.amount_per_dose
        * f64::from(dosing.frequency_per_day)
        * f64::from(dosing.days_supply))
    .ceil();

    if total > f64::from(MAX_TOTAL_UNITS) {
        tracing::warn!(
            "Quantity {} exceeds safety limit (dose={}, freq={}, days={})",
            total,
            dosing.amount_per_dose,
            dosing.frequency_per_day,
            dosing.days_supply
        );
        return Err(Error::LimitExceeded {
            total,
            limit: MAX_TOTAL_UNITS,
        });
    }

    tracing::debug!("Computed target quantity: {} {}", total, dosing.unit);
    Ok(total as u32)
}

/// Like [`compute_total_units`], but returns 0 instead of an error
pub fn compute_total_units_or_zero(dosing: &DosingInstruction) -> u32 {
    compute_total_units(dosing).unwrap_or_else(|e| {
        tracing::debug!("Quantity calculation failed, using 0: {}", e);
        0
    })
}
