//! Package catalog loading and validation.
//!
//! Catalogs are exported by the drug registry adapters as either JSON (an
//! array of records) or CSV with the columns
//! `id,package_size,unit,status,labeler,product_name`. Unit and status
//! columns are free-form and normalised on load.

use crate::{units, Error, PackageRecord, PackageStatus, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

/// A catalog row as exported, before normalisation
#[derive(Clone, Debug, Deserialize)]
struct CatalogRow {
    id: String,
    package_size: f64,
    unit: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    labeler: Option<String>,
    #[serde(default)]
    product_name: Option<String>,
}

impl From<CatalogRow> for PackageRecord {
    fn from(row: CatalogRow) -> Self {
        PackageRecord {
            id: row.id.trim().to_string(),
            package_size: row.package_size,
            unit: units::normalize(&row.unit),
            status: row
                .status
                .as_deref()
                .map(PackageStatus::parse)
                .unwrap_or(PackageStatus::Unknown),
            labeler: row.labeler.filter(|s| !s.trim().is_empty()),
            product_name: row.product_name.filter(|s| !s.trim().is_empty()),
        }
    }
}

/// Load a catalog file, picking the format from its extension
///
/// `.csv` is read as CSV; anything else is read as JSON.
pub fn load_catalog(path: &Path) -> Result<Vec<PackageRecord>> {
    let file = std::fs::File::open(path)?;
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    let records = if is_csv {
        read_csv(file)?
    } else {
        read_json(file)?
    };

    tracing::info!("Loaded {} package record(s) from {:?}", records.len(), path);
    Ok(records)
}

/// Parse a JSON array of catalog rows
pub fn read_json<R: Read>(reader: R) -> Result<Vec<PackageRecord>> {
    let rows: Vec<CatalogRow> = serde_json::from_reader(reader)?;
    Ok(rows.into_iter().map(PackageRecord::from).collect())
}

/// Parse CSV catalog rows with a header line
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<PackageRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for row in csv_reader.deserialize::<CatalogRow>() {
        records.push(PackageRecord::from(row?));
    }
    Ok(records)
}

/// Validate a catalog for consistency
///
/// Returns a list of validation errors, or empty Vec if valid.
pub fn validate_catalog(records: &[PackageRecord]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (idx, record) in records.iter().enumerate() {
        if record.id.is_empty() {
            errors.push(format!("Record {} has empty ID", idx));
        } else if !seen.insert(record.id.as_str()) {
            errors.push(format!("Duplicate package ID '{}'", record.id));
        }

        if !record.package_size.is_finite() || record.package_size <= 0.0 {
            errors.push(format!(
                "Package '{}' has non-positive size {}",
                record.id, record.package_size
            ));
        }
    }

    errors
}

/// Load and validate, failing on the first invalid catalog
pub fn load_valid_catalog(path: &Path) -> Result<Vec<PackageRecord>> {
    let records = load_catalog(path)?;
    let errors = validate_catalog(&records);
    if !errors.is_empty() {
        for error in &errors {
            tracing::warn!("Catalog {:?}: {}", path, error);
        }
        return Err(Error::CatalogValidation(errors.join("; ")));
    }
    Ok(records)
}
