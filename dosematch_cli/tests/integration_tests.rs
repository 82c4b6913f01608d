//! Integration tests for the dosematch binary.
//!
//! These tests verify end-to-end behavior including:
//! - SIG parsing and quantity output
//! - Package recommendation against JSON and CSV catalogs
//! - Configuration overrides and error exits

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const CSV_CATALOG: &str = "\
id,package_size,unit,status,labeler,product_name
00071015520,30,tablet,ACTIVE,Pfizer,Lisinopril 10mg
00071015521,60,tablet,ACTIVE,Pfizer,Lisinopril 10mg
00071015522,90,tablet,ACTIVE,Pfizer,Lisinopril 10mg
00071015524,500,tablet,INACTIVE,Pfizer,Lisinopril 10mg
";

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Helper to get the path to the CLI binary, isolated from any user config
fn cli() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("dosematch"));
    cmd.env("XDG_CONFIG_HOME", "/nonexistent/dosematch-test-config")
        .env_remove("RUST_LOG");
    cmd
}

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("Failed to write file");
    path
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().expect("Failed to run CLI");
    assert!(output.status.success(), "CLI failed: {:?}", output);
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

#[test]
fn test_cli_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Prescription quantity and package matching",
        ));
}

#[test]
fn test_parse_text_output() {
    cli()
        .args(["parse", "Take 1 tablet by mouth twice daily", "--days", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dose: 1 EA"))
        .stdout(predicate::str::contains("Frequency: 2x daily"))
        .stdout(predicate::str::contains("Route: mouth"));
}

#[test]
fn test_parse_json_output() {
    let json = stdout_json(cli().args([
        "parse",
        "take 1-2 tablets every 4-6 hours as needed for pain",
        "--days",
        "10",
        "--json",
    ]));

    let parsed = &json["parsed"];
    assert_eq!(parsed["amount_per_dose"], 1.0);
    assert_eq!(parsed["amount_max"], 2.0);
    assert_eq!(parsed["frequency_per_day"], 4);
    assert_eq!(parsed["frequency_max"], 6);
    assert_eq!(parsed["max_daily_dose"], 12.0);
    assert_eq!(parsed["unit"], "EA");
    assert_eq!(parsed["is_as_needed"], true);
    assert_eq!(parsed["indication"], "pain");
    assert_eq!(parsed["origin"], "rules");
    assert!(json["abstained"].is_null());
}

#[test]
fn test_parse_abstains_without_dose() {
    cli()
        .args(["parse", "apply as directed", "--days", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No confident parse: no dose found"));
}

#[test]
fn test_quantity() {
    cli()
        .args(["quantity", "take 1 tablet twice daily", "--days", "30"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("60 EA"))
        .stdout(predicate::str::contains("LOW_CONFIDENCE_SIG").not());
}

#[test]
fn test_quantity_rounds_up_liquid_doses() {
    cli()
        .args(["quantity", "take 2.5 mL twice daily", "--days", "7"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("35 mL"));
}

#[test]
fn test_quantity_uses_default_assumption_when_unparseable() {
    cli()
        .args(["quantity", "use as directed", "--days", "30"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("30 EA"))
        .stdout(predicate::str::contains("LOW_CONFIDENCE_SIG"));
}

#[test]
fn test_quantity_rejects_zero_days() {
    cli()
        .args(["quantity", "take 1 tablet daily", "--days", "0"])
        .assert()
        .failure();
}

#[test]
fn test_recommend_exact_from_csv() {
    let dir = setup_test_dir();
    let catalog = write_file(&dir, "catalog.csv", CSV_CATALOG);

    cli()
        .args(["recommend", "--target", "60", "--unit", "tablets", "--catalog"])
        .arg(&catalog)
        .assert()
        .success()
        .stdout(predicate::str::contains("exact [ACTIVE] 1 x 00071015521"))
        .stdout(predicate::str::contains("INACTIVE_PACKAGES_PRESENT"));
}

#[test]
fn test_recommend_multi_pack_json() {
    let dir = setup_test_dir();
    let catalog = write_file(
        &dir,
        "catalog.json",
        r#"[
            {"id": "25ct", "package_size": 25, "unit": "capsules", "status": "ACTIVE"},
            {"id": "60ct", "package_size": 60, "unit": "capsules", "status": "ACTIVE"},
            {"id": "90ct", "package_size": 90, "unit": "capsules", "status": "ACTIVE"}
        ]"#,
    );

    let json = stdout_json(
        cli()
            .args(["recommend", "--target", "45", "--catalog"])
            .arg(&catalog)
            .arg("--json"),
    );

    let recommended = &json["recommendation"]["recommended"];
    assert_eq!(recommended["match_type"], "multi_pack");
    assert_eq!(recommended["total_dispensed"], 50.0);
    assert_eq!(recommended["packs_used"][0]["package_id"], "25ct");
    assert_eq!(recommended["packs_used"][0]["count"], 2);

    let codes: Vec<&str> = json["warnings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec!["NO_EXACT_MATCH"]);
}

#[test]
fn test_recommend_unit_mismatch_fails() {
    let dir = setup_test_dir();
    let catalog = write_file(&dir, "catalog.csv", CSV_CATALOG);

    cli()
        .args(["recommend", "--target", "100", "--unit", "mL", "--catalog"])
        .arg(&catalog)
        .assert()
        .failure()
        .stderr(predicate::str::contains("NoMatchingUnit"));
}

#[test]
fn test_recommend_missing_catalog_fails() {
    let dir = setup_test_dir();

    cli()
        .args(["recommend", "--target", "30", "--catalog"])
        .arg(dir.path().join("missing.json"))
        .assert()
        .failure();
}

#[test]
fn test_recommend_invalid_catalog_fails() {
    let dir = setup_test_dir();
    let catalog = write_file(
        &dir,
        "catalog.csv",
        "id,package_size,unit,status\ndup,30,tab,active\ndup,60,tab,active\n",
    );

    cli()
        .args(["recommend", "--target", "30", "--catalog"])
        .arg(&catalog)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Duplicate package ID"));
}

#[test]
fn test_run_pipeline_json() {
    let dir = setup_test_dir();
    let catalog = write_file(&dir, "catalog.csv", CSV_CATALOG);

    let json = stdout_json(
        cli()
            .args(["run", "take 1 tablet twice daily", "--days", "30", "--catalog"])
            .arg(&catalog)
            .arg("--json"),
    );

    assert!(json["generated_at"].is_string());
    assert!(json["elapsed_ms"].is_u64());
    assert_eq!(json["target_quantity"], 60);
    assert_eq!(json["dosing"]["frequency_per_day"], 2);
    assert_eq!(
        json["recommendation"]["recommended"]["primary_package_id"],
        "00071015521"
    );
    assert_eq!(json["recommendation"]["recommended"]["match_type"], "exact");
}

#[test]
fn test_run_pipeline_text() {
    let dir = setup_test_dir();
    let catalog = write_file(&dir, "catalog.csv", CSV_CATALOG);

    cli()
        .args(["run", "take 1 tablet daily", "--days", "95", "--catalog"])
        .arg(&catalog)
        .assert()
        .success()
        .stdout(predicate::str::contains("Target quantity: 95 EA"))
        .stdout(predicate::str::contains("PARTIAL_FILL"));
}

#[test]
fn test_config_prints_defaults() {
    cli()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[sig]"))
        .stdout(predicate::str::contains("min_confidence = 0.7"))
        .stdout(predicate::str::contains("[packs]"))
        .stdout(predicate::str::contains("max_packs_per_group = 3"));
}

#[test]
fn test_config_file_raises_threshold() {
    let dir = setup_test_dir();
    let config = write_file(&dir, "config.toml", "[sig]\nmin_confidence = 0.9\n");

    // Dose only, no frequency: accepted at the default threshold
    cli()
        .args(["parse", "take 2 tablets", "--days", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dose: 2 EA"));

    cli()
        .arg("--config")
        .arg(&config)
        .args(["parse", "take 2 tablets", "--days", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No confident parse: confidence"));
}

#[test]
fn test_invalid_config_file_fails() {
    let dir = setup_test_dir();
    let config = write_file(&dir, "config.toml", "[packs]\nmax_packs_per_group = 1\n");

    cli()
        .arg("--config")
        .arg(&config)
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_packs_per_group"));
}

#[test]
fn test_quantity_keeps_low_confidence_parse_under_strict_config() {
    let dir = setup_test_dir();
    let config = write_file(&dir, "config.toml", "[sig]\nmin_confidence = 0.9\n");

    // Rejected by the parser, but still better than the 1 EA daily default
    cli()
        .arg("--config")
        .arg(&config)
        .args(["quantity", "take 2 tablets", "--days", "30"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("60 EA"))
        .stdout(predicate::str::contains("LOW_CONFIDENCE_SIG"));
}
