use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn msgenrich() -> Result<Command, Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("msgenrich")?;
    cmd.env_remove("RUST_LOG");
    Ok(cmd)
}

fn read_json(path: &Path) -> Result<Value, Box<dyn Error>> {
    Ok(serde_json::from_slice(&fs::read(path)?)?)
}

#[test]
fn enrich_fixture_and_report() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let output = dir.path().join("out.json");
    let sequence = dir.path().join("seq.json");
    fs::write(&sequence, r#"{"pkg_id": 5}"#)?;

    msgenrich()?
        .arg("enrich")
        .arg(fixture("policy_messages.json"))
        .arg("-o")
        .arg(&output)
        .arg("--sequence-file")
        .arg(&sequence)
        .assert()
        .success()
        .stderr(predicate::str::contains("Start Time"))
        .stderr(predicate::str::contains("Input File Size (MB)"))
        .stderr(predicate::str::contains("Output File Size (MB)"))
        .stderr(predicate::str::contains("End Time"))
        .stderr(predicate::str::contains("5..=6 (next 7)"));

    let value = read_json(&output)?;
    let first = &value["PolicyMessages"][0]["PolicyMessage"];
    assert_eq!(first["pkg_id"], 5);
    assert_eq!(first["PolicyTransactionId"], "PT-1001");
    assert_eq!(first["Insured"]["Address"]["PolicyTransactionId"], "PT-1001");
    assert_eq!(
        first["PolicyTransaction"]["Coverages"][1]["ingestSourceFileName"],
        "policy_20240117_a.xml"
    );
    assert!(first["Insured"].get("pkg_id").is_none());

    let second = &value["PolicyMessages"][1]["PolicyMessage"];
    assert_eq!(second["pkg_id"], 6);
    assert_eq!(second["PolicyTransaction"]["ingestSourceFileName"], "policy_20240117_b.xml");

    assert_eq!(value["BatchHeader"], json!({"batchId": "B-2024-0117", "recordCount": 2}));
    assert_eq!(value["Acknowledgements"], json!([]));
    assert_eq!(read_json(&sequence)?, json!({"pkg_id": 7}));
    Ok(())
}

#[test]
fn default_sequence_file_lives_in_working_directory() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;

    msgenrich()?
        .current_dir(dir.path())
        .arg("enrich")
        .arg(fixture("policy_messages.json"))
        .args(["-o", "out.json", "--quiet"])
        .assert()
        .success()
        .stderr(predicate::str::is_empty());

    assert_eq!(read_json(&dir.path().join("__temp__.json"))?, json!({"pkg_id": 3}));

    msgenrich()?
        .current_dir(dir.path())
        .args(["sequence", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("next pkg_id 3 (stored)"));
    Ok(())
}

#[test]
fn missing_transaction_fails_without_output() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let output = dir.path().join("out.json");
    let sequence = dir.path().join("seq.json");

    msgenrich()?
        .arg("enrich")
        .arg(fixture("missing_transaction.json"))
        .arg("-o")
        .arg(&output)
        .arg("--sequence-file")
        .arg(&sequence)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: Missing transaction container"))
        .stderr(predicate::str::contains("MissingTransactionContainer {").not())
        .stderr(predicate::str::contains("ClaimMessages[1]"))
        .stderr(predicate::str::contains("--skip-missing-transaction"));

    assert!(!output.exists());
    assert!(!sequence.exists());
    Ok(())
}

#[test]
fn skip_missing_transaction_enriches_everything() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let output = dir.path().join("out.json");

    msgenrich()?
        .arg("enrich")
        .arg(fixture("missing_transaction.json"))
        .arg("-o")
        .arg(&output)
        .args(["--start", "10", "--skip-missing-transaction"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Without Transaction"));

    let value = read_json(&output)?;
    let records = &value["ClaimMessages"];
    assert_eq!(records[0]["ClaimMessage"]["pkg_id"], 10);
    assert_eq!(records[1]["ClaimMessage"]["pkg_id"], 11);
    assert_eq!(
        records[1]["ClaimMessage"]["Notes"]["ingestSourceFileName"],
        "claims.xml"
    );
    assert!(!dir.path().join("__temp__.json").exists());
    Ok(())
}

#[test]
fn config_file_changes_field_names() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let output = dir.path().join("out.json");
    let sequence = dir.path().join("seq.json");

    msgenrich()?
        .arg("enrich")
        .arg(fixture("order_messages.json"))
        .arg("-o")
        .arg(&output)
        .arg("--config")
        .arg(fixture("custom_fields.toml"))
        .arg("--sequence-file")
        .arg(&sequence)
        .assert()
        .success();

    let text = fs::read_to_string(&output)?;
    assert!(text.contains("\n  \"Orders\""));
    let value: Value = serde_json::from_str(&text)?;
    let body = &value["Orders"][0]["OrderEnvelope"];
    assert_eq!(body["package_seq"], 1);
    assert_eq!(body["OrderTxn"]["Lines"][0]["OrderTxnRef"], "O-77");
    assert_eq!(read_json(&sequence)?, json!({"package_seq": 2}));
    Ok(())
}

#[test]
fn suffix_flags_override_defaults() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let output = dir.path().join("out.json");

    msgenrich()?
        .arg("enrich")
        .arg(fixture("order_messages.json"))
        .arg("-o")
        .arg(&output)
        .args([
            "--start",
            "1",
            "--transaction-suffix",
            "TXN",
            "--transaction-id-suffix",
            "Ref",
        ])
        .assert()
        .success();

    let value = read_json(&output)?;
    assert_eq!(value["Orders"][0]["OrderEnvelope"]["OrderTxnRef"], "O-77");
    Ok(())
}

#[test]
fn invalid_json_input_is_reported() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let input = dir.path().join("broken.json");
    fs::write(&input, "{\"Msgs\": [")?;

    msgenrich()?
        .arg("enrich")
        .arg(&input)
        .arg("-o")
        .arg(dir.path().join("out.json"))
        .args(["--start", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("JSON parse error"))
        .stderr(predicate::str::contains("broken.json"));
    Ok(())
}

#[test]
fn unknown_config_key_is_rejected() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let config = dir.path().join("bad.toml");
    fs::write(&config, "[fields]\npkgid = \"x\"\n")?;

    msgenrich()?
        .arg("enrich")
        .arg(fixture("policy_messages.json"))
        .arg("-o")
        .arg(dir.path().join("out.json"))
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config file"));
    Ok(())
}

#[test]
fn start_conflicts_with_sequence_file() -> Result<(), Box<dyn Error>> {
    msgenrich()?
        .args([
            "enrich",
            "in.json",
            "-o",
            "out.json",
            "--start",
            "1",
            "--sequence-file",
            "seq.json",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
    Ok(())
}

#[test]
fn sequence_set_and_show_round_trip() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let sequence = dir.path().join("seq.json");

    msgenrich()?
        .args(["sequence", "show", "--sequence-file"])
        .arg(&sequence)
        .assert()
        .success()
        .stdout(predicate::str::contains("next pkg_id 1 (absent (default))"));

    msgenrich()?
        .args(["sequence", "set", "250", "--sequence-file"])
        .arg(&sequence)
        .assert()
        .success()
        .stderr(predicate::str::contains("Set next pkg_id to 250"));

    msgenrich()?
        .args(["sequence", "show", "--sequence-file"])
        .arg(&sequence)
        .assert()
        .success()
        .stdout(predicate::str::contains("next pkg_id 250 (stored)"));
    Ok(())
}

#[test]
fn corrupt_sequence_is_reported_and_recovered() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let sequence = dir.path().join("seq.json");
    fs::write(&sequence, "not json")?;

    msgenrich()?
        .args(["sequence", "show", "--sequence-file"])
        .arg(&sequence)
        .assert()
        .success()
        .stdout(predicate::str::contains("next pkg_id 1 (malformed (default)"));

    let output = dir.path().join("out.json");
    msgenrich()?
        .arg("enrich")
        .arg(fixture("policy_messages.json"))
        .arg("-o")
        .arg(&output)
        .arg("--sequence-file")
        .arg(&sequence)
        .assert()
        .success()
        .stderr(predicate::str::contains("sequence file malformed"));

    assert_eq!(read_json(&sequence)?, json!({"pkg_id": 3}));
    Ok(())
}
