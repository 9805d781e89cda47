use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

fn vidpacectl(store: &std::path::Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("vidpacectl");
    cmd.env("RUST_LOG", "error").arg("--store").arg(store);
    cmd
}

#[test]
fn install_then_set_round_trips_through_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("prefs.json");

    vidpacectl(&store)
        .arg("install")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rewindPrimary\": 30"))
        .stdout(predicate::str::contains("\"schemaVersion\": 1"));

    vidpacectl(&store)
        .args(["set", "--rewind-primary", "301", "--forward-primary", "45", "--language", "zh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rewindPrimary\": 30"))
        .stdout(predicate::str::contains("\"forwardPrimary\": 45"))
        .stdout(predicate::str::contains("\"language\": \"zh\""));

    vidpacectl(&store)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"forwardPrimary\": 45"));

    vidpacectl(&store)
        .arg("reset")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"forwardPrimary\": 30"))
        .stdout(predicate::str::contains("\"language\": \"auto\""));
}

#[test]
fn unknown_language_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    vidpacectl(&dir.path().join("prefs.json"))
        .args(["set", "--language", "fr"])
        .assert()
        .failure();
}

#[test]
fn upgrade_requires_the_previous_version() {
    let mut cmd = cargo_bin_cmd!("vidpacectl");
    let out = cmd
        .arg("upgrade")
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8_lossy(&out);
    assert!(text.contains("--from"), "upgrade help missing --from");
}
