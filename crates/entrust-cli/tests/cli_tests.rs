//! CLI integration tests using assert_cmd.

use std::collections::BTreeSet;
use std::path::Path;

use assert_cmd::Command;
use chrono::{Duration, Utc};
use predicates::prelude::*;
use tempfile::TempDir;
use uuid::Uuid;

use entrust_core::aggregate::{competency_profile, DateWindow, TimeRange};
use entrust_core::catalogue::Catalogue;
use entrust_core::lifecycle::{self, NewEvaluation};
use entrust_core::model::{Actor, Assessment, Complexity, Domain, Party, Role};
use entrust_core::report::CompetencyReport;
use entrust_core::scale::EntrustmentLevel;

fn entrust() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("entrust").unwrap();
    cmd.env_remove("ENTRUST_OPENAI_KEY");
    cmd
}

/// A tempdir with `entrust.toml` and `datasets/example.json` from `init`.
fn initialized() -> TempDir {
    let dir = TempDir::new().unwrap();
    entrust().current_dir(dir.path()).arg("init").assert().success();
    dir
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    entrust()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created entrust.toml"))
        .stdout(predicate::str::contains("Created datasets/example.json"));

    assert!(dir.path().join("entrust.toml").exists());
    assert!(dir.path().join("datasets/example.json").exists());
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("entrust.toml"), "max_retries = 1\n").unwrap();

    entrust()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("entrust.toml already exists"))
        .stdout(predicate::str::contains("Created datasets/example.json"));

    let content = std::fs::read_to_string(dir.path().join("entrust.toml")).unwrap();
    assert_eq!(content, "max_retries = 1\n");
}

#[test]
fn validate_example_dataset() {
    let dir = initialized();

    entrust()
        .current_dir(dir.path())
        .args(["validate", "--dataset", "datasets/example.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ABS General Surgery (18 EPAs)"))
        .stdout(predicate::str::contains("Dataset: 5 actors, 12 evaluations"))
        .stdout(predicate::str::contains("Dataset valid."));
}

#[test]
fn validate_reports_warnings() {
    let dir = initialized();
    let path = dir.path().join("datasets/example.json");
    let mut dataset = entrust_core::dataset::Dataset::load_json(&path).unwrap();
    dataset.evaluations[0].epa_id = Uuid::new_v4();
    dataset.save_json(&path).unwrap();

    entrust()
        .current_dir(dir.path())
        .args(["validate", "--dataset", "datasets/example.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("WARNING"))
        .stdout(predicate::str::contains("1 warning(s) found."));
}

#[test]
fn validate_nonexistent_file() {
    entrust()
        .args(["validate", "--dataset", "nonexistent.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn summary_text() {
    let dir = initialized();

    entrust()
        .current_dir(dir.path())
        .args([
            "summary",
            "--dataset",
            "datasets/example.json",
            "--resident",
            "ana rivera",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ana Rivera (PGY-4)"))
        .stdout(predicate::str::contains("Coverage: 3/18 EPAs"))
        .stdout(predicate::str::contains("EPA-10"));
}

#[test]
fn summary_json_and_save() {
    let dir = initialized();

    let output = entrust()
        .current_dir(dir.path())
        .args([
            "summary",
            "--dataset",
            "datasets/example.json",
            "--resident",
            "Ben Cho",
            "--format",
            "json",
            "--save",
            "reports/ben.json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let printed: CompetencyReport = serde_json::from_slice(&output).unwrap();
    assert_eq!(printed.resident.name, "Ben Cho");
    assert_eq!(printed.profile.epas.len(), 18);

    let saved = CompetencyReport::load_json(&dir.path().join("reports/ben.json")).unwrap();
    assert_eq!(saved.id, printed.id);
}

#[test]
fn summary_rejects_non_resident() {
    let dir = initialized();

    entrust()
        .current_dir(dir.path())
        .args([
            "summary",
            "--dataset",
            "datasets/example.json",
            "--resident",
            "Dr. Okafor",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn summary_unknown_range() {
    let dir = initialized();

    entrust()
        .current_dir(dir.path())
        .args([
            "summary",
            "--dataset",
            "datasets/example.json",
            "--resident",
            "Ana Rivera",
            "--range",
            "2w",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown time range"));
}

#[test]
fn buckets_for_resident_and_faculty() {
    let dir = initialized();

    entrust()
        .current_dir(dir.path())
        .args(["buckets", "--dataset", "datasets/example.json", "--viewer", "Ana Rivera"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Ana Rivera (resident): 6 in feed, 0 in inbox, 1 pending",
        ));

    entrust()
        .current_dir(dir.path())
        .args(["buckets", "--dataset", "datasets/example.json", "--viewer", "Dr. Lind"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 in inbox"))
        .stdout(predicate::str::contains("Inbox"));
}

#[test]
fn buckets_list_initiator_still_owing_rating() {
    let dir = initialized();

    entrust()
        .current_dir(dir.path())
        .args(["buckets", "--dataset", "datasets/example.json", "--viewer", "Dr. Okafor"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Dr. Okafor (faculty): 6 in feed, 0 in inbox, 0 pending",
        ))
        .stdout(predicate::str::contains("Awaiting your rating"))
        .stdout(predicate::str::contains("EPA-18"));
}

#[test]
fn overview_single_institution() {
    let dir = initialized();

    entrust()
        .current_dir(dir.path())
        .args(["overview", "--dataset", "datasets/example.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("10 completed, 2 open"))
        .stdout(predicate::str::contains("Ana Rivera"))
        .stdout(predicate::str::contains("Dr. Okafor"));
}

#[test]
fn faculty_supervision_view() {
    let dir = initialized();

    entrust()
        .current_dir(dir.path())
        .args(["faculty", "--dataset", "datasets/example.json", "--faculty", "Dr. Okafor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dr. Okafor: 6 completed, average given 2.3/4"))
        .stdout(predicate::str::contains("Ana Rivera"))
        .stdout(predicate::str::contains("PGY-4"))
        .stdout(predicate::str::contains("By complexity:"));

    entrust()
        .current_dir(dir.path())
        .args(["faculty", "--dataset", "datasets/example.json", "--faculty", "Ben Cho"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not faculty"));
}

#[test]
fn classify_case_offline() {
    entrust()
        .args(["classify-case", "--offline", "Lap chole for biliary colic"])
        .assert()
        .success()
        .stdout(predicate::str::contains("EPA-10"))
        .stdout(predicate::str::contains("Confidence: 90%"));
}

#[test]
fn classify_case_without_classifier() {
    let dir = TempDir::new().unwrap();

    entrust()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .args(["classify-case", "open appendectomy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no classifier configured"));
}

#[test]
fn classify_case_mock_config() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("custom.toml");
    std::fs::write(
        &config,
        "[classifier]\ntype = \"mock\"\n\n[classifier.keywords]\nwhipple = \"EPA-13\"\n",
    )
    .unwrap();

    entrust()
        .args(["classify-case", "Whipple, POD 3"])
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("EPA-13"));
}

fn epa_report(resident: &Actor, faculty: &Actor, level: EntrustmentLevel) -> CompetencyReport {
    let catalogue = Catalogue::surgical();
    let epa = catalogue.by_code("EPA-10").unwrap();
    let now = Utc::now() - Duration::days(3);
    let mut evaluation = lifecycle::create(
        NewEvaluation {
            initiated_by: resident.id,
            resident_id: resident.id,
            faculty_id: faculty.id,
            epa_id: epa.id,
            domains: BTreeSet::from([Domain::Intraop]),
            custom_case_text: None,
            initial_assessment: None,
        },
        resident,
        faculty,
        epa,
        now,
    )
    .unwrap();
    for party in [Party::Resident, Party::Faculty] {
        let assessment = Assessment {
            entrustment_level: level,
            complexity: Complexity::Moderate,
            comment: None,
        };
        lifecycle::submit_party(&mut evaluation, party, assessment, now).unwrap();
    }

    let profile = competency_profile(resident.id, &[evaluation], &catalogue, DateWindow::default());
    CompetencyReport::new(resident, TimeRange::All, profile)
}

fn write_reports(dir: &Path, baseline: EntrustmentLevel, current: EntrustmentLevel) {
    let institution_id = Uuid::new_v4();
    let resident = Actor {
        id: Uuid::new_v4(),
        role: Role::Resident,
        institution_id,
        pgy_year: Some(3),
        name: Some("Ana Rivera".into()),
    };
    let faculty = Actor {
        id: Uuid::new_v4(),
        role: Role::Faculty,
        institution_id,
        pgy_year: None,
        name: None,
    };
    epa_report(&resident, &faculty, baseline)
        .save_json(&dir.join("baseline.json"))
        .unwrap();
    epa_report(&resident, &faculty, current)
        .save_json(&dir.join("current.json"))
        .unwrap();
}

#[test]
fn compare_reports() {
    let dir = TempDir::new().unwrap();
    write_reports(
        dir.path(),
        EntrustmentLevel::DirectSupervision,
        EntrustmentLevel::IndirectSupervision,
    );

    entrust()
        .current_dir(dir.path())
        .args(["compare", "--baseline", "baseline.json", "--current", "current.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Comparison: 0 regressions, 1 improvements, 0 unchanged",
        ))
        .stdout(predicate::str::contains("EPA-10 2.00 -> 3.00 (+1.00)"));
}

#[test]
fn compare_fail_on_regression() {
    let dir = TempDir::new().unwrap();
    write_reports(
        dir.path(),
        EntrustmentLevel::PracticeReady,
        EntrustmentLevel::DirectSupervision,
    );

    entrust()
        .current_dir(dir.path())
        .args([
            "compare",
            "--baseline",
            "baseline.json",
            "--current",
            "current.json",
            "--format",
            "markdown",
            "--fail-on-regression",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("EPA-10"));
}

#[test]
fn compare_nonexistent_report() {
    entrust()
        .args(["compare", "--baseline", "missing-a.json", "--current", "missing-b.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn help_output() {
    entrust()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("EPA entrustment evaluation toolkit"));
}

#[test]
fn version_output() {
    entrust()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("entrust"));
}
