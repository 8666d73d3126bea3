//! CLI integration tests for the `sleigh-anneal` binary: exercises
//! `run`, `verify`, and `resume` end to end against small fixture
//! catalogs and partitions.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const CATALOG: &str = "GiftId,Latitude,Longitude,Weight\n\
1,10.0,10.0,5.0\n\
2,20.0,20.0,5.0\n\
3,30.0,30.0,5.0\n\
4,-10.0,-10.0,5.0\n\
5,-20.0,-20.0,5.0\n\
6,-30.0,-30.0,5.0\n";

const PARTITION: &str = "GiftId,TripId\n\
1,1\n\
2,1\n\
3,1\n\
4,2\n\
5,2\n\
6,2\n";

#[test]
fn help_output_lists_all_three_subcommands() {
    let mut cmd = Command::cargo_bin("sleigh-anneal").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("verify"))
        .stdout(predicate::str::contains("resume"));
}

#[test]
fn version_output_succeeds() {
    let mut cmd = Command::cargo_bin("sleigh-anneal").unwrap();
    cmd.arg("--version");
    cmd.assert().success();
}

#[test]
fn missing_subcommand_fails_with_usage() {
    let mut cmd = Command::cargo_bin("sleigh-anneal").unwrap();
    cmd.assert().failure();
}

#[test]
fn verify_accepts_a_sound_partition() {
    let dir = TempDir::new().unwrap();
    let catalog_path = dir.path().join("catalog.csv");
    let partition_path = dir.path().join("partition.csv");
    fs::write(&catalog_path, CATALOG).unwrap();
    fs::write(&partition_path, PARTITION).unwrap();

    let mut cmd = Command::cargo_bin("sleigh-anneal").unwrap();
    cmd.args([
        "verify",
        "--catalog",
        catalog_path.to_str().unwrap(),
        partition_path.to_str().unwrap(),
    ]);

    cmd.assert().success().stdout(predicate::str::contains("OK"));
}

#[test]
fn verify_rejects_a_partition_missing_a_gift() {
    let dir = TempDir::new().unwrap();
    let catalog_path = dir.path().join("catalog.csv");
    let partition_path = dir.path().join("partition.csv");
    fs::write(&catalog_path, CATALOG).unwrap();
    fs::write(&partition_path, "GiftId,TripId\n1,1\n2,1\n").unwrap();

    let mut cmd = Command::cargo_bin("sleigh-anneal").unwrap();
    cmd.args([
        "verify",
        "--catalog",
        catalog_path.to_str().unwrap(),
        partition_path.to_str().unwrap(),
    ]);

    cmd.assert().failure().stdout(predicate::str::contains("VIOLATION"));
}

#[test]
fn verify_rejects_an_unknown_gift_reference() {
    let dir = TempDir::new().unwrap();
    let catalog_path = dir.path().join("catalog.csv");
    let partition_path = dir.path().join("partition.csv");
    fs::write(&catalog_path, CATALOG).unwrap();
    fs::write(&partition_path, "GiftId,TripId\n99,1\n").unwrap();

    let mut cmd = Command::cargo_bin("sleigh-anneal").unwrap();
    cmd.args([
        "verify",
        "--catalog",
        catalog_path.to_str().unwrap(),
        partition_path.to_str().unwrap(),
    ]);

    cmd.assert().failure();
}

#[test]
fn run_produces_a_solution_file_and_checkpoints() {
    let dir = TempDir::new().unwrap();
    let catalog_path = dir.path().join("catalog.csv");
    let partition_path = dir.path().join("partition.csv");
    let output_dir = dir.path().join("out");
    fs::write(&catalog_path, CATALOG).unwrap();
    fs::write(&partition_path, PARTITION).unwrap();

    let mut cmd = Command::cargo_bin("sleigh-anneal").unwrap();
    cmd.args([
        "run",
        "anneal",
        "--catalog",
        catalog_path.to_str().unwrap(),
        "--from-file",
        partition_path.to_str().unwrap(),
        "--output-dir",
        output_dir.to_str().unwrap(),
        "--iterations",
        "20",
        "--random-seed",
        "7",
        "--evaluation-id",
        "smoke",
    ]);

    cmd.assert().success();

    let solution_path = output_dir.join("smoke_solution.csv");
    assert!(solution_path.exists(), "expected {} to exist", solution_path.display());
    let contents = fs::read_to_string(&solution_path).unwrap();
    assert!(contents.starts_with("GiftId,TripId"));
    // All six gifts must still be present after annealing.
    for id in 1..=6 {
        assert!(contents.contains(&format!("{id},")), "missing gift {id} in solution");
    }
}

#[test]
fn run_rejects_an_invalid_initial_partition() {
    let dir = TempDir::new().unwrap();
    let catalog_path = dir.path().join("catalog.csv");
    let partition_path = dir.path().join("partition.csv");
    fs::write(&catalog_path, CATALOG).unwrap();
    fs::write(&partition_path, "GiftId,TripId\n1,1\n").unwrap();

    let mut cmd = Command::cargo_bin("sleigh-anneal").unwrap();
    cmd.args([
        "run",
        "anneal",
        "--catalog",
        catalog_path.to_str().unwrap(),
        "--from-file",
        partition_path.to_str().unwrap(),
        "--iterations",
        "5",
    ]);

    cmd.assert().failure();
}

#[test]
fn run_resolves_from_file_glob_pattern() {
    let dir = TempDir::new().unwrap();
    let catalog_path = dir.path().join("catalog.csv");
    let partition_path = dir.path().join("partition_v1.csv");
    let output_dir = dir.path().join("out");
    fs::write(&catalog_path, CATALOG).unwrap();
    fs::write(&partition_path, PARTITION).unwrap();

    let mut cmd = Command::cargo_bin("sleigh-anneal").unwrap();
    cmd.args([
        "run",
        "anneal",
        "--catalog",
        catalog_path.to_str().unwrap(),
        "--from-file",
        dir.path().join("partition_*.csv").to_str().unwrap(),
        "--output-dir",
        output_dir.to_str().unwrap(),
        "--iterations",
        "5",
    ]);

    cmd.assert().success();
}

#[test]
fn resume_continues_from_a_checkpoint_written_by_run() {
    let dir = TempDir::new().unwrap();
    let catalog_path = dir.path().join("catalog.csv");
    let partition_path = dir.path().join("partition.csv");
    let output_dir = dir.path().join("out");
    fs::write(&catalog_path, CATALOG).unwrap();
    fs::write(&partition_path, PARTITION).unwrap();

    let mut run_cmd = Command::cargo_bin("sleigh-anneal").unwrap();
    run_cmd.args([
        "run",
        "anneal",
        "--catalog",
        catalog_path.to_str().unwrap(),
        "--from-file",
        partition_path.to_str().unwrap(),
        "--output-dir",
        output_dir.to_str().unwrap(),
        "--iterations",
        "10",
        "--random-seed",
        "3",
        "--evaluation-id",
        "resumable",
    ]);
    run_cmd.assert().success();

    let mut resume_cmd = Command::cargo_bin("sleigh-anneal").unwrap();
    resume_cmd.args([
        "resume",
        "--catalog",
        catalog_path.to_str().unwrap(),
        "--checkpoint-dir",
        output_dir.to_str().unwrap(),
        "--evaluation-id",
        "resumable",
        "--random-seed",
        "3",
        "--iteration",
        "10",
        "--additional-iterations",
        "5",
    ]);
    resume_cmd.assert().success();
}

#[test]
fn verbose_flag_is_accepted_alongside_verify() {
    let dir = TempDir::new().unwrap();
    let catalog_path = dir.path().join("catalog.csv");
    let partition_path = dir.path().join("partition.csv");
    fs::write(&catalog_path, CATALOG).unwrap();
    fs::write(&partition_path, PARTITION).unwrap();

    let mut cmd = Command::cargo_bin("sleigh-anneal").unwrap();
    cmd.args([
        "--verbose",
        "verify",
        "--catalog",
        catalog_path.to_str().unwrap(),
        partition_path.to_str().unwrap(),
    ]);

    cmd.assert().success();
}
