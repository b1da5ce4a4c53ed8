//! CLI tests for `nbrun run`.
//!
//! Spawns the nbrun binary and verifies exit codes and printed sections for
//! succeeding, failing and un-runnable scripts.

use std::fs;
use std::process::Command;

use nbrun::exit_codes;
use nbrun::test_support::TestWorkdir;

fn nbrun(workdir: &TestWorkdir, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_nbrun"))
        .current_dir(workdir.path())
        .args(args)
        .output()
        .expect("spawn nbrun")
}

#[test]
fn successful_run_exits_ok_and_prints_sections() {
    let workdir = TestWorkdir::new();
    workdir.write("dataset.csv", "AGE\n63\n71\n");
    workdir.write(
        "notebook_code.rhai",
        r#"
        let rows = read_csv(DATASET);
        print(`rows=${rows.len()}`);
        plt::hist(rows.map(|r| r.AGE));
        plt::savefig("age.png");
        plt::show();
        "#,
    );

    let output = nbrun(&workdir, &["run", "--figures-dir", "figs"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("== output ==\nrows=2\n"), "{stdout}");
    assert!(stdout.contains("== new images ==\nage.png\n"), "{stdout}");
    assert!(workdir.join("figs/figure-1.svg").is_file());
}

#[test]
fn failing_script_exits_with_script_failed() {
    let workdir = TestWorkdir::new();
    workdir.write("dataset.csv", "AGE\n63\n");
    workdir.write("notebook_code.rhai", r#"print("partial"); throw "bad column";"#);

    let output = nbrun(&workdir, &["run", "--headless"]);
    assert_eq!(output.status.code(), Some(exit_codes::SCRIPT_FAILED));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("partial"));
    assert!(stdout.contains("error: RuntimeError: bad column"));
}

#[test]
fn missing_dataset_exits_invalid() {
    let workdir = TestWorkdir::new();
    workdir.write("notebook_code.rhai", r#"print("hi");"#);

    let output = nbrun(&workdir, &["run"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("dataset.csv"));
}

#[test]
fn json_report_round_trips_through_serde() {
    let workdir = TestWorkdir::new();
    let source = TestWorkdir::new();
    let local = source.write("admissions.csv", "AGE\n5\n");
    workdir.write("notebook_code.rhai", r#"display("ready");"#);

    let output = nbrun(
        &workdir,
        &["run", "--json", "--dataset", local.to_str().expect("utf-8 path")],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(report["result"]["failed"], false);
    assert_eq!(report["widgets"][0]["kind"], "text");
    assert_eq!(report["widgets"][0]["text"], "ready");
    assert_eq!(
        fs::read_to_string(workdir.join("dataset.csv")).expect("dataset"),
        "AGE\n5\n"
    );
}

#[test]
fn init_writes_default_config() {
    let workdir = TestWorkdir::new();
    let output = nbrun(&workdir, &["init"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let config = fs::read_to_string(workdir.join(".nbrun/config.toml")).expect("config");
    assert!(config.contains("notebook_code.rhai"));
}
