//! Integration test: the harness binary's TAP output and exit status.
//!
//! Run: cargo test -p tapkit-harness --test cli_scenarios_test

use std::path::PathBuf;
use std::process::{Command, Output};

fn harness(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tapkit-harness"))
        .args(args)
        .env_remove("TAPKIT_STREAM")
        .env_remove("TAPKIT_LOG")
        .env_remove("TAPKIT_TRACE_ID")
        .output()
        .expect("harness binary runs")
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_owned)
        .collect()
}

fn scenario(name: &str) -> Output {
    harness(&["scenario", name])
}

fn is_result(line: &str) -> bool {
    line.starts_with("ok ") || line.starts_with("not ok ")
}

#[test]
fn selftest_passes() {
    let output = harness(&["selftest"]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let lines = stdout_lines(&output);
    assert_eq!(lines[0], "1..24");
    assert_eq!(lines.iter().filter(|l| is_result(l)).count(), 24);
}

#[test]
fn passing_scenario_exits_zero() {
    let output = scenario("passing");
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        stdout_lines(&output),
        vec!["1..3", "ok 1 - first", "ok 2 - second", "ok 3 - third"]
    );
}

#[test]
fn failing_scenario_exits_with_failure_count() {
    let output = scenario("failing");
    assert_eq!(output.status.code(), Some(1));
    let lines = stdout_lines(&output);
    assert_eq!(lines[1], "ok 1 - 1+1==2");
    assert_eq!(lines[2], "not ok 2 - 1+1==3");
    assert!(lines[3].starts_with("# \tFailed test ("), "{lines:#?}");
    assert_eq!(lines.last().map(String::as_str), Some("# Failed 1 tests of 2"));
}

#[test]
fn overrun_exits_with_the_excess() {
    let output = scenario("overrun");
    assert_eq!(output.status.code(), Some(2));
    let lines = stdout_lines(&output);
    assert_eq!(lines.last().map(String::as_str), Some("# Planned 1 test but ran 3"));
}

#[test]
fn under_run_exits_with_the_shortfall() {
    let output = scenario("under-run");
    assert_eq!(output.status.code(), Some(2));
    let lines = stdout_lines(&output);
    assert_eq!(lines.last().map(String::as_str), Some("# Planned 3 tests but ran 1"));
}

#[test]
fn todo_failure_is_annotated_and_counted() {
    let output = scenario("todo");
    assert_eq!(output.status.code(), Some(1));
    let lines = stdout_lines(&output);
    assert_eq!(lines[1], "not ok 1 - unfinished feature # TODO not implemented yet");
    assert!(lines[2].starts_with("# \tFailed (TODO)test ("));
    assert_eq!(lines[3], "ok 2 - finished feature");
}

#[test]
fn skip_scenario_exits_zero() {
    let output = scenario("skip");
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_lines(&output)[1], "ok 1 # SKIP requires network");
}

#[test]
fn plan_twice_is_fatal() {
    let output = scenario("plan-twice");
    assert_eq!(output.status.code(), Some(255));
    let lines = stdout_lines(&output);
    assert_eq!(lines[0], "1..2");
    assert!(!lines.iter().any(|l| is_result(l)), "{lines:#?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("plan was called twice"), "{stderr}");
}

#[test]
fn empty_plan_is_fatal() {
    let output = scenario("empty-plan");
    assert_eq!(output.status.code(), Some(255));
    let lines = stdout_lines(&output);
    assert!(!lines.iter().any(|l| l.starts_with("1..") || is_result(l)));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no tests planned"), "{stderr}");
}

#[test]
fn bail_out_stops_the_run() {
    let output = scenario("bail");
    assert_eq!(output.status.code(), Some(255));
    let lines = stdout_lines(&output);
    assert_eq!(lines[1], "ok 1 - connected");
    assert_eq!(lines[2], "Bail out!  database unreachable");
    assert!(!lines.iter().any(|l| l.starts_with("ok 2")));
}

#[test]
fn crash_checks_report_through_the_exit_status() {
    let lives = scenario("lives-abort");
    assert_eq!(lives.status.code(), Some(1));
    assert_eq!(stdout_lines(&lives)[1], "not ok 1 - abort survives");

    let dies = scenario("dies-abort");
    assert_eq!(dies.status.code(), Some(0));
    assert_eq!(stdout_lines(&dies), vec!["1..1", "ok 1 - abort terminates"]);
}

#[test]
fn child_output_never_reaches_the_parent_streams() {
    let output = scenario("child-output");
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    assert_eq!(
        stdout_lines(&output),
        vec!["1..2", "ok 1 - prints then aborts", "ok 2 - prints and returns"]
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("child"), "{stderr}");
}

#[test]
fn stream_flag_moves_tap_to_stderr() {
    let output = harness(&["--stream", "stderr", "scenario", "passing"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("1..3\n"), "{stderr}");
}

#[test]
fn log_flag_writes_jsonl_events() {
    let path: PathBuf = std::env::temp_dir().join(format!(
        "tapkit-harness-events-{}.jsonl",
        std::process::id()
    ));
    let output = harness(&[
        "--log",
        path.to_str().expect("utf-8 temp path"),
        "--trace-id",
        "cli-test",
        "scenario",
        "failing",
    ]);
    assert_eq!(output.status.code(), Some(1));

    let text = std::fs::read_to_string(&path).expect("event log written");
    std::fs::remove_file(&path).ok();
    let events: Vec<&str> = text.lines().collect();
    assert_eq!(events.len(), 4, "{text}");
    assert!(events.iter().all(|e| e.contains(r#""trace_id":"cli-test""#)));
    assert!(events[0].contains(r#""event":"plan""#));
    assert!(events[2].contains(r#""outcome":"fail""#));
    assert!(events[3].contains(r#""event":"finalize""#));
}

#[test]
fn unopenable_log_is_a_setup_error() {
    let output = harness(&[
        "--log",
        "/nonexistent-dir/events.jsonl",
        "scenario",
        "passing",
    ]);
    assert_eq!(output.status.code(), Some(255));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot open event log /nonexistent-dir/events.jsonl"));
}
