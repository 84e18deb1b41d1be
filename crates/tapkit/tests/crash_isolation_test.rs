//! Integration tests for fork-isolated lives/dies checks.
//!
//! Every check forks the test process; the assertions below only look at
//! what the parent records.
//!
//! Run: cargo test -p tapkit --test crash_isolation_test

#![allow(unsafe_code)]

use std::cell::Cell;
use std::hint::black_box;
use std::io::{self, Write};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use tapkit::{Callsite, Expectation, SharedBuffer, Tap};

fn tap() -> (Tap, SharedBuffer) {
    let buffer = SharedBuffer::new();
    (Tap::with_writer(buffer.clone()), buffer)
}

#[test]
fn lives_passes_and_side_effects_reach_the_parent() {
    let (tap, out) = tap();
    tap.plan(1);
    let mut items: Vec<String> = Vec::new();
    assert!(tapkit::lives!(tap, items.push("pushed".to_owned()), "push survives"));
    assert_eq!(items, vec!["pushed".to_owned()]);
    assert_eq!(out.lines(), vec!["1..1", "ok 1 - push survives"]);
    assert_eq!(tap.done_testing(), 0);
}

#[test]
fn dies_on_abort_and_the_parent_keeps_reporting() {
    let (tap, out) = tap();
    tap.plan(3);
    assert!(tap.dies("abort kills the child", || std::process::abort()));
    tap.pass("still here");
    assert!(tap.dies("second crash", || std::process::abort()));
    assert_eq!(
        out.lines(),
        vec![
            "1..3",
            "ok 1 - abort kills the child",
            "ok 2 - still here",
            "ok 3 - second crash"
        ]
    );
    assert_eq!(tap.done_testing(), 0);
}

#[test]
fn lives_on_crashing_code_fails_without_rerun() {
    let (tap, out) = tap();
    tap.plan(1);
    let reruns = Cell::new(0);
    let passed = tap.lives("abort is not survivable", || {
        reruns.set(reruns.get() + 1);
        std::process::abort();
    });
    assert!(!passed);
    assert_eq!(reruns.get(), 0);
    let lines = out.lines();
    assert_eq!(lines[1], "not ok 1 - abort is not survivable");
    assert!(lines[2].starts_with("# \tFailed test ("));
    assert_eq!(tap.exit_status(), 1);
}

#[test]
fn divide_by_zero_dies() {
    let (tap, out) = tap();
    tap.plan(1);
    tapkit::dies!(
        tap,
        {
            let zero: u32 = black_box(0);
            black_box(10 / zero);
        },
        "integer division by zero"
    );
    assert_eq!(out.lines()[1], "ok 1 - integer division by zero");
    assert_eq!(tap.done_testing(), 0);
}

#[test]
fn signals_and_early_exits_are_deaths() {
    let (tap, _) = tap();
    tap.plan(3);
    assert!(tap.dies("SIGKILL", || {
        // SAFETY: raising a signal in the forked child only.
        unsafe {
            libc::raise(libc::SIGKILL);
        }
    }));
    assert!(tap.dies("exit with failure", || std::process::exit(3)));
    assert!(tap.dies("exit with success before the end", || std::process::exit(0)));
    assert_eq!(tap.done_testing(), 0);
}

#[test]
fn dies_on_surviving_code_fails_and_reruns() {
    let (tap, out) = tap();
    tap.plan(1);
    let mut runs = 0;
    assert!(!tap.dies("harmless code", || runs += 1));
    assert_eq!(runs, 1);
    assert_eq!(out.lines()[1], "not ok 1 - harmless code");
}

#[test]
fn printing_inside_a_check_is_not_a_crash() {
    let (tap, out) = tap();
    tap.plan(1);
    assert!(tap.lives("prints", || {
        print!("partial line without newline");
        eprintln!("to stderr");
    }));
    assert_eq!(out.lines(), vec!["1..1", "ok 1 - prints"]);
}

/// Writer that stalls while the `Tap` lock is held for a "slow" line.
struct StallingWriter {
    inner: SharedBuffer,
}

impl Write for StallingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.windows(4).any(|w| w == b"slow") {
            thread::sleep(Duration::from_millis(1500));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn fork_while_another_thread_holds_the_lock() {
    let out = SharedBuffer::new();
    let tap = Arc::new(Tap::with_writer(StallingWriter { inner: out.clone() }));
    tap.plan(3);

    let writer = {
        let tap = Arc::clone(&tap);
        thread::spawn(move || {
            tap.pass("slow");
        })
    };
    thread::sleep(Duration::from_millis(200));

    let (done_tx, done_rx) = mpsc::channel();
    let checker = {
        let tap = Arc::clone(&tap);
        thread::spawn(move || {
            let inner = Arc::clone(&tap);
            let passed = tap.lives("nested assertion", move || {
                inner.pass("inner");
            });
            done_tx.send(passed).ok();
        })
    };

    let passed = done_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("lives check finished instead of hanging in the child");
    assert!(passed);
    writer.join().expect("writer thread");
    checker.join().expect("checker thread");
    assert_eq!(
        out.lines(),
        vec!["1..3", "ok 1 - slow", "ok 2 - inner", "ok 3 - nested assertion"]
    );
    assert_eq!(tap.done_testing(), 0);
}

#[test]
fn nested_checks_record_in_order() {
    let (tap, out) = tap();
    tap.plan(3);
    tap.lives("outer", || {
        tap.dies("inner crash", || std::process::abort());
        tap.pass("inner pass");
    });
    assert_eq!(
        out.lines(),
        vec!["1..3", "ok 1 - inner crash", "ok 2 - inner pass", "ok 3 - outer"]
    );
}

#[test]
fn try_form_reports_the_callsite_given() {
    let (tap, out) = tap();
    tap.plan(1);
    let site = Callsite::new(Some("custom_fn"), "custom.rs", 9);
    let passed = tap
        .try_check_isolated(Expectation::Dies, "survives anyway", site, || {})
        .expect("fork and wait succeed");
    assert!(!passed);
    assert_eq!(out.lines()[2], "# \tFailed test (custom.rs:custom_fn at line 9)");
}

#[test]
fn todo_applies_to_isolation_results() {
    let (tap, out) = tap();
    tap.plan(1);
    tap.todo_start("crash handling pending");
    tap.lives("crashes for now", || std::process::abort());
    tap.todo_end();
    let lines = out.lines();
    assert_eq!(lines[1], "not ok 1 - crashes for now # TODO crash handling pending");
    assert!(lines[2].starts_with("# \tFailed (TODO)test ("));
}
