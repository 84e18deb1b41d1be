//! The runtime context shared by every assertion of a test run.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::config::{Stream, TapConfig};
use crate::emit::{self, Callsite, ResultLine};
use crate::error::{TAP_FAILURE_EXIT_STATUS, TapError};
use crate::isolation::{self, Isolation};
use crate::log::{EventLog, LogEntry, LogLevel, Outcome};
use crate::state::{Summary, TestState};

/// What a crash-isolation check expects from its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// The block must return normally.
    Lives,
    /// The block must terminate its process abnormally.
    Dies,
}

impl Expectation {
    #[must_use]
    pub fn is_met(self, died: bool) -> bool {
        match self {
            Self::Lives => !died,
            Self::Dies => died,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Lives => "lives",
            Self::Dies => "dies",
        }
    }
}

struct Inner {
    state: TestState,
    out: Box<dyn Write + Send>,
    log: Option<EventLog>,
    log_failed: bool,
}

/// Locked view of [`Inner`]. Never taken inside an isolated child.
struct Session<'a> {
    inner: MutexGuard<'a, Inner>,
}

impl Session<'_> {
    fn state(&mut self) -> &mut TestState {
        &mut self.inner.state
    }

    fn write(&mut self, render: impl FnOnce(&mut dyn Write) -> io::Result<()>) {
        let out = &mut *self.inner.out;
        // A broken TAP stream is not an assertion failure.
        let _ = render(&mut *out).and_then(|()| out.flush());
    }

    fn log(&mut self, entry: impl FnOnce() -> LogEntry) {
        let inner = &mut *self.inner;
        if let Some(log) = inner.log.as_mut() {
            if let Err(err) = log.emit(entry()) {
                warn_log_failure(&mut inner.log_failed, &err);
            }
        }
    }

    fn flush_log(&mut self) {
        let inner = &mut *self.inner;
        if let Some(log) = inner.log.as_mut() {
            if let Err(err) = log.flush() {
                warn_log_failure(&mut inner.log_failed, &err);
            }
        }
    }
}

/// Report the first event-log failure on stderr; later ones are dropped.
fn warn_log_failure(already_warned: &mut bool, err: &io::Error) {
    if !*already_warned {
        *already_warned = true;
        eprintln!("tapkit: event log write failed: {err}");
    }
}

/// A TAP test run.
///
/// Build one per test binary, share it by reference or `Arc`, declare the
/// plan, make assertions, and end with [`Tap::done_testing`]. All methods
/// take `&self`; one internal lock serializes counters and output so result
/// numbers stay gap-free when several threads assert concurrently.
pub struct Tap {
    inner: Mutex<Inner>,
    in_isolated_child: AtomicBool,
}

impl std::fmt::Debug for Tap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tap")
            .field("summary", &self.summary())
            .field("in_isolated_child", &self.is_isolated_child())
            .finish_non_exhaustive()
    }
}

impl Default for Tap {
    fn default() -> Self {
        Self::new()
    }
}

impl Tap {
    /// TAP on standard output, no event log.
    #[must_use]
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }

    /// TAP on an arbitrary writer.
    #[must_use]
    pub fn with_writer(out: impl Write + Send + 'static) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: TestState::new(),
                out: Box::new(out),
                log: None,
                log_failed: false,
            }),
            in_isolated_child: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &TapConfig) -> Result<Self, TapError> {
        let tap = match config.stream {
            Stream::Stdout => Self::with_writer(io::stdout()),
            Stream::Stderr => Self::with_writer(io::stderr()),
        };
        match &config.log_path {
            Some(path) => {
                let log = EventLog::to_file(path, &config.trace_id).map_err(TapError::Log)?;
                Ok(tap.with_event_log(log))
            }
            None => Ok(tap),
        }
    }

    pub fn from_env() -> Result<Self, TapError> {
        Self::from_config(&TapConfig::from_env())
    }

    #[must_use]
    pub fn with_event_log(self, log: EventLog) -> Self {
        self.inner.lock().log = Some(log);
        self
    }

    /// Lock the run, or `None` inside an isolated child.
    ///
    /// The child must not touch the lock: another thread of the parent may
    /// have held it at fork time, and no thread in the child would ever
    /// release it. The child's counters are discarded anyway.
    fn session(&self) -> Option<Session<'_>> {
        if self.is_isolated_child() {
            return None;
        }
        Some(Session {
            inner: self.inner.lock(),
        })
    }

    /// True inside the forked child of a lives/dies check.
    #[must_use]
    pub fn is_isolated_child(&self) -> bool {
        self.in_isolated_child.load(Ordering::Relaxed)
    }

    // -----------------------------------------------------------------
    // Plan
    // -----------------------------------------------------------------

    /// Declare how many assertions the run makes and emit `1..n`.
    pub fn try_plan(&self, planned: u32) -> Result<(), TapError> {
        let Some(mut session) = self.session() else {
            return Ok(());
        };
        session.state().declare_plan(planned, std::process::id())?;
        session.write(|out| emit::write_plan(out, planned));
        session.log(|| {
            LogEntry::new(LogLevel::Info, "plan")
                .with_details(serde_json::json!({ "planned": planned }))
        });
        Ok(())
    }

    /// [`Tap::try_plan`], exiting with status 255 on a second plan or `n == 0`.
    pub fn plan(&self, planned: u32) {
        if let Err(err) = self.try_plan(planned) {
            self.fatal(err);
        }
    }

    // -----------------------------------------------------------------
    // Results
    // -----------------------------------------------------------------

    /// Count and emit one assertion. Returns `passed` unchanged.
    pub fn record(&self, passed: bool, description: impl Into<String>, site: Callsite) -> bool {
        let Some(mut session) = self.session() else {
            return passed;
        };
        let description = description.into();
        let number = session.state().record(passed);
        let todo = session.state().todo().map(str::to_owned);
        session.write(|out| {
            emit::write_result(
                out,
                &ResultLine {
                    number,
                    passed,
                    description: &description,
                    todo: todo.as_deref(),
                },
            )?;
            if passed {
                Ok(())
            } else {
                emit::write_failure_diag(out, &site, todo.is_some())
            }
        });
        session.log(|| {
            let level = if passed { LogLevel::Info } else { LogLevel::Warn };
            LogEntry::new(level, "result")
                .with_test(number, Outcome::from_passed(passed))
                .with_description(description.as_str())
                .with_todo(todo.as_deref())
                .with_details(serde_json::json!({
                    "file": site.file,
                    "line": site.line,
                    "function": site.function,
                }))
        });
        passed
    }

    #[track_caller]
    pub fn ok(&self, passed: bool, description: impl Into<String>) -> bool {
        self.record(passed, description, Callsite::caller())
    }

    #[track_caller]
    pub fn pass(&self, description: impl Into<String>) -> bool {
        self.record(true, description, Callsite::caller())
    }

    #[track_caller]
    pub fn fail(&self, description: impl Into<String>) -> bool {
        self.record(false, description, Callsite::caller())
    }

    #[track_caller]
    pub fn eq_true(&self, value: bool, description: impl Into<String>) -> bool {
        self.record(value, description, Callsite::caller())
    }

    #[track_caller]
    pub fn eq_false(&self, value: bool, description: impl Into<String>) -> bool {
        self.record(!value, description, Callsite::caller())
    }

    #[track_caller]
    pub fn is_eq<A, B>(&self, got: A, expected: B, description: impl Into<String>) -> bool
    where
        A: PartialEq<B>,
    {
        self.record(got == expected, description, Callsite::caller())
    }

    #[track_caller]
    pub fn is_ne<A, B>(&self, got: A, unexpected: B, description: impl Into<String>) -> bool
    where
        A: PartialEq<B>,
    {
        self.record(got != unexpected, description, Callsite::caller())
    }

    #[track_caller]
    pub fn eq_str(&self, got: &str, expected: &str, description: impl Into<String>) -> bool {
        self.record(got == expected, description, Callsite::caller())
    }

    #[track_caller]
    pub fn ne_str(&self, got: &str, unexpected: &str, description: impl Into<String>) -> bool {
        self.record(got != unexpected, description, Callsite::caller())
    }

    /// Pass when both pointers address the same location.
    #[track_caller]
    pub fn eq_ptr<T: ?Sized, U: ?Sized>(
        &self,
        got: *const T,
        expected: *const U,
        description: impl Into<String>,
    ) -> bool {
        self.record(
            std::ptr::addr_eq(got, expected),
            description,
            Callsite::caller(),
        )
    }

    #[track_caller]
    pub fn ne_ptr<T: ?Sized, U: ?Sized>(
        &self,
        got: *const T,
        unexpected: *const U,
        description: impl Into<String>,
    ) -> bool {
        self.record(
            !std::ptr::addr_eq(got, unexpected),
            description,
            Callsite::caller(),
        )
    }

    #[track_caller]
    pub fn is_none<T>(&self, value: &Option<T>, description: impl Into<String>) -> bool {
        self.record(value.is_none(), description, Callsite::caller())
    }

    #[track_caller]
    pub fn is_some<T>(&self, value: &Option<T>, description: impl Into<String>) -> bool {
        self.record(value.is_some(), description, Callsite::caller())
    }

    // -----------------------------------------------------------------
    // Skips, TODO blocks, diagnostics
    // -----------------------------------------------------------------

    /// Emit `count` lines of `ok <n> # SKIP <message>`.
    pub fn skip(&self, count: u32, message: impl Into<String>) {
        let Some(mut session) = self.session() else {
            return;
        };
        let message = message.into();
        let first = session.state().skip(count);
        session.write(|out| {
            (first..first.saturating_add(count))
                .try_for_each(|number| emit::write_skip(&mut *out, number, &message))
        });
        session.log(|| {
            LogEntry::new(LogLevel::Info, "skip")
                .with_description(message.as_str())
                .with_details(serde_json::json!({ "first": first, "count": count }))
        });
    }

    /// Skip `count` assertions when `condition` holds, otherwise run `block`.
    ///
    /// Returns whether `block` ran.
    pub fn skip_if<F: FnOnce()>(
        &self,
        condition: bool,
        count: u32,
        message: impl Into<String>,
        block: F,
    ) -> bool {
        if condition {
            self.skip(count, message);
            return false;
        }
        block();
        true
    }

    /// Start a TODO block: following results carry `# TODO <message>`.
    pub fn todo_start(&self, message: impl Into<String>) {
        let Some(mut session) = self.session() else {
            return;
        };
        let message = message.into();
        session.log(|| {
            LogEntry::new(LogLevel::Debug, "todo_start").with_todo(Some(message.as_str()))
        });
        session.state().begin_todo(message);
    }

    pub fn todo_end(&self) {
        let Some(mut session) = self.session() else {
            return;
        };
        session.state().end_todo();
        session.log(|| LogEntry::new(LogLevel::Debug, "todo_end"));
    }

    /// Emit `# <text>` on the TAP stream.
    pub fn diag(&self, text: impl AsRef<str>) {
        let Some(mut session) = self.session() else {
            return;
        };
        session.write(|out| emit::write_diag(out, text.as_ref()));
    }

    // -----------------------------------------------------------------
    // Crash isolation
    // -----------------------------------------------------------------

    /// Run `block` in a forked child and record whether it met `expectation`.
    ///
    /// When the child survives, `block` runs a second time in this process so
    /// its side effects (counters, nested assertions, allocations) become
    /// visible here. Blocks with side effects that must not happen twice
    /// should not be checked this way. A block that died is never re-run.
    pub fn try_check_isolated<F: FnMut()>(
        &self,
        expectation: Expectation,
        description: impl Into<String>,
        site: Callsite,
        mut block: F,
    ) -> Result<bool, TapError> {
        let description = description.into();
        let Isolation { pid, died, status } = isolation::run_isolated(&mut block, || {
            self.in_isolated_child.store(true, Ordering::Relaxed);
        })?;

        if let Some(mut session) = self.session() {
            session.log(|| {
                LogEntry::new(LogLevel::Debug, "isolation")
                    .with_description(description.as_str())
                    .with_exit_code(status.code())
                    .with_details(serde_json::json!({
                        "expect": expectation.as_str(),
                        "pid": pid,
                        "died": died,
                    }))
            });
        }

        if !died {
            block();
        }
        Ok(self.record(expectation.is_met(died), description, site))
    }

    /// [`Tap::try_check_isolated`], exiting with status 255 if the child
    /// cannot be forked or waited for.
    pub fn check_isolated<F: FnMut()>(
        &self,
        expectation: Expectation,
        description: impl Into<String>,
        site: Callsite,
        block: F,
    ) -> bool {
        match self.try_check_isolated(expectation, description, site, block) {
            Ok(passed) => passed,
            Err(err) => self.fatal(err),
        }
    }

    /// Assert that `block` returns normally. See [`Tap::try_check_isolated`].
    #[track_caller]
    pub fn lives<F: FnMut()>(&self, description: impl Into<String>, block: F) -> bool {
        self.check_isolated(Expectation::Lives, description, Callsite::caller(), block)
    }

    /// Assert that `block` terminates its process abnormally.
    #[track_caller]
    pub fn dies<F: FnMut()>(&self, description: impl Into<String>, block: F) -> bool {
        self.check_isolated(Expectation::Dies, description, Callsite::caller(), block)
    }

    // -----------------------------------------------------------------
    // Ending the run
    // -----------------------------------------------------------------

    /// Exit code for the counters so far, in `[0, 255]`.
    #[must_use]
    pub fn exit_status(&self) -> u8 {
        self.inner.lock().state.exit_status()
    }

    #[must_use]
    pub fn summary(&self) -> Summary {
        self.inner.lock().state.summary()
    }

    /// Print end-of-run diagnostics.
    ///
    /// Runs at most once, and only in the process that declared the plan;
    /// returns whether this call did the reconciliation.
    pub fn finalize(&self) -> bool {
        let Some(mut session) = self.session() else {
            return false;
        };
        let Some(lines) = session.state().reconcile(std::process::id()) else {
            return false;
        };
        for line in &lines {
            session.write(|out| emit::write_diag(out, line));
        }
        let summary = session.state().summary();
        let code = session.state().exit_status();
        session.log(|| {
            LogEntry::new(LogLevel::Info, "finalize")
                .with_exit_code(i32::from(code))
                .with_details(serde_json::json!({
                    "summary": summary,
                    "diagnostics": lines,
                }))
        });
        session.flush_log();
        true
    }

    /// Finalize the run and return its exit code.
    pub fn done_testing(&self) -> u8 {
        let code = self.exit_status();
        self.finalize();
        code
    }

    /// [`Tap::done_testing`] as a value `main` can return.
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.done_testing())
    }

    /// Emit `Bail out!  <message>` and end the process with status 255.
    pub fn bail_out(&self, message: impl Into<String>) -> ! {
        self.fatal(TapError::Bail(message.into()))
    }

    /// End the process on a harness error with status 255.
    ///
    /// Bail-outs go to the TAP stream; everything else goes to stderr. The
    /// end-of-run diagnostics are printed before exiting.
    pub fn fatal(&self, err: TapError) -> ! {
        if let Some(mut session) = self.session() {
            if err.marks_run_dead() {
                session.state().mark_died();
            }
            match &err {
                TapError::Bail(message) => session.write(|out| emit::write_bail_out(out, message)),
                other => eprintln!("{other}"),
            }
            session.log(|| {
                LogEntry::new(LogLevel::Fatal, "fatal")
                    .with_description(err.to_string())
                    .with_exit_code(i32::from(TAP_FAILURE_EXIT_STATUS))
            });
        }
        self.finalize();
        std::process::exit(i32::from(TAP_FAILURE_EXIT_STATUS))
    }
}
