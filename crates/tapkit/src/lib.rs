//! # tapkit
//!
//! Test Anything Protocol (TAP) reporting runtime.
//!
//! A [`Tap`] owns the plan, the pass/fail/skip counters and the TODO state of
//! one test run and writes TAP lines as assertions are made. Besides plain
//! boolean and equality assertions it can check that a block of code
//! survives or crashes by running the block in a forked child process
//! ([`Tap::lives`], [`Tap::dies`]), so a crash never takes the run down.
//!
//! ```no_run
//! use tapkit::{Tap, ok, dies};
//!
//! fn main() -> std::process::ExitCode {
//!     let tap = Tap::new();
//!     tap.plan(2);
//!     ok!(tap, 1 + 1 == 2, "arithmetic still works");
//!     dies!(tap, std::process::abort(), "abort terminates the child");
//!     tap.exit_code()
//! }
//! ```
//!
//! Unix only: crash isolation uses `fork`, `waitpid` and a shared anonymous
//! mapping.

#![deny(unsafe_code)]

mod buffer;
pub mod config;
pub mod emit;
pub mod error;
pub mod format;
#[allow(unsafe_code)]
pub mod isolation;
pub mod log;
mod macros;
pub mod state;
mod tap;

pub use buffer::SharedBuffer;
pub use config::{Stream, TapConfig};
pub use emit::Callsite;
pub use error::{TAP_FAILURE_EXIT_STATUS, TapError};
pub use isolation::{ChildStatus, SharedDeathFlag};
pub use log::{EventLog, LogEntry, LogLevel, Outcome};
pub use state::{Summary, TestState};
pub use tap::{Expectation, Tap};
