//! Self-test and scenario runner for tapkit.
//!
//! - `selftest`: a TAP suite over ordinary collection and string code,
//!   including crash-isolation checks
//! - `scenario`: canned runs whose TAP output and exit status are known in
//!   advance, for checking the protocol end to end

#![forbid(unsafe_code)]

pub mod error;
pub mod scenario;
pub mod selftest;

pub use error::HarnessError;
pub use scenario::Scenario;
