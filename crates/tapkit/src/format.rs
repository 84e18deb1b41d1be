//! Description formatting.
//!
//! Assertion macros format their description eagerly at the call site and
//! hand the resulting owned string to the runtime.

use std::fmt;

/// Render `args` into an owned description.
///
/// Literal-only templates skip the formatting machinery.
#[must_use]
pub fn describe(args: fmt::Arguments<'_>) -> String {
    match args.as_str() {
        Some(literal) => literal.to_owned(),
        None => fmt::format(args),
    }
}

/// Plural suffix helper for diagnostics (`1 test`, `2 tests`).
#[must_use]
pub(crate) fn tests_noun(count: u32) -> &'static str {
    if count == 1 { "test" } else { "tests" }
}
