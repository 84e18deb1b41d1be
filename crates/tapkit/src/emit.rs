//! TAP line rendering.
//!
//! Every function here writes complete lines to the supplied writer. Callers
//! hold the runtime lock across a result line and its diagnostic so that
//! concurrent assertions never interleave partial output.

use std::borrow::Cow;
use std::io::{self, Write};
use std::panic::Location;

/// Where an assertion was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Callsite {
    /// Enclosing function, when the assertion macro could name it.
    pub function: Option<&'static str>,
    pub file: &'static str,
    pub line: u32,
}

impl Callsite {
    #[must_use]
    pub const fn new(function: Option<&'static str>, file: &'static str, line: u32) -> Self {
        Self {
            function,
            file,
            line,
        }
    }

    /// Callsite of the caller of a `#[track_caller]` function.
    #[must_use]
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self::new(None, location.file(), location.line())
    }
}

/// One rendered assertion.
#[derive(Debug, Clone, Copy)]
pub struct ResultLine<'a> {
    pub number: u32,
    pub passed: bool,
    pub description: &'a str,
    /// Active TODO message, if any.
    pub todo: Option<&'a str>,
}

/// Escape `#` as `\#`; no other character is touched.
#[must_use]
pub fn escape_description(description: &str) -> Cow<'_, str> {
    if !description.contains('#') {
        return Cow::Borrowed(description);
    }
    let mut escaped = String::with_capacity(description.len() + 4);
    for ch in description.chars() {
        if ch == '#' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    Cow::Owned(escaped)
}

pub fn write_plan(out: &mut dyn Write, planned: u32) -> io::Result<()> {
    writeln!(out, "1..{planned}")
}

/// Write `[not ]ok <n> - <desc>[ # TODO <msg>]`.
pub fn write_result(out: &mut dyn Write, result: &ResultLine<'_>) -> io::Result<()> {
    let prefix = if result.passed { "" } else { "not " };
    write!(
        out,
        "{prefix}ok {} - {}",
        result.number,
        escape_description(result.description)
    )?;
    if let Some(message) = result.todo {
        write!(out, " # TODO {message}")?;
    }
    writeln!(out)
}

/// Write the `# Failed test (...)` line that follows a `not ok`.
pub fn write_failure_diag(out: &mut dyn Write, site: &Callsite, in_todo: bool) -> io::Result<()> {
    let tag = if in_todo { "(TODO)" } else { "" };
    match site.function {
        Some(function) => write_diag(
            out,
            &format!(
                "\tFailed {tag}test ({}:{function} at line {})",
                site.file, site.line
            ),
        ),
        None => write_diag(
            out,
            &format!("\tFailed {tag}test ({} at line {})", site.file, site.line),
        ),
    }
}

pub fn write_skip(out: &mut dyn Write, number: u32, message: &str) -> io::Result<()> {
    writeln!(out, "ok {number} # SKIP {message}")
}

/// Write `# <text>`, one prefixed line per line of `text`.
pub fn write_diag(out: &mut dyn Write, text: &str) -> io::Result<()> {
    if text.is_empty() {
        return writeln!(out, "# ");
    }
    for line in text.lines() {
        writeln!(out, "# {line}")?;
    }
    Ok(())
}

pub fn write_bail_out(out: &mut dyn Write, message: &str) -> io::Result<()> {
    writeln!(out, "Bail out!  {message}")
}
