//! Runtime configuration.
//!
//! Read from the environment by [`TapConfig::from_env`]:
//! - `TAPKIT_STREAM`: `stdout` (default) or `stderr`, where TAP lines go.
//! - `TAPKIT_LOG`: path of a JSONL event log. Unset disables the log.
//! - `TAPKIT_TRACE_ID`: trace id stamped on every log entry. Defaults to
//!   `tapkit::<pid>`.

use std::path::PathBuf;

pub const ENV_STREAM: &str = "TAPKIT_STREAM";
pub const ENV_LOG: &str = "TAPKIT_LOG";
pub const ENV_TRACE_ID: &str = "TAPKIT_TRACE_ID";

/// Standard stream that receives TAP output.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    #[default]
    Stdout,
    Stderr,
}

impl Stream {
    /// Parse from string (case-insensitive). Unknown values fall back to stdout.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "stderr" | "err" | "2" => Self::Stderr,
            _ => Self::Stdout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapConfig {
    pub stream: Stream,
    pub log_path: Option<PathBuf>,
    pub trace_id: String,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            stream: Stream::Stdout,
            log_path: None,
            trace_id: default_trace_id(),
        }
    }
}

impl TapConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            stream: get(ENV_STREAM)
                .map(|raw| Stream::from_str_loose(&raw))
                .unwrap_or_default(),
            log_path: get(ENV_LOG).map(PathBuf::from),
            trace_id: get(ENV_TRACE_ID).unwrap_or_else(default_trace_id),
        }
    }

    #[must_use]
    pub fn with_stream(mut self, stream: Stream) -> Self {
        self.stream = stream;
        self
    }

    #[must_use]
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }
}

fn default_trace_id() -> String {
    format!("tapkit::{}", std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn stream_parsing_is_loose() {
        assert_eq!(Stream::from_str_loose("STDERR"), Stream::Stderr);
        assert_eq!(Stream::from_str_loose(" err "), Stream::Stderr);
        assert_eq!(Stream::from_str_loose("stdout"), Stream::Stdout);
        assert_eq!(Stream::from_str_loose("bogus"), Stream::Stdout);
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = TapConfig::from_lookup(lookup(&[]));
        assert_eq!(config.stream, Stream::Stdout);
        assert_eq!(config.log_path, None);
        assert_eq!(config.trace_id, format!("tapkit::{}", std::process::id()));
    }

    #[test]
    fn environment_values_are_applied() {
        let config = TapConfig::from_lookup(lookup(&[
            (ENV_STREAM, "stderr"),
            (ENV_LOG, "/tmp/tap.jsonl"),
            (ENV_TRACE_ID, "ci::run-7"),
        ]));
        assert_eq!(config.stream, Stream::Stderr);
        assert_eq!(config.log_path, Some(PathBuf::from("/tmp/tap.jsonl")));
        assert_eq!(config.trace_id, "ci::run-7");
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = TapConfig::from_lookup(lookup(&[(ENV_LOG, "  "), (ENV_TRACE_ID, "")]));
        assert_eq!(config.log_path, None);
        assert!(config.trace_id.starts_with("tapkit::"));
    }

    #[test]
    fn builders_override_fields() {
        let config = TapConfig::default()
            .with_stream(Stream::Stderr)
            .with_log_path("events.jsonl")
            .with_trace_id("local");
        assert_eq!(config.stream, Stream::Stderr);
        assert_eq!(config.log_path, Some(PathBuf::from("events.jsonl")));
        assert_eq!(config.trace_id, "local");
    }
}
