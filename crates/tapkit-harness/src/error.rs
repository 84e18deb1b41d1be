use std::path::PathBuf;

use tapkit::TapError;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("cannot open event log {}: {source}", .path.display())]
    EventLog {
        path: PathBuf,
        #[source]
        source: TapError,
    },
    #[error(transparent)]
    Tap(#[from] TapError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn event_log_error_names_the_path() {
        let err = HarnessError::EventLog {
            path: PathBuf::from("/nonexistent/events.jsonl"),
            source: TapError::Log(io::Error::from(io::ErrorKind::NotFound)),
        };
        let text = err.to_string();
        assert!(text.starts_with("cannot open event log /nonexistent/events.jsonl: "));
    }

    #[test]
    fn tap_errors_pass_through() {
        let err = HarnessError::from(TapError::PlanTwice);
        assert_eq!(err.to_string(), "plan was called twice");
    }
}
