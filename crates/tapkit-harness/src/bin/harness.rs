//! CLI entrypoint for the tapkit self-test and scenario runner.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tapkit::{Stream, TAP_FAILURE_EXIT_STATUS, Tap, TapConfig};
use tapkit_harness::{HarnessError, Scenario, selftest};

/// TAP self-test and scenario runner.
#[derive(Debug, Parser)]
#[command(name = "tapkit-harness")]
#[command(about = "Run tapkit's self-test suite or a canned TAP scenario")]
struct Cli {
    /// Stream that receives TAP output (overrides TAPKIT_STREAM).
    #[arg(long, value_enum, global = true)]
    stream: Option<StreamArg>,
    /// JSONL event log path (overrides TAPKIT_LOG).
    #[arg(long, global = true)]
    log: Option<PathBuf>,
    /// Trace id stamped on every event (overrides TAPKIT_TRACE_ID).
    #[arg(long, global = true)]
    trace_id: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the built-in suite over collection and string code.
    Selftest,
    /// Run one canned scenario.
    Scenario {
        #[arg(value_enum)]
        name: Scenario,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StreamArg {
    Stdout,
    Stderr,
}

impl From<StreamArg> for Stream {
    fn from(arg: StreamArg) -> Self {
        match arg {
            StreamArg::Stdout => Stream::Stdout,
            StreamArg::Stderr => Stream::Stderr,
        }
    }
}

impl Cli {
    fn config(&self) -> TapConfig {
        let mut config = TapConfig::from_env();
        if let Some(stream) = self.stream {
            config = config.with_stream(stream.into());
        }
        if let Some(path) = &self.log {
            config = config.with_log_path(path);
        }
        if let Some(trace_id) = &self.trace_id {
            config = config.with_trace_id(trace_id);
        }
        config
    }
}

fn open_tap(config: &TapConfig) -> Result<Tap, HarnessError> {
    Tap::from_config(config).map_err(|source| match &config.log_path {
        Some(path) => HarnessError::EventLog {
            path: path.clone(),
            source,
        },
        None => HarnessError::Tap(source),
    })
}

fn run(cli: &Cli) -> Result<u8, HarnessError> {
    let tap = open_tap(&cli.config())?;
    let code = match cli.command {
        Command::Selftest => selftest::run(&tap),
        Command::Scenario { name } => name.run(&tap),
    };
    Ok(code)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("tapkit-harness: {err}");
            ExitCode::from(TAP_FAILURE_EXIT_STATUS)
        }
    }
}
