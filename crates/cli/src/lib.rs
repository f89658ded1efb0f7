use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use config::{Config, StopStrategy};
use ctx::{Background, Ctx};
use miette::{IntoDiagnostic, Result, WrapErr};
use orchestrator::{Orchestrator, Shutdown};
use std::io::{self, Write};
use std::path::PathBuf;
use task::StdoutSink;
use tracing::Level;

/// Environment variable holding the log level of the `counters` binary.
pub const LOG_LEVEL_ENV: &str = "COUNTERS_LOG_LEVEL";

/// Parses a log level name (any case) or number, falling back to INFO.
pub fn log_level(value: Option<&str>) -> Level {
    match value {
        None => Level::INFO,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            eprintln!("Invalid log level '{value}', defaulting to INFO");
            Level::INFO
        }),
    }
}

#[derive(Parser, Debug)]
#[command(
    version = env!("CARGO_PKG_VERSION"),
    name = "counters",
    about = "Counts odds and evens on two threads while a heartbeat keeps running"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the counters in the foreground")]
    Run {
        #[arg(short, long, help = "JSON file with pauses and stop strategy")]
        config: Option<PathBuf>,

        #[arg(short, long, value_enum, help = "How to stop the heartbeat")]
        stop: Option<StopArg>,

        #[arg(long, help = "Pause between counted numbers")]
        count_pause_ms: Option<u64>,

        #[arg(long, help = "Pause between heartbeats")]
        heartbeat_pause_ms: Option<u64>,
    },
    #[command(arg_required_else_help = true)]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StopArg {
    Flag,
    Cancel,
}

impl From<StopArg> for StopStrategy {
    fn from(value: StopArg) -> Self {
        match value {
            StopArg::Flag => StopStrategy::Flag,
            StopArg::Cancel => StopStrategy::Cancel,
        }
    }
}

impl Cli {
    pub fn run(self, ctx: Ctx<Background>) -> Result<()> {
        match self.command {
            Commands::Run {
                config,
                stop,
                count_pause_ms,
                heartbeat_pause_ms,
            } => {
                let mut cfg = match config {
                    Some(path) => Config::read(&path).wrap_err("Failed to read config")?,
                    None => Config::default(),
                };
                if let Some(stop) = stop {
                    cfg.stop = stop.into();
                }
                if let Some(count_pause_ms) = count_pause_ms {
                    cfg.count_pause_ms = count_pause_ms;
                }
                if let Some(heartbeat_pause_ms) = heartbeat_pause_ms {
                    cfg.heartbeat_pause_ms = heartbeat_pause_ms;
                }
                cfg.validate().wrap_err("Invalid configuration")?;
                tracing::debug!("Running with {cfg:?}");

                let orchestrator = Orchestrator::new(cfg, StdoutSink);
                let shutdown = orchestrator
                    .run(ctx)
                    .wrap_err("orchestrator exited with error")?;

                if shutdown == Shutdown::Interrupted {
                    tracing::info!("Counters were interrupted before all threads were waited for");
                }

                Ok(())
            }
            Commands::Completion { shell } => {
                let mut cmd = Self::command();
                let name = cmd.get_name().to_string();
                let mut stdout = io::stdout().lock();
                generate(shell, &mut cmd, name, &mut stdout);
                stdout
                    .flush()
                    .into_diagnostic()
                    .wrap_err("failed to flush stdout")?;

                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(None), Level::INFO);
        assert_eq!(log_level(Some("debug")), Level::DEBUG);
        assert_eq!(log_level(Some("WARN")), Level::WARN);
        assert_eq!(log_level(Some(" trace ")), Level::TRACE);
        assert_eq!(log_level(Some("loud")), Level::INFO);
    }

    #[test]
    fn parse_run_defaults() {
        let cli = Cli::try_parse_from(["counters", "run"]).expect("to parse");
        match cli.command {
            Commands::Run {
                config,
                stop,
                count_pause_ms,
                heartbeat_pause_ms,
            } => {
                assert!(config.is_none());
                assert!(stop.is_none());
                assert!(count_pause_ms.is_none());
                assert!(heartbeat_pause_ms.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_run_with_flag_stop() {
        let cli = Cli::try_parse_from(["counters", "run", "--stop", "flag"]).expect("to parse");
        match cli.command {
            Commands::Run { stop, .. } => {
                assert_eq!(stop, Some(StopArg::Flag));
                assert_eq!(StopStrategy::from(StopArg::Flag), StopStrategy::Flag);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_unknown_stop() {
        assert!(Cli::try_parse_from(["counters", "run", "--stop", "interrupt"]).is_err());
    }

    #[test]
    fn run_rejects_invalid_pause() {
        let cli = Cli::try_parse_from(["counters", "run", "--count-pause-ms", "0"]).expect("to parse");
        let background = ctx::background();
        assert!(cli.run(background.clone()).is_err());
    }

    #[test]
    fn run_rejects_missing_config_file() {
        let dir = tempfile::tempdir().expect("to create temp dir");
        let path = dir.path().join("counters.json");
        let cli = Cli::try_parse_from(["counters", "run", "--config", path.to_str().unwrap()])
            .expect("to parse");
        let background = ctx::background();
        assert!(cli.run(background.clone()).is_err());
    }

    #[test]
    fn run_with_fast_config_file() {
        let dir = tempfile::tempdir().expect("to create temp dir");
        let path = dir.path().join("counters.json");
        fs::write(
            &path,
            r#"{"count_pause_ms": 1, "heartbeat_pause_ms": 1, "stop": "flag"}"#,
        )
        .expect("to write config");

        let cli = Cli::try_parse_from(["counters", "run", "--config", path.to_str().unwrap()])
            .expect("to parse");
        let background = ctx::background();
        assert!(cli.run(background.clone()).is_ok());
    }
}
