use clap::Parser;
use cli::Cli;
use miette::{IntoDiagnostic, Result, WrapErr};
use std::process::ExitCode;
use tracing_subscriber::FmtSubscriber;

fn main() -> ExitCode {
    let app = Cli::parse();

    let level = cli::log_level(std::env::var(cli::LOG_LEVEL_ENV).ok().as_deref());
    // Task output owns stdout.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_line_number(true)
        .with_file(true)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install the log subscriber: {err}");
        return ExitCode::FAILURE;
    }

    match run(app) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("Error: {:?}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(app: Cli) -> Result<()> {
    let background = ctx::background();
    let ctx = background.with_cancel();
    let run_ctx = ctx.to_background();

    ctrlc::set_handler(move || {
        tracing::info!("Interrupt received, cancelling the counters");
        ctx.cancel();
    })
    .into_diagnostic()
    .wrap_err("Failed to install the Ctrl-C handler")?;

    app.run(run_ctx)
}
