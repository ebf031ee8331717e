//! ragprompt - CLI entry point

use clap::Parser;
use std::io;
use std::process::ExitCode;

use ragprompt::cli::{Args, Config};
use ragprompt::execution::{self, report_failure};
use ragprompt::rag::CancelFlag;
use ragprompt::{telemetry, PipelineError};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    ExitCode::from(run(args).await as u8)
}

async fn run(args: Args) -> i32 {
    let mut stderr = io::stderr();

    if let Err(msg) = args.validate() {
        return report_failure(&mut stderr, &PipelineError::InvalidInput(msg));
    }

    let mut config = match Config::load(args.config.clone()) {
        Ok(config) => config,
        Err(e) => return report_failure(&mut stderr, &e),
    };
    args.apply_overrides(&mut config);
    if let Err(e) = config.validate() {
        return report_failure(&mut stderr, &e);
    }

    telemetry::init_logging(args.verbosity(), config.log_file());
    tracing::debug!(?config, "configuration loaded");

    if args.doctor {
        return execution::run_doctor(config, &mut io::stdout()).await;
    }

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; cancelling");
            on_interrupt.cancel();
        }
    });

    let query = args.query.unwrap_or_default();
    execution::run(
        &config,
        &query,
        &cancel,
        args.show_queries,
        &mut io::stdout(),
        &mut stderr,
    )
    .await
}
