//! Shared run logic for the CLI
//!
//! Everything here writes to caller-supplied streams and returns an exit
//! code, so the binary stays a thin shell and tests can drive a full run
//! without spawning a process.

use std::io::Write;

use crate::cli::config::Config;
use crate::doctor::Doctor;
use crate::errors::PipelineError;
use crate::rag::pipeline::RAGPipeline;
use crate::rag::state::{CancelFlag, PipelineState};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// Write the one-line diagnostic for a fatal error
pub fn report_failure<E: Write>(err: &mut E, error: &PipelineError) -> i32 {
    let _ = writeln!(err, "{}", error.diagnostic().to_line());
    let _ = err.flush();
    EXIT_FAILURE
}

/// Run an already-built pipeline for one query.
///
/// On success the prompt (and nothing else) goes to `out`. With
/// `show_queries`, the refined queries are listed on `err`, one per line.
pub async fn run_query<O: Write, E: Write>(
    pipeline: &RAGPipeline,
    query: &str,
    cancel: &CancelFlag,
    show_queries: bool,
    out: &mut O,
    err: &mut E,
) -> i32 {
    let result = match pipeline.execute(query, cancel).await {
        Ok(result) => result,
        Err(e) => return report_failure(err, &e),
    };

    if show_queries {
        for refined in result.refined.as_slice() {
            let _ = writeln!(err, "{}", refined);
        }
    }

    if let Err(e) = writeln!(out, "{}", result.prompt).and_then(|_| out.flush()) {
        tracing::error!("failed to write prompt: {}", e);
        return EXIT_FAILURE;
    }
    EXIT_SUCCESS
}

/// Validate the query, build the pipeline from configuration, then run it
pub async fn run<O: Write, E: Write>(
    config: &Config,
    query: &str,
    cancel: &CancelFlag,
    show_queries: bool,
    out: &mut O,
    err: &mut E,
) -> i32 {
    // Rejected before any collaborator is contacted
    if query.trim().is_empty() {
        let e = PipelineError::InvalidInput("query must not be empty".to_string());
        return report_failure(err, &e);
    }

    let setup = cancel.guard(PipelineState::Start, RAGPipeline::from_config(config));
    let pipeline = match setup.await {
        Ok(pipeline) => pipeline,
        Err(e) => return report_failure(err, &e),
    };

    run_query(&pipeline, query, cancel, show_queries, out, err).await
}

/// Run health checks and print one line per check
pub async fn run_doctor<O: Write>(config: Config, out: &mut O) -> i32 {
    let checks = Doctor::new(config).run_diagnostics().await;
    if let Err(e) = Doctor::display_results(out, &checks) {
        tracing::error!("failed to write diagnostics: {}", e);
        return EXIT_FAILURE;
    }

    if Doctor::overall_status(&checks) {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}
