//! Command-line argument parsing for ragprompt
//!
//! Provides clap-based CLI with configuration overrides and verbosity control.

use clap::Parser;
use std::path::PathBuf;

use crate::cli::config::Config;

/// ragprompt - Build a retrieval-augmented code-generation prompt
#[derive(Parser, Debug, Default)]
#[command(name = "ragprompt")]
#[command(version)]
#[command(about = "Build a retrieval-augmented prompt for API code generation", long_about = None)]
pub struct Args {
    /// Free-text request, e.g. "change wall color"
    #[arg(value_name = "QUERY")]
    pub query: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Vector store collection name
    #[arg(long)]
    pub collection: Option<String>,

    /// Vector store URL
    #[arg(long)]
    pub store_url: Option<String>,

    /// Hits fetched for each refined query
    #[arg(long, value_name = "K")]
    pub top_k: Option<usize>,

    /// Documents kept in the final prompt
    #[arg(long, value_name = "N")]
    pub max_results: Option<usize>,

    /// Prompt template file
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Skip model refinement and retrieve with the query as given
    #[arg(long)]
    pub no_refine: bool,

    /// Print the refined queries to stderr
    #[arg(long)]
    pub show_queries: bool,

    /// Run health checks instead of building a prompt
    #[arg(long)]
    pub doctor: bool,

    /// Verbosity level: default (warnings), -v (info), -vv (debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Exactly one of QUERY or --doctor
    pub fn validate(&self) -> Result<(), String> {
        match (&self.query, self.doctor) {
            (None, false) => Err("A query is required. Use 'ragprompt <QUERY>' or 'ragprompt --doctor'.".to_string()),
            (Some(_), true) => Err("Cannot combine a query with --doctor.".to_string()),
            _ => Ok(()),
        }
    }

    /// Apply command-line overrides on top of loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(collection) = &self.collection {
            config.store.collection = collection.clone();
        }
        if let Some(url) = &self.store_url {
            config.store.url = url.clone();
        }
        if let Some(k) = self.top_k {
            config.retrieval.results_per_query = k;
        }
        if let Some(n) = self.max_results {
            config.retrieval.final_results = n;
        }
        if let Some(template) = &self.template {
            config.prompt.template_path = Some(template.to_string_lossy().into_owned());
        }
        if self.no_refine {
            config.refiner.provider = "none".to_string();
        }
    }
}

impl Verbosity {
    /// Default tracing filter directive for this level
    pub fn filter_directive(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "info",
            Verbosity::VeryVerbose => "debug",
        }
    }
}
