use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::namespace::ScopeOrder;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show critical errors
    Quiet,
    /// Show standard information
    #[default]
    Normal,
    /// Show detailed information
    Verbose,
}

impl VerbosityLevel {
    /// Default `tracing` filter directive for this level
    pub fn filter_directive(self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "info",
            VerbosityLevel::Verbose => "debug",
        }
    }
}

/// Turn XML documents into typed content nodes
#[derive(Parser, Debug, Clone)]
#[command(name = "anyxml-source")]
#[command(about = "Map XML documents onto typed records and emit content nodes")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Write type declarations to this file instead of stdout
    #[arg(long = "types-out")]
    pub types_out: Option<PathBuf>,

    /// Write nodes as JSON lines to this file instead of stdout
    #[arg(long = "nodes-out")]
    pub nodes_out: Option<PathBuf>,

    /// Only print type declarations, without fetching any source
    #[arg(long = "types-only")]
    pub types_only: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", help = "Enable verbose output")]
    pub verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Quiet mode",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Cache directory for fetched documents
    #[arg(long = "cache-dir")]
    pub cache_dir: Option<PathBuf>,

    /// Cache TTL in hours
    #[arg(long = "cache-ttl")]
    pub cache_ttl: Option<u64>,

    /// Bypass the document cache entirely
    #[arg(long = "no-cache")]
    pub no_cache: bool,

    /// Empty the document cache before the run
    #[arg(long = "clear-cache", conflicts_with = "no_cache")]
    pub clear_cache: bool,

    /// HTTP request timeout in seconds
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,

    /// Number of retry attempts for failed downloads
    #[arg(long = "retry-attempts")]
    pub retry_attempts: Option<u32>,

    /// Which declaration wins when a namespace prefix is bound at several levels
    #[arg(long = "namespace-scope", value_enum)]
    pub namespace_scope: Option<ScopeOrder>,

    /// Maximum number of sources fetched and parsed at once
    #[arg(short = 'j', long = "concurrency")]
    pub concurrency: Option<usize>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(config) = &self.config
            && !config.exists()
        {
            return Err(format!("Config file does not exist: {}", config.display()));
        }
        if let Some(concurrency) = self.concurrency
            && concurrency == 0
        {
            return Err("Concurrency must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}
