//! Sourcing engine
//!
//! Runs the whole pipeline for a set of configured sources:
//! - **Loading**: concurrent fetch + parse per source, joined before anything else
//! - **Converting**: record assembly, parallel across documents
//! - **Creating nodes**: ids and digests computed, nodes handed to a sink
//!
//! Type declarations are derived from configuration alone and never touch
//! the network.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::assembler::assemble_sources;
use crate::cache::{DocumentCache, NoCache, TextCache};
use crate::config::{Config, ConfigManager, Source, filter_sources};
use crate::error::Result;
use crate::http_client::{AsyncHttpClient, Fetcher, HttpClientConfig};
use crate::loader::SourceLoader;
use crate::namespace::ScopeOrder;
use crate::node::{ContentNode, NodeSink};
use crate::reporter::{Reporter, TeeReporter};

/// Stage of a sourcing run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourcingPhase {
    LoadingSources,
    Converting,
    CreatingNodes,
    Complete,
}

/// Progress update handed to a [`ProgressCallback`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcingProgress {
    pub phase: SourcingPhase,
    pub completed: usize,
    pub total: usize,
}

/// Progress callback type for sourcing updates
pub type ProgressCallback = Arc<dyn Fn(SourcingProgress) + Send + Sync>;

/// Counts and timings for one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Sources left after dropping those without a url or mappings
    pub sources_usable: usize,
    pub sources_loaded: usize,
    pub sources_failed: usize,
    pub records: usize,
    pub nodes_created: usize,
    /// Every warning reported during the run, in order
    pub warnings: Vec<String>,
    pub loading_duration: Duration,
    pub converting_duration: Duration,
    pub total_duration: Duration,
}

impl RunSummary {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

pub struct SourcingEngine {
    loader: SourceLoader,
    scope: ScopeOrder,
    reporter: Arc<dyn Reporter>,
}

impl SourcingEngine {
    pub fn new(loader: SourceLoader, scope: ScopeOrder, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            loader,
            scope,
            reporter,
        }
    }

    /// Wire the default collaborators from configuration
    pub fn from_config(config: &Config, reporter: Arc<dyn Reporter>) -> Result<Self> {
        let fetcher: Arc<dyn Fetcher> =
            Arc::new(AsyncHttpClient::new(HttpClientConfig::from(&config.network))?);

        let cache: Arc<dyn TextCache> = if config.cache.enabled {
            Arc::new(DocumentCache::new(&config.cache))
        } else {
            Arc::new(NoCache)
        };

        Ok(Self::with_collaborators(config, fetcher, cache, reporter))
    }

    /// Configuration-driven engine with caller-supplied fetcher and cache
    pub fn with_collaborators(
        config: &Config,
        fetcher: Arc<dyn Fetcher>,
        cache: Arc<dyn TextCache>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let loader = SourceLoader::new(fetcher, cache, Arc::clone(&reporter))
            .with_max_concurrent(ConfigManager::get_concurrency(config));
        Self::new(loader, config.namespace_scope, reporter)
    }

    pub async fn run(&self, sources: &[Source], sink: &mut dyn NodeSink) -> Result<RunSummary> {
        self.run_with_progress(sources, sink, None).await
    }

    /// Load, convert and emit every configured source
    ///
    /// Source and field problems are warnings. Only a failing sink aborts
    /// the run.
    pub async fn run_with_progress(
        &self,
        sources: &[Source],
        sink: &mut dyn NodeSink,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<RunSummary> {
        let run_start = Instant::now();
        let notify = |phase: SourcingPhase, completed: usize, total: usize| {
            if let Some(ref callback) = progress_callback {
                callback(SourcingProgress {
                    phase,
                    completed,
                    total,
                });
            }
        };

        let mut summary = RunSummary {
            sources_usable: filter_sources(sources).len(),
            ..RunSummary::default()
        };

        // Phase 1: load every source, waiting for all of them
        info!(sources = summary.sources_usable, "loading sources");
        notify(SourcingPhase::LoadingSources, 0, summary.sources_usable);

        let loading_start = Instant::now();
        let outcome = self.loader.load_all(sources).await;
        summary.loading_duration = loading_start.elapsed();
        summary.sources_loaded = outcome.sources.len();
        summary.sources_failed = outcome.failures.len();
        summary
            .warnings
            .extend(outcome.failures.iter().map(|failure| failure.warning()));

        notify(
            SourcingPhase::LoadingSources,
            summary.sources_usable,
            summary.sources_usable,
        );

        // Phase 2: assemble records
        info!(documents = summary.sources_loaded, "converting");
        notify(SourcingPhase::Converting, 0, summary.sources_loaded);

        let converting_start = Instant::now();
        let tee = TeeReporter::new(self.reporter.as_ref());
        let records = assemble_sources(outcome.sources, self.scope, &tee);
        summary.warnings.extend(tee.into_warnings());
        summary.converting_duration = converting_start.elapsed();
        summary.records = records.len();

        notify(
            SourcingPhase::Converting,
            summary.sources_loaded,
            summary.sources_loaded,
        );

        // Phase 3: hand nodes to the sink
        info!(records = summary.records, "creating nodes");
        let total = records.len();
        for (done, record) in records.into_iter().enumerate() {
            sink.create_node(ContentNode::from_record(record)?)?;
            summary.nodes_created += 1;
            notify(SourcingPhase::CreatingNodes, done + 1, total);
        }

        summary.total_duration = run_start.elapsed();
        notify(SourcingPhase::Complete, total, total);

        Ok(summary)
    }
}
