use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use anyxml_source::cli::{Cli, VerbosityLevel};
use anyxml_source::{
    AsyncHttpClient, ConfigManager, DocumentCache, HttpClientConfig, JsonLinesSink, NoCache,
    Output, Reporter, SourcingEngine, TextCache, TracingReporter, generate_type_declarations,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    init_tracing(cli.verbosity());

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbosity: VerbosityLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    cli.validate().map_err(anyhow::Error::msg)?;

    let config = ConfigManager::load_config(&cli)
        .await
        .context("failed to load configuration")?;

    let declarations = generate_type_declarations(&config.sources);
    if let Some(path) = &cli.types_out {
        write_declarations(&declarations, File::create(path).with_context(|| display(path))?)?;
    }
    if cli.types_only {
        write_declarations(&declarations, io::stdout().lock())?;
        return Ok(());
    }

    let cache: Arc<dyn TextCache> = if config.cache.enabled {
        let cache = DocumentCache::new(&config.cache);
        if cli.clear_cache {
            cache.clear().await.context("failed to clear document cache")?;
        } else {
            match cache.cleanup_expired().await {
                Ok(stats) => debug!(removed = stats.removed_entries, "expired cache entries removed"),
                Err(e) => debug!(error = %e, "cache cleanup skipped"),
            }
        }
        Arc::new(cache)
    } else {
        Arc::new(NoCache)
    };

    let fetcher = Arc::new(AsyncHttpClient::new(HttpClientConfig::from(&config.network))?);
    let reporter: Arc<dyn Reporter> = Arc::new(TracingReporter);
    let engine = SourcingEngine::with_collaborators(&config, fetcher, cache, reporter);

    let writer: Box<dyn Write + Send> = match &cli.nodes_out {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| display(path))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let mut sink = JsonLinesSink::new(writer);

    let summary = engine.run(&config.sources, &mut sink).await?;
    sink.flush()?;

    eprint!("{}", Output::new(cli.verbosity()).format_summary(&summary));

    Ok(())
}

fn write_declarations(declarations: &[String], mut writer: impl Write) -> Result<()> {
    for declaration in declarations {
        writeln!(writer, "{}", declaration)?;
    }
    writer.flush()?;
    Ok(())
}

fn display(path: &Path) -> String {
    format!("cannot create {}", path.display())
}
