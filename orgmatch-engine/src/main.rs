//! orgmatch - Organization name resolution
//!
//! Resolves free-text organization names against a registry of reference
//! entities. Runs either as a one-shot CLI over a JSON-lines query file or as
//! an HTTP service (default port 5740).

use std::io::{BufRead, BufReader, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use orgmatch_common::config::{load_or_default, ConfigFileResolver};
use orgmatch_engine::config::{CacheBackend, OrgmatchConfig};
use orgmatch_engine::registry::InMemoryRegistry;
use orgmatch_engine::resolution::cache::{ExactMatchCache, SqliteCacheStore};
use orgmatch_engine::resolution::tier1::{Normalizer, QueryExpander};
use orgmatch_engine::resolution::tier2::{DisabledOracle, HttpJudgmentOracle, JudgmentOracle};
use orgmatch_engine::resolution::types::Query;
use orgmatch_engine::resolution::ResolutionOrchestrator;
use orgmatch_engine::AppState;

/// Command-line arguments for orgmatch
#[derive(Parser, Debug)]
#[command(name = "orgmatch")]
#[command(about = "Organization name resolution engine")]
#[command(version)]
struct Args {
    /// Config file (overrides ORGMATCH_CONFIG and the default locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a JSON-lines query file, one JSON outcome per line on stdout
    Resolve {
        /// Registry file (JSON array of entities)
        #[arg(short, long)]
        registry: PathBuf,

        /// Query file: one query object or plain name per line
        #[arg(short, long)]
        queries: PathBuf,

        /// Attach a debug trace to every outcome
        #[arg(long)]
        debug: bool,
    },

    /// Print the structural variants of a name
    Expand { name: String },

    /// Print the normalized form of a name
    Normalize { name: String },

    /// Run the HTTP service
    Serve {
        /// Registry file (JSON array of entities)
        #[arg(short, long)]
        registry: PathBuf,

        /// Port to listen on (overrides [server] port)
        #[arg(short, long, env = "ORGMATCH_PORT")]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = ConfigFileResolver::default().resolve(args.config.as_deref());
    let config: OrgmatchConfig =
        load_or_default(config_path.as_deref()).context("Failed to load configuration")?;

    orgmatch_common::logging::init_tracing(&config.logging)
        .context("Failed to initialize logging")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        built = env!("BUILD_TIMESTAMP"),
        profile = env!("BUILD_PROFILE"),
        "orgmatch starting"
    );

    config.validate().context("Invalid configuration")?;

    match args.command {
        Command::Normalize { name } => {
            let normalized = Normalizer::from_config(&config.resolution).normalize(&name);
            println!("{}", normalized);
            Ok(())
        }
        Command::Expand { name } => {
            let expander = QueryExpander::from_config(&config.resolution);
            for variant in expander.expand(&name) {
                println!("{}", serde_json::to_string(&variant)?);
            }
            Ok(())
        }
        Command::Resolve {
            registry,
            queries,
            debug,
        } => run_resolve(&config, &registry, &queries, debug).await,
        Command::Serve { registry, port } => run_serve(&config, &registry, port).await,
    }
}

/// Assemble the engine from configuration and a registry file
async fn build_orchestrator(
    config: &OrgmatchConfig,
    registry_path: &Path,
) -> Result<ResolutionOrchestrator> {
    let registry = InMemoryRegistry::from_json_file(registry_path)
        .with_context(|| format!("Failed to load registry {}", registry_path.display()))?;
    if registry.is_empty() {
        warn!(path = %registry_path.display(), "Registry is empty, every query will be unmatched");
    }

    let cache = match config.cache.backend {
        CacheBackend::Memory => ExactMatchCache::in_memory(config.resolution.min_cache_confidence),
        CacheBackend::Sqlite => {
            let path = config
                .cache
                .sqlite_path
                .as_deref()
                .context("cache.backend is sqlite but cache.sqlite_path is not set")?;
            let store = SqliteCacheStore::open(path)
                .await
                .with_context(|| format!("Failed to open cache database {}", path.display()))?;
            info!(path = %path.display(), "SQLite match cache opened");
            ExactMatchCache::new(Arc::new(store), config.resolution.min_cache_confidence)
        }
    };

    let oracle: Arc<dyn JudgmentOracle> = if config.oracle.enabled {
        let oracle = HttpJudgmentOracle::from_config(&config.oracle, &config.resolution)
            .context("Failed to create oracle client")?;
        info!(endpoint = %oracle.endpoint(), "Judgment oracle enabled");
        Arc::new(oracle)
    } else {
        info!("Judgment oracle disabled, escalations use the fallback judgment");
        Arc::new(DisabledOracle)
    };

    let orchestrator = ResolutionOrchestrator::new(
        config.resolution.clone(),
        Arc::new(registry),
        oracle,
        Arc::new(cache),
    )?;
    Ok(orchestrator)
}

/// Parse one line of a query file: a JSON query object or a bare name
fn parse_query_line(line: &str, debug: bool) -> Result<Option<Query>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let mut query = if line.starts_with('{') {
        serde_json::from_str::<Query>(line)
            .with_context(|| format!("Invalid query line: {}", line))?
    } else {
        Query::new(line)
    };
    query.debug |= debug;
    Ok(Some(query))
}

async fn run_resolve(
    config: &OrgmatchConfig,
    registry_path: &Path,
    queries_path: &Path,
    debug: bool,
) -> Result<()> {
    let orchestrator = build_orchestrator(config, registry_path).await?;

    let file = std::fs::File::open(queries_path)
        .with_context(|| format!("Failed to open query file {}", queries_path.display()))?;
    let mut queries = Vec::new();
    for line in BufReader::new(file).lines() {
        if let Some(query) = parse_query_line(&line?, debug)? {
            queries.push(query);
        }
    }
    info!(queries = queries.len(), "Resolving query file");

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, remaining queries will be marked cancelled");
            watcher.cancel();
        }
    });

    let names: Vec<String> = queries.iter().map(|q| q.name.clone()).collect();
    let results = orchestrator.resolve_batch_detailed(queries, &cancel).await;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for (name, resolution) in names.iter().zip(&results) {
        let line = serde_json::json!({ "query": name, "result": resolution });
        writeln!(out, "{}", line)?;
    }
    out.flush()?;

    let usage = orchestrator.escalator().usage();
    let stats = orchestrator.cache().stats().await;
    info!(
        oracle_calls = usage.calls,
        oracle_failures = usage.failures,
        cache_hits = stats.hits,
        cache_entries = stats.entries,
        "Resolution run complete"
    );
    Ok(())
}

async fn run_serve(config: &OrgmatchConfig, registry_path: &Path, port: Option<u16>) -> Result<()> {
    let orchestrator = build_orchestrator(config, registry_path).await?;
    let state = AppState::new(Arc::new(orchestrator));
    let shutdown = state.shutdown.clone();
    let app = orgmatch_engine::build_router(state);

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid server.host {}", config.server.host))?;
    let addr = SocketAddr::new(host, port.unwrap_or(config.server.port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
