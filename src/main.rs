//! Adaptive Cache Demo Binary
//!
//! Builds a cache from a YAML file and/or flags, drives a synthetic mixed
//! read/write workload against it, serves Prometheus metrics while it runs
//! and prints the final analytics report as JSON.
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │   Workload   │───▶│ AdaptiveCache│───▶│   Exporter   │──▶ /metrics
//! │  (get/set)   │    │ + scheduler  │    │ (prometheus) │
//! └──────────────┘    └──────────────┘    └──────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use adaptive_cache::cache::{AdaptiveCache, CacheConfig, EvictionStrategy, Priority, SetOptions};
use adaptive_cache::error::{Error, Result};
use adaptive_cache::exporter::CacheExporter;
use adaptive_cache::persistence::{JsonFilePatternStore, PatternStore};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Adaptive Cache - pattern-learning in-process cache demo
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "CACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Memory budget in bytes (overrides the config file)
    #[arg(long, env = "CACHE_MAX_SIZE_BYTES")]
    max_size_bytes: Option<u64>,

    /// Eviction strategy: lru, lfu, fifo, adaptive, predictive
    #[arg(long, env = "CACHE_STRATEGY")]
    strategy: Option<EvictionStrategy>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// File used to persist access patterns between runs
    #[arg(long, env = "CACHE_PATTERNS_FILE")]
    patterns_file: Option<PathBuf>,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "127.0.0.1:9184")]
    metrics_addr: String,

    /// Number of synthetic operations to run
    #[arg(long, env = "CACHE_WORKLOAD_OPS", default_value = "10000")]
    workload_ops: u64,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = build_config(&args)?;
    info!("Starting adaptive cache");
    info!("  Memory budget: {} bytes", config.max_size_bytes);
    info!("  Strategy: {}", config.strategy);
    info!("  Budget mode: {:?}", config.budget_mode);
    info!("  Workload ops: {}", args.workload_ops);

    let cache = AdaptiveCache::new(config)?;
    let store: Option<Arc<dyn PatternStore>> = args
        .patterns_file
        .as_ref()
        .map(|path| Arc::new(JsonFilePatternStore::new(path)) as Arc<dyn PatternStore>);

    let handle = cache.start(store).await;
    let exporter = Arc::new(CacheExporter::new()?);

    let server_cache = Arc::clone(&cache);
    let server_exporter = Arc::clone(&exporter);
    let metrics_addr = args.metrics_addr.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr, server_cache, server_exporter).await {
            error!("Metrics server error: {}", e);
        }
    });

    tokio::select! {
        _ = run_workload(&cache, args.workload_ops) => {
            info!("Workload complete");
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping workload");
        }
    }

    exporter.refresh(&cache.get_metrics());
    let report = cache.get_analytics();
    println!("{}", serde_json::to_string_pretty(&report)?);

    server.abort();
    handle.shutdown().await;

    info!("Adaptive cache shutdown complete");
    Ok(())
}

fn build_config(args: &Args) -> Result<CacheConfig> {
    let mut config = match &args.config {
        Some(path) => CacheConfig::from_file(path)?,
        None => CacheConfig::default(),
    };
    if let Some(max) = args.max_size_bytes {
        config.max_size_bytes = max;
    }
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    config.validate()?;
    Ok(config)
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},hyper=warn", level)));

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Workload
// =============================================================================

/// Skewed workload: most reads go to a small hot set, writes cycle through
/// a larger key space with a mix of payload sizes and priorities.
async fn run_workload(cache: &AdaptiveCache, ops: u64) {
    const HOT_KEYS: u64 = 16;
    const COLD_KEYS: u64 = 512;

    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    for i in 0..ops {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;

        let hot = state % 10 < 7;
        let key = if hot {
            format!("hot:{}", state % HOT_KEYS)
        } else {
            format!("cold:{}", state % COLD_KEYS)
        };

        if state % 4 == 0 || cache.get_bytes(&key).is_none() {
            let payload = "v".repeat(((state >> 8) % 4096) as usize + 16);
            let options = SetOptions::new()
                .ttl(Duration::from_secs(30 + state % 600))
                .computation_cost((state % 10) as u8 + 1)
                .tag(if hot { "hot" } else { "cold" });
            let options = if hot && state % 16 == 0 {
                options.priority(Priority::Critical)
            } else {
                options
            };

            if let Err(e) = cache.set(&key, &payload, options) {
                warn!(key = %key, error = %e, "Workload write rejected");
            }
        }

        if i % 1000 == 0 {
            // Let the scheduler and metrics server run
            tokio::task::yield_now().await;
        }
    }
}

// =============================================================================
// Metrics Server
// =============================================================================

async fn run_metrics_server(
    addr: &str,
    cache: Arc<AdaptiveCache>,
    exporter: Arc<CacheExporter>,
) -> Result<()> {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::header::{HeaderValue, CONTENT_TYPE};
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use tokio::net::TcpListener;

    fn respond(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(body.into()));
        *response.status_mut() = status;
        response
    }

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Internal(format!("Invalid metrics server address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind metrics server: {}", e)))?;

    info!("Metrics server listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("Metrics server accept error: {}", e)))?;

        let io = TokioIo::new(stream);
        let cache = Arc::clone(&cache);
        let exporter = Arc::clone(&exporter);

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let cache = Arc::clone(&cache);
                let exporter = Arc::clone(&exporter);
                async move {
                    let response = match req.uri().path() {
                        "/metrics" => {
                            exporter.refresh(&cache.get_metrics());
                            match exporter.encode() {
                                Ok(text) => {
                                    let mut response = respond(StatusCode::OK, text);
                                    response.headers_mut().insert(
                                        CONTENT_TYPE,
                                        HeaderValue::from_static(prometheus::TEXT_FORMAT),
                                    );
                                    response
                                }
                                Err(e) => respond(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
                            }
                        }
                        "/healthz" => respond(StatusCode::OK, "ok"),
                        _ => respond(StatusCode::NOT_FOUND, "not found"),
                    };
                    Ok::<_, std::convert::Infallible>(response)
                }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Metrics server connection error: {}", e);
            }
        });
    }
}
