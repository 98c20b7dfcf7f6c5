use bitshard_core::backend::BackendContext;
use bitshard_core::config;
use bitshard_core::storage::{read_metadata, read_vectors, split_corpus};
use bitshard_server::api::coordinator::CoordinatorAppState;
use bitshard_server::api::worker::WorkerAppState;
use bitshard_server::api::{create_coordinator_router, create_worker_router};
use bitshard_server::coordinator::{Coordinator, CoordinatorConfig};
use bitshard_server::worker::ShardWorker;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bitshard", about = "Sharded binary-quantized vector search")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve one shard over HTTP
    Worker {
        /// Shard this worker serves
        #[arg(long, env = "SHARD_ID")]
        shard_id: u32,

        /// Directory holding shard artifacts
        #[arg(long, env = "DATA_DIR", default_value = config::DEFAULT_DATA_DIR)]
        data_dir: PathBuf,

        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value_t = config::DEFAULT_WORKER_PORT)]
        port: u16,

        /// Embedding dimension reported before the shard is loaded
        #[arg(long, default_value_t = config::DEFAULT_DIMENSION)]
        vector_dim: usize,

        /// Disable the accelerated Hamming backend
        #[arg(long, default_value_t = false)]
        scalar_only: bool,
    },

    /// Fan queries out to every worker and merge the results
    Coordinator {
        /// Worker base URLs in shard order (comma-separated)
        #[arg(long, env = "WORKER_URLS", value_delimiter = ',', required = true)]
        worker_urls: Vec<String>,

        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value_t = config::DEFAULT_COORDINATOR_PORT)]
        port: u16,

        /// Embedding service endpoint for text queries
        #[arg(long, env = "EMBEDDER_URL")]
        embedder_url: Option<String>,

        /// Deadline for the whole fan-out, in milliseconds
        #[arg(long, env = "FANOUT_TIMEOUT_MS", default_value_t = config::DEFAULT_FANOUT_TIMEOUT_MS)]
        fanout_timeout_ms: u64,
    },

    /// Split a corpus into contiguous shards
    Split {
        /// Packed vectors file (.bqv or uint8 .npy)
        #[arg(long)]
        vectors: PathBuf,

        /// Metadata JSON array, one object per row
        #[arg(long)]
        metadata: PathBuf,

        /// Number of shards
        #[arg(long, default_value_t = config::DEFAULT_SHARD_COUNT)]
        shards: usize,

        /// Output directory
        #[arg(short, long, default_value = config::DEFAULT_DATA_DIR)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(
                    "bitshard_server=info"
                        .parse()
                        .expect("valid directive literal"),
                )
                .add_directive("bitshard_core=info".parse().expect("valid directive literal")),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Command::Worker {
            shard_id,
            data_dir,
            port,
            vector_dim,
            scalar_only,
        } => run_worker(shard_id, data_dir, port, vector_dim, scalar_only).await,
        Command::Coordinator {
            worker_urls,
            port,
            embedder_url,
            fanout_timeout_ms,
        } => {
            let config = CoordinatorConfig {
                worker_urls,
                fanout_timeout: Duration::from_millis(fanout_timeout_ms),
                embedder_url,
            };
            run_coordinator(config, port).await
        }
        Command::Split {
            vectors,
            metadata,
            shards,
            output,
        } => {
            let matrix = read_vectors(&vectors)?;
            let records = read_metadata(&metadata)?;
            let manifest = split_corpus(matrix, records, shards, &output)?;
            tracing::info!(
                total_rows = manifest.total_rows,
                shards = manifest.shards.len(),
                output = ?output,
                "Split complete"
            );
            Ok(())
        }
    }
}

async fn run_worker(
    shard_id: u32,
    data_dir: PathBuf,
    port: u16,
    vector_dim: usize,
    scalar_only: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if port == 0 {
        eprintln!("Error: port must be > 0");
        std::process::exit(1);
    }

    let backend = BackendContext::from_preference(!scalar_only);
    let worker = Arc::new(ShardWorker::with_backend(
        shard_id, data_dir, backend, vector_dim,
    ));

    // Serve health checks while the shard loads.
    let loader = Arc::clone(&worker);
    tokio::spawn(async move {
        if let Err(e) = loader.load().await {
            tracing::error!(shard_id, error = %e, "Initial shard load failed, POST /admin/reload to retry");
        }
    });

    let prometheus_handle =
        metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    let app = create_worker_router(WorkerAppState {
        worker,
        prometheus_handle,
    });

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!(shard_id, "Worker listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal())
        .await?;
    Ok(())
}

async fn run_coordinator(
    config: CoordinatorConfig,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    if port == 0 {
        eprintln!("Error: port must be > 0");
        std::process::exit(1);
    }
    if config.worker_urls.is_empty() {
        eprintln!("Error: at least one worker URL is required");
        std::process::exit(1);
    }

    tracing::info!(
        workers = config.worker_urls.len(),
        fanout_timeout_ms = config.fanout_timeout.as_millis() as u64,
        embedder = config.embedder_url.is_some(),
        "Coordinator configured"
    );
    let coordinator = Arc::new(Coordinator::new(config));

    let prometheus_handle =
        metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    let app = create_coordinator_router(CoordinatorAppState {
        coordinator,
        prometheus_handle,
    });

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("Coordinator listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal())
        .await?;
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }

    tracing::info!("Shutting down gracefully, draining in-flight requests...");
}
