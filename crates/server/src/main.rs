use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediavault_core::{
    create_event_bus, load_config, validate_config, Codec, Config, FfmpegCodec, JobStore,
    LogFormat, MediaProcessor, MediaStore, ObjectStage, SqliteJobStore, SqliteMediaStore,
    StatusService, WorkerPool,
};
use mediavault_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("MEDIAVAULT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration before logging so its format applies from the first line
    let config: Config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    init_logging(config.logging.format);
    info!(version = VERSION, "Starting mediavault");
    info!("Configuration loaded from {:?}", config_path);

    validate_config(&config).context("Configuration validation failed")?;

    info!("Database path: {:?}", config.database.path);
    info!("Storage backend: {:?}", config.storage.backend);

    // Stores share one database file
    let media_store: Arc<dyn MediaStore> = Arc::new(
        SqliteMediaStore::new(&config.database.path).context("Failed to create media store")?,
    );
    let job_store: Arc<dyn JobStore> = Arc::new(
        SqliteJobStore::new(&config.database.path).context("Failed to create job store")?,
    );
    info!("Stores initialized");

    let stage = ObjectStage::from_config(&config.storage)
        .context("Failed to create object store")?
        .with_scratch_root(config.codec.temp_dir.clone());

    let codec = FfmpegCodec::new(config.codec.clone());
    match codec.validate().await {
        Ok(()) => info!("Codec tools available: {}", codec.name()),
        // Non-video uploads still process without ffmpeg
        Err(e) => warn!(error = %e, "Codec tools unavailable, video transcodes will fail"),
    }

    let processor = Arc::new(MediaProcessor::new(
        Arc::clone(&media_store),
        Arc::clone(&job_store),
        stage,
        Arc::new(codec),
    ));

    // Event bus and workers
    let shutdown = CancellationToken::new();
    let (publisher, subscription) = create_event_bus(config.worker.queue_capacity);
    let pool = Arc::new(WorkerPool::spawn(
        processor,
        subscription,
        config.worker.clone(),
        shutdown.clone(),
    ));

    let state = Arc::new(AppState::new(
        config.clone(),
        publisher,
        StatusService::new(media_store, job_store),
        Arc::clone(&pool),
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // In-flight deliveries are cancelled and recorded as failed
    info!("Server shutting down...");
    shutdown.cancel();
    pool.join().await;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
