mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use galleyforge_core::{
    create_authenticator, load_config, validate_config,
    ots::{ConversionClient, HttpOtsClient},
    progress::{FileProgressStore, ProgressStore},
    submission::{FsGalleyAttacher, FsSubmissionRepository},
    tracker::{JobTracker, SqliteJobTracker},
    AccessKeyValidator, Authenticator, BatchConfig, BatchOrchestrator,
};

use api::create_router;
use state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = galleyforge_core::config::config_path_from_env();

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Auth method: {:?}", config.auth.method);
    info!("Database path: {:?}", config.database.path);

    // Log a config fingerprint so deployments are distinguishable in logs
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(version = VERSION, config_fingerprint = &config_hash[..16], "starting galleyforge");

    // Create authenticator
    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    // Batch access key gate (independent of transport auth)
    let access_key_validator = AccessKeyValidator::new(config.auth.batch_access_key.clone());
    if config.auth.batch_access_key.is_none() {
        info!("No batch access key configured, batch triggering disabled");
    }

    // Create SQLite job tracker
    let tracker: Arc<dyn JobTracker> = Arc::new(
        SqliteJobTracker::new(&config.database.path).context("Failed to create job tracker")?,
    );
    info!("Job tracker initialized");

    // Durable batch progress store
    let progress: Arc<dyn ProgressStore> =
        Arc::new(FileProgressStore::new(config.batch.progress_path.clone()));
    info!("Progress store at {:?}", config.batch.progress_path);

    // Create conversion service client if configured
    let client: Option<Arc<dyn ConversionClient>> = match &config.ots {
        Some(ots_config) => {
            info!("Initializing conversion service client at {}", ots_config.url);
            let client =
                HttpOtsClient::new(ots_config.clone()).context("Failed to create OTS client")?;
            Some(Arc::new(client))
        }
        None => {
            info!("No conversion service configured, conversion endpoints disabled");
            None
        }
    };

    // Submission spool and galley attachment
    let repository = Arc::new(FsSubmissionRepository::new(config.batch.spool_dir.clone()));
    let attacher = Arc::new(FsGalleyAttacher::new(config.batch.spool_dir.clone()));

    // Create orchestrator when the conversion service is available
    let orchestrator = client.as_ref().map(|client| {
        Arc::new(BatchOrchestrator::new(
            BatchConfig::from(&config.batch),
            Arc::clone(client),
            Arc::clone(&tracker),
            Arc::clone(&progress),
            repository,
            attacher,
        ))
    });
    if orchestrator.is_some() {
        info!("Batch orchestrator initialized");
    }

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        authenticator,
        access_key_validator,
        tracker,
        progress,
        client,
        orchestrator,
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

    info!("Server shut down");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
