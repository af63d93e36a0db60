use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use faceswap_core::provisioner::{ProvisionEvent, ProvisionEventCallback};
use faceswap_core::{
    load_config, load_config_from_env, validate_config, Config, ConfigError, FaceSwapPipeline,
    HttpFetcher, ProvisionState, Provisioner, SwapEvent, SwapEventCallback, SwapOrchestrator,
    SystemBackend, Workspace,
};

use faceswap_server::{create_router, AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
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

    info!("swapd {}", VERSION);

    // Determine config path
    let config_path = std::env::var("SWAPD_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    let config = load(&config_path)?;
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        config_hash = &config_hash[..16],
        root = %config.workspace.root.display(),
        output_layout = ?config.workspace.output_layout,
        "Configuration loaded successfully"
    );

    // Workspace
    let workspace = Arc::new(Workspace::new(config.workspace.clone()));
    workspace
        .ensure_dirs()
        .await
        .with_context(|| format!("Failed to create workspace at {:?}", workspace.root()))?;

    // Provisioner
    let backend = Arc::new(
        SystemBackend::new(&config.provisioner).context("Failed to create provisioning backend")?,
    );
    let provisioner = Arc::new(
        Provisioner::new(
            backend,
            config.provisioner.dependencies(&workspace),
            Arc::new(ProvisionState::new()),
        )
        .with_event_callback(provision_logger()),
    );
    info!(
        dependencies = provisioner.dependencies().len(),
        backend = provisioner.backend_name(),
        "Provisioner initialized"
    );

    // Fetcher
    let fetcher = Arc::new(
        HttpFetcher::new(config.fetcher.clone()).context("Failed to create asset fetcher")?,
    );

    // Pipeline
    let pipeline = Arc::new(FaceSwapPipeline::new(
        config.pipeline.clone(),
        workspace.root().to_path_buf(),
    ));
    info!(
        interpreter = %config.pipeline.interpreter.display(),
        script = %config.pipeline.script.display(),
        max_concurrent = config.pipeline.max_concurrent,
        "Pipeline runner initialized"
    );

    // Orchestrator
    let orchestrator = Arc::new(
        SwapOrchestrator::new(
            config.orchestrator.clone(),
            Arc::clone(&workspace),
            Arc::clone(&provisioner),
            fetcher,
            pipeline,
        )
        .with_event_callback(swap_logger()),
    );

    if config.provisioner.provision_on_startup {
        info!("Provisioning dependencies before serving");
        match provisioner.ensure_all().await {
            Ok(outcomes) => {
                for (name, readiness) in outcomes {
                    info!(dependency = %name, ?readiness, "Dependency ready");
                }
            }
            // Keep serving: /api/v1/provision reports the failure and can retry.
            Err(e) => error!(error = %e, "Startup provisioning failed"),
        }
    }

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), orchestrator));

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

/// Loads the config file, or defaults plus environment when there is none.
fn load(path: &Path) -> Result<Config> {
    info!("Loading configuration from {:?}", path);
    match load_config(path) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound(_)) => {
            warn!("No config file at {:?}, using defaults and environment", path);
            load_config_from_env().context("Failed to load config from environment")
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load config from {:?}", path)),
    }
}

fn provision_logger() -> ProvisionEventCallback {
    Arc::new(|event: &ProvisionEvent| match event {
        ProvisionEvent::DownloadProgress {
            dependency,
            downloaded_bytes,
            total_bytes,
        } => debug!(%dependency, downloaded_bytes, ?total_bytes, "Download progress"),
        other => debug!(event = ?other, "Provisioning event"),
    })
}

fn swap_logger() -> SwapEventCallback {
    Arc::new(|event: &SwapEvent| debug!(event = ?event, "Swap event"))
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
