//! ClinicDesk API Server
//!
//! Run with: cargo run --bin clinicdesk-api
//!
//! # Configuration
//!
//! Settings come from the first `config.toml` found in the user config
//! directory, `/etc/clinicdesk/` or the working directory, then
//! `CLINICDESK_*` environment variables on top. `CLINICDESK_CONFIG` points
//! at an explicit file instead. `RUST_LOG` overrides the configured log
//! level.

use clinicdesk::api::{serve, AppState};
use clinicdesk::config::{Config, LoggingConfig, StorageBackend};
use clinicdesk::project::ProjectConfig;
use clinicdesk::store::{DocumentStore, MemoryStore, SqliteStore};
use clinicdesk::websocket::spawn_notification_forwarder;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::var("CLINICDESK_CONFIG") {
        Ok(path) => Config::load_with_env(Path::new(&path))?,
        Err(_) => Config::load_default(),
    };

    init_tracing(&config.logging);

    tracing::info!("Starting ClinicDesk API server v{}", env!("CARGO_PKG_VERSION"));

    let store = open_store(&config)?;
    tracing::info!(backend = store.backend(), "Document store ready");

    let project = ProjectConfig::load_or_embedded(config.project.config_path.as_deref().map(Path::new))?;
    tracing::info!(
        project = %project.project_name,
        entities = project.entities.len(),
        "Project configuration loaded"
    );

    let state = AppState::configured(Arc::clone(&store), project, &config);

    // Push stored notifications to subscribed WebSocket clients
    let forwarder = spawn_notification_forwarder(Arc::clone(&store), state.ws_hub.clone());

    serve(state, &config).await?;

    forwarder.abort();
    tracing::info!("ClinicDesk API server stopped");

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("clinicdesk={},tower_http=debug", logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn open_store(config: &Config) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on shutdown");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Sqlite => {
            let path = Path::new(&config.storage.path);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            tracing::info!(path = ?path, "Opening SQLite store");
            Ok(Arc::new(SqliteStore::open(path)?))
        }
    }
}
