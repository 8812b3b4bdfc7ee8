//! Equipment Catalog server

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use equipment_catalog::{
    api,
    blobs::FsBlobStore,
    config::{AppConfig, DatabaseConfig, LoggingConfig, StorageBackend},
    repository::{MemoryRepository, PgRepository, Repository},
    services::Services,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Held until shutdown so buffered file logs are flushed
    let _log_guard = init_tracing(&config.logging);

    tracing::info!("Starting Equipment Catalog v{}", env!("CARGO_PKG_VERSION"));

    let repository: Repository = match config.storage.backend {
        StorageBackend::Postgres => Arc::new(PgRepository::new(connect(&config.database).await?)),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data is lost on shutdown");
            Arc::new(MemoryRepository::new())
        }
    };

    let blobs = Arc::new(FsBlobStore::new(&config.uploads.directory));
    let services = Services::new(repository, blobs, &config);
    services
        .auth
        .ensure_bootstrap_admin()
        .await
        .context("Failed to create bootstrap administrator")?;

    let addr = SocketAddr::new(
        config
            .server
            .host
            .parse()
            .with_context(|| format!("Invalid host address {}", config.server.host))?,
        config.server.port,
    );
    let rate_limit = config.rate_limit.clone();

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let mut app = api::create_router(state);
    if rate_limit.enabled {
        let governor = GovernorConfigBuilder::default()
            .per_second(rate_limit.per_second)
            .burst_size(rate_limit.burst_size)
            .finish()
            .context("Invalid rate limit configuration")?;
        app = app.layer(GovernorLayer {
            config: Arc::new(governor),
        });
        tracing::info!(
            per_second = rate_limit.per_second,
            burst_size = rate_limit.burst_size,
            "Rate limiting enabled"
        );
    }

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Console output in the configured format, plus daily JSON files when a directory is set
fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("equipment_catalog={},tower_http=debug", config.level).into());

    let json = config.format.eq_ignore_ascii_case("json");
    let console_json = json.then(|| fmt::layer().json());
    let console_pretty = (!json).then(fmt::layer);

    let (file_layer, guard) = match config.directory.as_deref() {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "equipment-catalog.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().json().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_json)
        .with(console_pretty)
        .with(file_layer)
        .init();

    guard
}

async fn connect(config: &DatabaseConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect(&config.url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations completed");

    Ok(pool)
}
