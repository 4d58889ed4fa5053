use kiosk_board::{
    app_state::AppState,
    build_app,
    cache::SampledValueCache,
    config::Config,
    database::SqliteStore,
    sampler::Sampler,
    sensor::SysfsSensor,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    info!("Initializing database {}...", config.database_file);
    let store = Arc::new(SqliteStore::open(&config.database_file).await?);

    let temperature = SampledValueCache::new();
    let state = AppState::new(store, temperature.clone());

    // Tâche d'échantillonnage, une seule par processus.
    let sampler_task = match &config.sensor_path {
        Some(path) => {
            info!("Temperature sensor at {}", path.display());
            let sensor = Arc::new(SysfsSensor::new(path));
            Some(Sampler::new(sensor, temperature, config.sampling).spawn())
        }
        None => {
            warn!("SENSOR_PATH not set, /api/temperature will answer 503");
            None
        }
    };

    if !config.static_dir.is_dir() {
        warn!("Static directory {:?} not found, / will answer 404", config.static_dir);
    }
    let app = build_app(state, &config.static_dir);

    info!("Server starting on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(task) = sampler_task {
        task.abort();
    }
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
