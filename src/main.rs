use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use kinfeed::config::{Cli, Config};
use kinfeed::db;
use kinfeed::routes;
use kinfeed::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(config.db_path())?;
    db::run_migrations(&pool)?;

    let policy = config.retry.policy();
    tracing::info!(
        attempts = policy.max_attempts(),
        delay_ms = policy.delay().as_millis() as u64,
        "Storage retry policy"
    );

    let state = AppState::new(pool, config.clone());

    // Test-only seed endpoint: creates a user + session, returns session cookie
    let test_seed = std::env::var("KINFEED_TEST_SEED").is_ok();
    if test_seed {
        tracing::warn!("KINFEED_TEST_SEED is set, mounting /test/seed");
    }
    let app = routes::build_router(state, test_seed);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
