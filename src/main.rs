use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signalboard::config::{Config, Secrets};
use signalboard::refresh::start_background_refresh;
use signalboard::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signalboard=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load("dashboard.toml")?;
    info!("Loaded {} feeds from configuration", config.rss.feeds.len());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent("Signalboard/1.0 (News Dashboard)")
        .build()?;

    let state = Arc::new(AppState::new(client, &config, Secrets::from_env()));

    // Start background refresh task
    if config.refresh_interval > 0 {
        let bg_state = state.clone();
        let refresh_interval = config.refresh_interval;
        tokio::spawn(async move {
            start_background_refresh(bg_state, refresh_interval).await;
        });
    }

    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Server starting on http://{}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
