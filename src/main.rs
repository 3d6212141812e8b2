use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use urolaser_leads::config::Config;
use urolaser_leads::api::handlers::AppState;
use urolaser_leads::api::routes::{build_router, RateLimit};

/// Main entry point for the lead service.
///
/// Initializes tracing, loads configuration (failing fast on missing Evolution
/// API settings), builds shared state and serves the HTTP API.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "urolaser_leads=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let port = config.port;

    let state = Arc::new(AppState::from_config(config));
    if !state.notifier.validate_config() {
        anyhow::bail!("Evolution API configuration is incomplete");
    }
    tracing::info!(
        "✓ Evolution notifier ready (default recipient {})",
        state.notifier.default_recipient()
    );
    tracing::info!("Analytics sinks: {:?}", state.analytics.sink_names());
    tracing::info!(
        "Minimum submit duration: lead {:?}, enrollment {:?}",
        state.lead_pipeline.min_duration(),
        state.enrollment_pipeline.min_duration()
    );

    let app = build_router(state, Some(RateLimit::default()))?;

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
