use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use guestbook::{
    assistant::OpenAiAssistant,
    chain::ChainClient,
    rate_limiter::{RateLimiter, SystemClock},
    server::{self, AppState},
    Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load()?;
    info!(
        port = config.port,
        chain = config.chain.name(),
        contract = %config.contract_address,
        max_requests = config.rate_limit.max_requests,
        window_ms = config.rate_limit.window_ms,
        "Loaded config"
    );
    if config.assistant.api_key.is_empty() {
        warn!("No assistant API key configured; AI endpoints will fail");
    }

    let contract = config.contract()?;
    let reader = ChainClient::new(&config.rpc_url, contract)?;
    info!("Reading guestbook at {:#x} via {}", reader.contract(), config.rpc_url);

    // Simple in-memory rate limiter
    let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

    let state = AppState {
        limiter: rate_limiter,
        reader: Arc::new(reader),
        assistant: Arc::new(OpenAiAssistant::new(&config.assistant)),
        clock: Arc::new(SystemClock),
        chain: config.chain,
        contract,
        page_size: config.feed.page_size,
    };

    let app = server::router(state)
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Guestbook listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
