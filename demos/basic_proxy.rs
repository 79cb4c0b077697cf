//! Start a nim-proxy server programmatically.
//!
//! Usage:
//!   export NVIDIA_API_KEY=nvapi-your-key
//!   cargo run --example basic_proxy

use nim_proxy::{build_router, proxy, AppState, ProxyConfig, SharedLogger};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ProxyConfig::find_and_load(None)?;

    println!("Upstream: {}", config.upstream.base_url);
    println!("Default model: {}", config.upstream.default_model);

    let logger = SharedLogger::new("nim-proxy-example.jsonl")?;
    let client = proxy::build_client(&config)?;

    let port = config.port;
    let state = Arc::new(AppState {
        config,
        client,
        logger,
    });

    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("Listening on http://{}", addr);
    println!();
    println!("  OPENAI_BASE_URL=http://localhost:{}/v1", port);

    axum::serve(listener, app).await?;
    Ok(())
}
