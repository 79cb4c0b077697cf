use clap::Parser;
use nim_proxy::config::config_search_paths;
use nim_proxy::{build_router, proxy, AppState, ProxyConfig, SharedLogger};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "nim-proxy",
    about = "OpenAI-compatible chat completions proxy for NVIDIA NIM",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Upstream base URL (overrides config and NVIDIA_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Request journal file (JSONL)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nim_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = ProxyConfig::find_and_load(cli.config.as_deref())?;

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(base_url) = cli.base_url {
        config.upstream.base_url = base_url;
    }
    if let Some(log_file) = cli.log_file {
        config.log_file = Some(log_file);
    }

    let logger = match config.log_file {
        Some(ref path) => SharedLogger::new(path)?,
        None => SharedLogger::in_memory(),
    };

    if config.api_key.is_none() {
        warn!(
            "{} is not set; chat completions will fail until it is configured",
            config.upstream.api_key_env
        );
    }

    info!("nim-proxy v{}", env!("CARGO_PKG_VERSION"));
    info!("  Upstream:      {}", config.upstream.base_url);
    info!("  Default model: {}", config.upstream.default_model);
    info!("  Port:          {}", config.port);
    if let Some(ref path) = config.log_file {
        info!("  Journal:       {}", path.display());
    }

    let client = proxy::build_client(&config)?;
    let port = config.port;

    let state = Arc::new(AppState {
        config,
        client,
        logger,
    });

    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);
    info!("  OpenAI compatible endpoint: http://localhost:{}/v1/chat/completions", port);

    axum::serve(listener, app).await?;

    Ok(())
}
