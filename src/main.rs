use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use swapsmith::agent::Pipeline;
use swapsmith::api::HttpBackend;
use swapsmith::bridge::BridgeStore;
use swapsmith::channels::telegram::TelegramChannel;
use swapsmith::channels::web::{self, AppState};
use swapsmith::config::Config;
use swapsmith::executor::WalletProvider;
use swapsmith::executor::rpc::JsonRpcProvider;
use swapsmith::session::SessionStore;

#[derive(Parser)]
#[command(name = "swapsmith", version, about = "Natural-language DeFi command runtime")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web gateway (and the Telegram webhook when configured).
    Serve {
        /// Override GATEWAY_HOST.
        #[arg(long)]
        host: Option<String>,
        /// Override GATEWAY_PORT.
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("swapsmith=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("resolving configuration")?;

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            serve(config).await
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let backend = HttpBackend::new(
        config.backend.base_url.clone(),
        config.backend.credentials.clone(),
    );
    let provider: Arc<dyn WalletProvider> = Arc::new(
        JsonRpcProvider::new(config.provider.rpc_url.clone())
            .with_poll_interval(Duration::from_millis(config.provider.receipt_poll_ms)),
    );
    let sessions = Arc::new(SessionStore::new(config.default_chain_id));
    let bridge = Arc::new(BridgeStore::new(config.bridge.connection_ttl_secs));
    let pipeline = Arc::new(Pipeline::new(Arc::new(backend.clone()), provider.clone()));

    let telegram = match &config.telegram {
        Some(telegram_config) => {
            let channel = Arc::new(TelegramChannel::new(
                telegram_config.bot_token.clone(),
                telegram_config.bot_name.clone(),
                config.gateway.public_url.clone(),
                pipeline.clone(),
                sessions.clone(),
                bridge.clone(),
            ));
            if let Err(err) = channel.register_webhook().await {
                warn!(error = %err, "telegram webhook registration failed; continuing without it");
            }
            Some(channel)
        }
        None => None,
    };

    let state = AppState {
        pipeline,
        http_backend: Some(backend),
        provider,
        sessions,
        bridge,
        telegram,
    };

    web::serve(&config.gateway, state)
        .await
        .context("web gateway exited")
}
