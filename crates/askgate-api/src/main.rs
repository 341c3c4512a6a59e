use anyhow::{Context, Result};
use askgate_api::{AppState, Server};
use askgate_core::Settings;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "askgate")]
#[command(about = "Question answering over a private corpus with validated answers", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding default.toml, <env>.toml and local.toml
    #[arg(long, env = "ASKGATE_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Environment overlay to load (e.g. production)
    #[arg(long, env = "ASKGATE_ENV")]
    env: Option<String>,

    /// Bind address, overrides server.host
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port, overrides server.port
    #[arg(long)]
    port: Option<u16>,

    /// Corpus snapshot (JSONL), overrides corpus.path
    #[arg(long)]
    corpus: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let env_name = cli.env.clone().unwrap_or_else(|| "development".to_string());

    let mut settings = Settings::load_from_sources(&cli.config_dir, &env_name)
        .with_context(|| format!("failed to load settings from {}", cli.config_dir.display()))?;
    if let Some(host) = cli.host {
        settings.server.host = host.to_string();
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(corpus) = cli.corpus {
        settings.corpus.path = Some(corpus);
    }
    settings.validate().context("invalid settings")?;

    init_tracing(&settings.logging.level);
    info!("starting askgate ({} environment)", settings.env);

    let host: IpAddr = settings
        .server
        .host
        .parse()
        .with_context(|| format!("invalid server.host '{}'", settings.server.host))?;
    let addr = SocketAddr::new(host, settings.server.port);

    let state = AppState::from_settings(settings)?;
    Server::new(state, addr).run().await
}

fn init_tracing(level: &str) {
    let default_filter = format!(
        "askgate_api={level},askgate_rag={level},askgate_retrieval={level},askgate_ai={level},askgate_core={level},tower_http=info"
    );
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
