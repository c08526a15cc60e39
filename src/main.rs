//! `oauth_proxy`: authenticating GitHub OAuth2 reverse proxy entrypoint.

use clap::Parser as _;
use eyre::Result;
use oauth_proxy::cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    oauth_proxy::inner_main(cli).await
}
