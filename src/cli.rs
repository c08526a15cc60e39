//! Command-line interface definition for the `oauth_proxy` binary.

use std::path::PathBuf;

use clap::Parser;

/// Command-line arguments for the proxy process.
#[derive(Debug, Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "oauth_proxy.toml")]
    pub config: PathBuf,

    /// Override the `[server].bind` address from the config file.
    #[arg(long)]
    pub bind: Option<String>,

    /// Override the `[server].port` from the config file.
    #[arg(long)]
    pub port: Option<u16>,
}
