//! Library entry for the `oauth_proxy` crate.
//!
//! Exposes [`inner_main`] so the thin `main.rs` shim and the integration
//! test suite under `tests/` can both drive the real server startup path.

pub mod app;
pub mod cli;
pub mod config;
pub(crate) mod crypto;
pub(crate) mod error;
pub mod http;
pub(crate) mod provider;
pub(crate) mod proxy_engine;
pub(crate) mod registry;
pub(crate) mod session;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use eyre::{Result, WrapErr as _};
use tokio::{net, signal};
use tracing::info;

use cli::Cli;

/// Resolves when a termination signal arrives, so the server can shut down
/// the background state-store ticker cleanly before exiting.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = signal::ctrl_c() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
    }
}

/// The proxy's main function; can be called from the `main.rs` shim or from
/// integration tests that want to drive a real listener.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the proxy
/// registry fails to build, or the listener cannot bind.
pub async fn inner_main(cli: Cli) -> Result<()> {
    info!(path = %cli.config.display(), "loading configuration");
    let loaded = config::load(&cli.config)
        .await
        .wrap_err("failed to load configuration")?;

    let bind = cli.bind.unwrap_or_else(|| loaded.server.bind.clone());
    let port = cli.port.unwrap_or(loaded.server.port);
    let state_timeout = Duration::from_secs(loaded.oauth.state_timeout);

    let state = app::build_state(loaded)?;
    let ticker_stop = state::spawn_ticker(Arc::clone(&state.state_store), state_timeout);

    let app = http::create_app(state);

    let addr: SocketAddr = format!("{bind}:{port}")
        .parse()
        .wrap_err("invalid server.bind/server.port")?;

    info!(%addr, "oauth_proxy listening");
    let listener = net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("failed to bind {addr}"))?;

    tokio::select! {
        res = axum::serve(listener, app) => res.wrap_err("server error")?,
        () = shutdown_signal() => {
            info!("received shutdown signal");
        }
    }

    let _ = ticker_stop.send(true);
    Ok(())
}
