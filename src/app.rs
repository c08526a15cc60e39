//! Process-wide application state, assembled once at startup and shared
//! (cheaply, via `Arc`) into every request.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::types::Config;
use crate::provider::Provider;
use crate::registry::ProxyRegistry;
use crate::state::StateStore;

/// Process-wide state `S`: the AES key, the proxy registry, the OAuth2
/// defaults, the state store, and the random epoch that invalidates
/// sessions across restarts. Handlers receive it as `State<Arc<Inner>>`.
pub(crate) struct Inner {
    pub(crate) key: [u8; 32],
    pub(crate) registry: ProxyRegistry,
    pub(crate) state_store: Arc<StateStore>,
    pub(crate) cookie_name: String,
    pub(crate) cookie_timeout: u64,
    pub(crate) cookie_secure: bool,
    pub(crate) check_version: bool,
    pub(crate) version: i64,
    pub(crate) reqwest_client: reqwest::Client,
    pub(crate) providers: HashMap<String, Arc<dyn Provider>>,
}

/// Loads a `Config` into a fully-initialized, `Arc`-shared [`Inner`],
/// deriving the AES key and building the proxy registry. Fatal configuration
/// errors bail out here, before the HTTP listener binds.
pub(crate) fn build_state(config: Config) -> eyre::Result<Arc<Inner>> {
    let key = crate::crypto::derive_key(&config.general.secret)?;
    let registry = ProxyRegistry::build(config.proxies, &config.oauth)?;
    let version = rand::random::<i64>();
    let cookie_secure = config.oauth.cookie_secure.unwrap_or(true);
    let reqwest_client = reqwest::Client::new();
    let providers = crate::provider::build_registry();
    Ok(Arc::new(Inner {
        key,
        registry,
        state_store: Arc::new(StateStore::new()),
        cookie_name: config.oauth.cookie_name,
        cookie_timeout: config.oauth.cookie_timeout,
        cookie_secure,
        check_version: config.oauth.check_version,
        version,
        reqwest_client,
        providers,
    }))
}
