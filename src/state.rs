//! Two-generation ephemeral store for in-flight OAuth2 login context.
//!
//! Mirrors the teacher's `tokio::select!` + shutdown-signal background-task
//! idiom: a single ticker task shifts generations and can be stopped via a
//! `watch` signal on teardown.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use axum::http::uri::PathAndQuery;
use rand::RngCore as _;
use tokio::sync::watch;
use tracing::debug;

use crate::registry::Proxy;

/// Verified identity attached to a [`LoginState`] after `/oauth2/callback`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub(crate) struct UserInfo {
    #[serde(rename = "login")]
    pub(crate) name: String,
    pub(crate) email: String,
}

/// Server-side scratch record tying a provider callback back to the original
/// request and to a [`Proxy`].
///
/// `original_url` is the inbound request's path and query only -- never an
/// absolute URL -- so the post-login redirect stays relative to whatever
/// scheme/host the browser is already talking to.
#[derive(Debug, Clone)]
pub(crate) struct LoginState {
    pub(crate) name: String,
    pub(crate) proxy: Arc<Proxy>,
    pub(crate) original_url: PathAndQuery,
    pub(crate) user: Option<UserInfo>,
}

struct Generations {
    fresh: HashMap<String, LoginState>,
    aging: HashMap<String, LoginState>,
}

/// Process-wide store of [`LoginState`] entries, keyed by opaque state token.
pub(crate) struct StateStore {
    generations: Mutex<Generations>,
}

impl StateStore {
    pub(crate) fn new() -> Self {
        Self {
            generations: Mutex::new(Generations {
                fresh: HashMap::new(),
                aging: HashMap::new(),
            }),
        }
    }

    /// Generates a fresh 32-byte, hex-encoded (64 char) state token.
    pub(crate) fn generate_token() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Inserts a new login context into the fresh generation.
    pub(crate) fn add(&self, name: String, proxy: Arc<Proxy>, original_url: PathAndQuery) {
        debug!(state = %name, url = %original_url, "state add");
        let mut gens = self.generations.lock().unwrap_or_else(|e| e.into_inner());
        gens.fresh.insert(
            name.clone(),
            LoginState {
                name,
                proxy,
                original_url,
                user: None,
            },
        );
    }

    /// Returns the state if present in either generation, without removing it.
    pub(crate) fn get(&self, name: &str) -> Option<LoginState> {
        let gens = self.generations.lock().unwrap_or_else(|e| e.into_inner());
        gens.fresh
            .get(name)
            .or_else(|| gens.aging.get(name))
            .cloned()
    }

    /// Sets the verified user on an existing state, in either generation.
    pub(crate) fn set_user(&self, name: &str, user: UserInfo) {
        let mut gens = self.generations.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(state) = gens.fresh.get_mut(name) {
            state.user = Some(user);
        } else if let Some(state) = gens.aging.get_mut(name) {
            state.user = Some(user);
        }
    }

    /// Returns the state if present and removes it from both generations.
    pub(crate) fn acquire(&self, name: &str) -> Option<LoginState> {
        let mut gens = self.generations.lock().unwrap_or_else(|e| e.into_inner());
        gens.fresh
            .remove(name)
            .or_else(|| gens.aging.remove(name))
    }

    /// Shifts fresh -> aging and empties fresh, dropping whatever was in aging.
    fn tick(&self) {
        let mut gens = self.generations.lock().unwrap_or_else(|e| e.into_inner());
        debug!(fresh = gens.fresh.len(), aging = gens.aging.len(), "state store gc");
        gens.aging = std::mem::take(&mut gens.fresh);
    }
}

/// Spawns the background generation-shifting ticker. Returns a sender that
/// stops the ticker when dropped or sent `true`.
pub(crate) fn spawn_ticker(store: Arc<StateStore>, state_timeout: Duration) -> watch::Sender<bool> {
    let (stop_tx, mut stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state_timeout);
        interval.tick().await; // first tick fires immediately, skip it
        loop {
            tokio::select! {
                _ = interval.tick() => store.tick(),
                _ = stop_rx.changed() => {
                    debug!("stopping state store ticker");
                    break;
                }
            }
        }
    });
    stop_tx
}
