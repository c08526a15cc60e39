//! Configuration data types, deserialized from TOML.

use secrecy::SecretString;
use serde::Deserialize;

/// `[oauth]` section: global defaults inherited by any `[[proxy]]` entry that
/// leaves the corresponding field unset.
#[derive(Debug, Deserialize)]
pub(crate) struct OauthDefaults {
    pub(crate) provider: String,
    pub(crate) client_id: String,
    pub(crate) client_secret: SecretString,
    pub(crate) callback_uri: String,
    /// Seconds; effective state lifetime is between this and `2x` this value.
    pub(crate) state_timeout: u64,
    /// Seconds until the session cookie expires.
    pub(crate) cookie_timeout: u64,
    pub(crate) cookie_name: String,
    pub(crate) check_version: bool,
    /// Whether to set `Secure`/`HttpOnly` on the session cookie. Defaults to
    /// `true` when omitted; not present in the original source, added per
    /// the spec's open question on modern-browser cookie hardening.
    #[serde(default)]
    pub(crate) cookie_secure: Option<bool>,
}

/// A single `[[proxy]]` entry as read from the config file, pre-default-fill.
#[derive(Debug, Deserialize)]
pub(crate) struct ProxyEntry {
    pub(crate) request_host: String,
    pub(crate) scheme: String,
    pub(crate) end_point: String,
    #[serde(default)]
    pub(crate) preserve_host: bool,
    #[serde(default)]
    pub(crate) provider: String,
    #[serde(default)]
    pub(crate) client_id: String,
    #[serde(default)]
    pub(crate) client_secret: String,
    #[serde(default)]
    pub(crate) callback_uri: String,
    #[serde(default)]
    pub(crate) organizations: Vec<String>,
    #[serde(default)]
    pub(crate) teams: Vec<String>,
    #[serde(default)]
    pub(crate) whitelists: Vec<String>,
}

/// `[general]` section.
#[derive(Debug, Deserialize)]
pub(crate) struct GeneralConfig {
    pub(crate) secret: SecretString,
}

/// `[server]` section: the HTTP listener's own bind address, independent of
/// the upstream proxies it dispatches to.
#[derive(Debug, Deserialize)]
pub(crate) struct ServerConfig {
    #[serde(default = "default_bind")]
    pub(crate) bind: String,
    #[serde(default = "default_port")]
    pub(crate) port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

/// Root config structure.
#[derive(Debug, Deserialize)]
pub(crate) struct Config {
    pub(crate) oauth: OauthDefaults,
    #[serde(rename = "proxy", default)]
    pub(crate) proxies: Vec<ProxyEntry>,
    pub(crate) general: GeneralConfig,
    #[serde(default)]
    pub(crate) server: ServerConfig,
}
