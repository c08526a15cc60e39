//! Immutable-after-startup mapping from request `Host` to a [`Proxy`] record.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use eyre::{Context as _, Result, bail};
use regex::Regex;
use secrecy::SecretString;
use url::Url;

use crate::config::types::{OauthDefaults, ProxyEntry};

/// Sentinel method matching any HTTP verb, spelled `ANY` in the config DSL.
const ANY_METHOD: &str = "ANY";

/// A single compiled `{method, path-regex}` whitelist rule.
pub(crate) struct WhitelistRule {
    method: String,
    regex: Regex,
}

impl WhitelistRule {
    fn matches(&self, method: &str, trimmed_path: &str) -> bool {
        (self.method == ANY_METHOD || self.method.eq_ignore_ascii_case(method))
            && self.regex.is_match(trimmed_path)
    }
}

/// A configured virtual host: its upstream URL, OAuth2 credentials, allowed
/// identities, and whitelist. Built once at startup; read-only thereafter.
pub(crate) struct Proxy {
    pub(crate) request_host: String,
    pub(crate) scheme: String,
    pub(crate) endpoint: Url,
    pub(crate) preserve_host: bool,
    pub(crate) provider: String,
    pub(crate) client_id: String,
    pub(crate) client_secret: SecretString,
    pub(crate) callback_uri: String,
    pub(crate) organizations: HashSet<String>,
    pub(crate) teams: HashSet<String>,
    pub(crate) whitelists: Vec<WhitelistRule>,
}

impl Proxy {
    pub(crate) fn has_org(&self, org: &str) -> bool {
        self.organizations.contains(org)
    }

    pub(crate) fn has_team(&self, team: &str) -> bool {
        self.teams.contains(team)
    }

    /// Matches the first whitelist rule whose method equals `method` or is
    /// `ANY`. `path` is right-trimmed of trailing slashes (empty becomes
    /// `"/"`) before matching; success is a full regex match.
    pub(crate) fn is_whitelisted(&self, method: &str, path: &str) -> bool {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed };
        self.whitelists
            .iter()
            .any(|rule| rule.matches(method, trimmed))
    }
}

fn parse_whitelist_entry(entry: &str) -> Result<WhitelistRule> {
    let (method, pattern) = entry
        .split_once(':')
        .map_or((ANY_METHOD.to_owned(), entry), |(m, p)| {
            (m.to_ascii_uppercase(), p)
        });
    let anchored = format!("^{pattern}$");
    let regex = Regex::new(&anchored).wrap_err_with(|| format!("bad whitelist regex: {entry}"))?;
    Ok(WhitelistRule { method, regex })
}

/// Builds one [`Proxy`] from a config entry, filling unset fields from the
/// global `[oauth]` defaults.
pub(crate) fn build_proxy(entry: ProxyEntry, defaults: &OauthDefaults) -> Result<Proxy> {
    let provider = if entry.provider.is_empty() {
        defaults.provider.clone()
    } else {
        entry.provider
    };
    let client_id = if entry.client_id.is_empty() {
        defaults.client_id.clone()
    } else {
        entry.client_id
    };
    let client_secret = if entry.client_secret.is_empty() {
        defaults.client_secret.clone()
    } else {
        SecretString::from(entry.client_secret)
    };
    let callback_uri = if entry.callback_uri.is_empty() {
        defaults.callback_uri.clone()
    } else {
        entry.callback_uri
    };

    let endpoint = Url::parse(&entry.end_point)
        .wrap_err_with(|| format!("bad end_point for {}: {}", entry.request_host, entry.end_point))?;

    let whitelists = entry
        .whitelists
        .iter()
        .map(|w| parse_whitelist_entry(w))
        .collect::<Result<Vec<_>>>()?;

    Ok(Proxy {
        request_host: entry.request_host,
        scheme: entry.scheme,
        endpoint,
        preserve_host: entry.preserve_host,
        provider,
        client_id,
        client_secret,
        callback_uri,
        organizations: entry.organizations.into_iter().collect(),
        teams: entry.teams.into_iter().collect(),
        whitelists,
    })
}

/// The startup-built, read-only `Host -> Proxy` lookup table.
///
/// Entries are `Arc`-wrapped so a [`crate::state::LoginState`] can hold on to
/// its `Proxy` for the lifetime of a login without copying whitelist regexes
/// around.
pub(crate) struct ProxyRegistry {
    by_host: HashMap<String, Arc<Proxy>>,
}

impl ProxyRegistry {
    pub(crate) fn build(entries: Vec<ProxyEntry>, defaults: &OauthDefaults) -> Result<Self> {
        let mut by_host = HashMap::new();
        for entry in entries {
            let host = entry.request_host.clone();
            if by_host.contains_key(&host) {
                bail!("duplicate request_host in proxy registry: {host}");
            }
            let proxy = build_proxy(entry, defaults)?;
            by_host.insert(host, Arc::new(proxy));
        }
        Ok(Self { by_host })
    }

    /// Exact-match lookup; no suffix or wildcard matching.
    pub(crate) fn lookup(&self, host: &str) -> Option<&Arc<Proxy>> {
        self.by_host.get(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> OauthDefaults {
        OauthDefaults {
            provider: "github".to_owned(),
            client_id: "default-cid".to_owned(),
            client_secret: SecretString::from("default-secret"),
            callback_uri: "https://app/oauth2/callback".to_owned(),
            state_timeout: 60,
            cookie_timeout: 604_800,
            cookie_name: "oauth_proxy_session".to_owned(),
            check_version: true,
            cookie_secure: None,
        }
    }

    fn entry() -> ProxyEntry {
        ProxyEntry {
            request_host: "app".to_owned(),
            scheme: "https".to_owned(),
            end_point: "http://upstream:8080/".to_owned(),
            preserve_host: false,
            provider: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            callback_uri: String::new(),
            organizations: vec!["myorg".to_owned()],
            teams: Vec::new(),
            whitelists: vec!["GET:/health".to_owned(), "/public/.*".to_owned()],
        }
    }

    #[test]
    fn fills_defaults_for_unset_fields() {
        let proxy = build_proxy(entry(), &defaults()).unwrap();
        assert_eq!(proxy.provider, "github");
        assert_eq!(proxy.client_id, "default-cid");
        assert_eq!(proxy.callback_uri, "https://app/oauth2/callback");
    }

    #[test]
    fn whitelist_matches_explicit_method() {
        let proxy = build_proxy(entry(), &defaults()).unwrap();
        assert!(proxy.is_whitelisted("GET", "/health"));
        assert!(!proxy.is_whitelisted("POST", "/health"));
    }

    #[test]
    fn whitelist_matches_any_method_without_prefix() {
        let proxy = build_proxy(entry(), &defaults()).unwrap();
        assert!(proxy.is_whitelisted("POST", "/public/anything"));
        assert!(proxy.is_whitelisted("DELETE", "/public/anything"));
    }

    #[test]
    fn trailing_slash_is_trimmed_before_matching() {
        let proxy = build_proxy(entry(), &defaults()).unwrap();
        assert!(proxy.is_whitelisted("GET", "/health/"));
    }

    #[test]
    fn rejects_bad_endpoint_url() {
        let mut e = entry();
        e.end_point = "not a url".to_owned();
        assert!(build_proxy(e, &defaults()).is_err());
    }

    #[test]
    fn rejects_bad_whitelist_regex() {
        let mut e = entry();
        e.whitelists = vec!["GET:(unterminated".to_owned()];
        assert!(build_proxy(e, &defaults()).is_err());
    }

    #[test]
    fn registry_rejects_duplicate_hosts() {
        let result = ProxyRegistry::build(vec![entry(), entry()], &defaults());
        assert!(result.is_err());
    }

    #[test]
    fn registry_lookup_is_exact_match() {
        let registry = ProxyRegistry::build(vec![entry()], &defaults()).unwrap();
        assert!(registry.lookup("app").is_some());
        assert!(registry.lookup("app.sub").is_none());
        assert!(registry.lookup("unknown").is_none());
    }
}
