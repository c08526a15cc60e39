//! Provider abstraction: polymorphic over `{redirect_uri, error_string,
//! request_token, verify_user}`. Exactly one variant exists today, GitHub.

pub(crate) mod github;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ProxyError;
use crate::registry::Proxy;
use crate::state::{LoginState, UserInfo};

/// Capability set a provider must implement to gate a [`Proxy`].
#[async_trait::async_trait]
pub(crate) trait Provider: Send + Sync {
    /// Builds the provider's authorize URL for this proxy and state token.
    fn redirect_uri(&self, proxy: &Proxy, state_token: &str) -> String;

    /// Extracts a human-readable provider-side error from the callback's
    /// `error_description` query parameter, if any.
    fn error_string(&self, error_description: Option<&str>) -> String;

    /// Exchanges an authorization `code` for a bearer access token.
    async fn request_token(&self, state: &LoginState, code: &str) -> Result<String, ProxyError>;

    /// Fetches identity and verifies org/team membership for `state.proxy`.
    async fn verify_user(
        &self,
        state: &LoginState,
        access_token: &str,
    ) -> Result<UserInfo, ProxyError>;
}

/// Builds every known provider once, keyed by its config tag (the
/// `Proxy::provider` string). Built a single time at startup and held on
/// `Inner` so `/oauth2/begin` and `/oauth2/callback` reuse the same
/// `reqwest::Client` instead of constructing one per request; an unknown tag
/// is simply absent from the map, which callers surface as an internal error.
pub(crate) fn build_registry() -> HashMap<String, Arc<dyn Provider>> {
    let mut providers: HashMap<String, Arc<dyn Provider>> = HashMap::new();
    providers.insert("github".to_owned(), Arc::new(github::GithubProvider::new()));
    providers
}
