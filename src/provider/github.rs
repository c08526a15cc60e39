//! GitHub provider: authorize URL, code->token exchange, user/org/team
//! verification. Contracts are bit-exact for interop (see the module docs
//! on [`super::Provider`]).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProxyError;
use crate::registry::Proxy;
use crate::state::{LoginState, UserInfo};

use super::Provider;

const AUTHORIZE_URI: &str = "https://github.com/login/oauth/authorize";
const TOKEN_REQUEST_URI: &str = "https://github.com/login/oauth/access_token";
const API_URI: &str = "https://api.github.com";
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) struct GithubProvider {
    client: reqwest::Client,
    authorize_uri: String,
    token_request_uri: String,
    api_uri: String,
}

impl GithubProvider {
    pub(crate) fn new() -> Self {
        Self::with_endpoints(AUTHORIZE_URI, TOKEN_REQUEST_URI, API_URI)
    }

    /// Builds a provider pointed at non-default endpoints. Production code
    /// always goes through [`GithubProvider::new`]; tests use this directly
    /// to stand the wire contract up against a local mock server instead of
    /// the real GitHub API.
    pub(crate) fn with_endpoints(authorize_uri: &str, token_request_uri: &str, api_uri: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .expect("reqwest client builds with default TLS backend");
        Self {
            client,
            authorize_uri: authorize_uri.to_owned(),
            token_request_uri: token_request_uri.to_owned(),
            api_uri: api_uri.to_owned(),
        }
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
    redirect_uri: &'a str,
    state: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
}

#[derive(Deserialize)]
struct GithubUser {
    login: String,
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
struct GithubOrg {
    login: String,
}

#[derive(Deserialize)]
struct GithubTeam {
    name: String,
}

#[async_trait::async_trait]
impl Provider for GithubProvider {
    fn redirect_uri(&self, proxy: &Proxy, state_token: &str) -> String {
        let mut url = url::Url::parse(&self.authorize_uri).expect("authorize URL parses");
        url.query_pairs_mut()
            .append_pair("client_id", &proxy.client_id)
            .append_pair("redirect_uri", &proxy.callback_uri)
            .append_pair("scope", "user:email,read:org")
            .append_pair("state", state_token)
            .append_pair("allow_signup", "false");
        url.into()
    }

    fn error_string(&self, error_description: Option<&str>) -> String {
        error_description.unwrap_or_default().to_owned()
    }

    async fn request_token(&self, state: &LoginState, code: &str) -> Result<String, ProxyError> {
        let body = TokenRequest {
            client_id: &state.proxy.client_id,
            client_secret: secrecy::ExposeSecret::expose_secret(&state.proxy.client_secret),
            code,
            redirect_uri: &state.proxy.callback_uri,
            state: &state.name,
        };
        let response = self
            .client
            .post(&self.token_request_uri)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                debug!(%err, "token exchange request failed");
                ProxyError::TokenExchangeFailed
            })?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "token exchange returned non-2xx");
            return Err(ProxyError::TokenExchangeFailed);
        }
        let token_response: TokenResponse = response.json().await.map_err(|err| {
            debug!(%err, "token exchange response was not valid JSON");
            ProxyError::TokenExchangeFailed
        })?;
        if token_response.access_token.is_empty() {
            debug!("token exchange response had empty access_token");
            return Err(ProxyError::TokenExchangeFailed);
        }
        Ok(token_response.access_token)
    }

    async fn verify_user(
        &self,
        state: &LoginState,
        access_token: &str,
    ) -> Result<UserInfo, ProxyError> {
        let user = self.get_user_info(access_token).await?;
        if !self.verify_org(state, access_token).await? {
            return Err(ProxyError::VerifyUserFailed);
        }
        if !self.verify_team(state, access_token).await? {
            return Err(ProxyError::VerifyUserFailed);
        }
        Ok(user)
    }
}

impl GithubProvider {
    fn auth_header(access_token: &str) -> String {
        format!("token {access_token}")
    }

    async fn get_user_info(&self, access_token: &str) -> Result<UserInfo, ProxyError> {
        let response = self
            .client
            .get(format!("{}/user", self.api_uri))
            .header("Authorization", Self::auth_header(access_token))
            .send()
            .await
            .map_err(|err| {
                debug!(%err, "user info request failed");
                ProxyError::VerifyUserFailed
            })?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "user info request returned non-2xx");
            return Err(ProxyError::VerifyUserFailed);
        }
        let user: GithubUser = response.json().await.map_err(|err| {
            debug!(%err, "user info response was not valid JSON");
            ProxyError::VerifyUserFailed
        })?;
        debug!(login = %user.login, "user info fetched");
        Ok(UserInfo {
            name: user.login,
            email: user.email,
        })
    }

    async fn verify_org(&self, state: &LoginState, access_token: &str) -> Result<bool, ProxyError> {
        let response = self
            .client
            .get(format!("{}/user/orgs", self.api_uri))
            .header("Authorization", Self::auth_header(access_token))
            .send()
            .await
            .map_err(|err| {
                debug!(%err, "org list request failed");
                ProxyError::VerifyUserFailed
            })?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "org list request returned non-2xx");
            return Err(ProxyError::VerifyUserFailed);
        }
        let orgs: Vec<GithubOrg> = response.json().await.map_err(|err| {
            debug!(%err, "org list response was not valid JSON");
            ProxyError::VerifyUserFailed
        })?;
        let matched = orgs.iter().find(|org| state.proxy.has_org(&org.login));
        if let Some(org) = matched {
            debug!(org = %org.login, "matched organization");
        }
        Ok(matched.is_some())
    }

    async fn verify_team(&self, state: &LoginState, access_token: &str) -> Result<bool, ProxyError> {
        if state.proxy.teams.is_empty() {
            return Ok(true);
        }
        let response = self
            .client
            .get(format!("{}/user/teams", self.api_uri))
            .header("Authorization", Self::auth_header(access_token))
            .send()
            .await
            .map_err(|err| {
                debug!(%err, "team list request failed");
                ProxyError::VerifyUserFailed
            })?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "team list request returned non-2xx");
            return Err(ProxyError::VerifyUserFailed);
        }
        let teams: Vec<GithubTeam> = response.json().await.map_err(|err| {
            debug!(%err, "team list response was not valid JSON");
            ProxyError::VerifyUserFailed
        })?;
        let matched = teams.iter().find(|team| state.proxy.has_team(&team.name));
        if let Some(team) = matched {
            debug!(team = %team.name, "matched team");
        }
        Ok(matched.is_some())
    }
}
