//! The five HTTP entry points: `Main` (catch-all), `Begin`, `Callback`,
//! `Login`, and `Favicon`.

use std::sync::Arc;

use axum::extract::{OriginalUri, Query, State};
use axum::http::uri::PathAndQuery;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Json, body::Body};
use axum_extra::extract::CookieJar;
use axum_extra::extract::Host;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::app::Inner;
use crate::error::ProxyError;
use crate::session;
use crate::state::UserInfo;

#[derive(Serialize)]
struct Banner {
    message: String,
}

fn version_banner() -> Banner {
    Banner {
        message: format!("Anduin OAUTH proxy version {}", env!("CARGO_PKG_VERSION")),
    }
}

fn version_banner_response() -> Response {
    (StatusCode::OK, Json(version_banner())).into_response()
}

fn session_user(state: &Inner, jar: &CookieJar) -> Option<UserInfo> {
    let cookie = jar.get(&state.cookie_name)?;
    session::decode(&state.key, cookie.value(), state.version, state.check_version)
}

/// `GET/POST/... /*` — the gate. Looks up the `Proxy` by `Host`; forwards,
/// redirects to login, or returns the version banner.
pub(crate) async fn main_handler(
    State(state): State<Arc<Inner>>,
    Host(host): Host,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    jar: CookieJar,
    body: Body,
) -> Response {
    let Some(proxy) = state.registry.lookup(&host) else {
        return version_banner_response();
    };

    if proxy.is_whitelisted(method.as_str(), uri.path()) {
        return crate::proxy_engine::forward(
            &state.reqwest_client,
            proxy,
            method,
            uri,
            headers,
            body,
            None,
        )
        .await;
    }

    if let Some(user) = session_user(&state, &jar) {
        return crate::proxy_engine::forward(
            &state.reqwest_client,
            proxy,
            method,
            uri,
            headers,
            body,
            Some((&user.name, &user.email)),
        )
        .await;
    }

    let request_path = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_owned(), ToString::to_string);
    let redirect = format!(
        "/oauth2/begin?request-path={}",
        urlencoding_escape(&request_path)
    );
    Redirect::temporary(&redirect).into_response()
}

/// `GET /favicon.ico` — returns 404 unless already authenticated, in which
/// case it is forwarded like any other authenticated request.
pub(crate) async fn favicon_handler(
    State(state): State<Arc<Inner>>,
    Host(host): Host,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    jar: CookieJar,
    body: Body,
) -> Response {
    let Some(proxy) = state.registry.lookup(&host) else {
        return not_found().into_response();
    };
    if let Some(user) = session_user(&state, &jar) {
        return crate::proxy_engine::forward(
            &state.reqwest_client,
            proxy,
            method,
            uri,
            headers,
            body,
            Some((&user.name, &user.email)),
        )
        .await;
    }
    not_found().into_response()
}

fn not_found() -> impl IntoResponse {
    #[derive(Serialize)]
    struct Msg {
        message: &'static str,
    }
    (StatusCode::NOT_FOUND, Json(Msg { message: "not found" }))
}

#[derive(Deserialize)]
pub(crate) struct BeginQuery {
    #[serde(rename = "request-path", default)]
    request_path: String,
}

/// `GET /oauth2/begin` — allocates a state token and redirects to the
/// provider's authorize URL.
pub(crate) async fn begin_handler(
    State(state): State<Arc<Inner>>,
    Host(host): Host,
    Query(query): Query<BeginQuery>,
    jar: CookieJar,
) -> Response {
    let Some(proxy) = state.registry.lookup(&host) else {
        return version_banner_response();
    };

    if session_user(&state, &jar).is_some() {
        return Redirect::temporary("/").into_response();
    }

    let request_path = if query.request_path.is_empty() {
        "/".to_owned()
    } else if query.request_path.starts_with('/') {
        query.request_path
    } else {
        format!("/{}", query.request_path)
    };
    // Relative path+query only: the stored return target must never hard-code
    // a scheme, or the post-login redirect would downgrade an https proxy.
    let original_url: PathAndQuery = match request_path.parse() {
        Ok(path_and_query) => path_and_query,
        Err(err) => {
            warn!(%err, %request_path, "invalid request-path on /oauth2/begin");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    message: "Invalid request URL".to_owned(),
                }),
            )
                .into_response();
        }
    };

    let Some(provider_impl) = state.providers.get(proxy.provider.as_str()) else {
        warn!(provider = %proxy.provider, "unknown provider tag");
        return ProxyError::Internal.into_response();
    };

    let token = crate::state::StateStore::generate_token();
    state
        .state_store
        .add(token.clone(), Arc::clone(proxy), original_url);
    let redirect_uri = provider_impl.redirect_uri(proxy, &token);
    Redirect::temporary(&redirect_uri).into_response()
}

#[derive(Deserialize)]
pub(crate) struct CallbackQuery {
    state: Option<String>,
    code: Option<String>,
    error_description: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

/// `GET /oauth2/callback` — exchanges the code for a token, verifies the
/// user, and redirects to `/oauth2/login`.
pub(crate) async fn callback_handler(
    State(state): State<Arc<Inner>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(state_name) = query.state.filter(|s| !s.is_empty()) else {
        return error_page("State is required");
    };
    let Some(login_state) = state.state_store.get(&state_name) else {
        return error_page("State not found or expired");
    };
    let Some(provider_impl) = state.providers.get(login_state.proxy.provider.as_str()) else {
        warn!(provider = %login_state.proxy.provider, "unknown provider tag");
        return error_page("internal server error");
    };

    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        let message = provider_impl.error_string(query.error_description.as_deref());
        warn!(%state_name, %message, "provider returned an error on callback");
        return error_page(&message);
    };

    let token = match provider_impl.request_token(&login_state, &code).await {
        Ok(token) => token,
        Err(err) => {
            warn!(%err, %state_name, "token exchange failed");
            return error_page("Cannot request token");
        }
    };

    let user = match provider_impl.verify_user(&login_state, &token).await {
        Ok(user) => user,
        Err(err) => {
            warn!(%err, %state_name, "user verification failed");
            return error_page("Cannot verify user");
        }
    };

    info!(user = %user.name, %state_name, "user verified, attaching to state");
    state.state_store.set_user(&state_name, user);

    let redirect_url = format!(
        "{}://{}/oauth2/login?state={state_name}",
        login_state.proxy.scheme, login_state.proxy.request_host
    );
    Redirect::temporary(&redirect_url).into_response()
}

fn error_page(message: &str) -> Response {
    (
        StatusCode::OK,
        Json(ErrorBody {
            message: message.to_owned(),
        }),
    )
        .into_response()
}

#[derive(Deserialize)]
pub(crate) struct LoginQuery {
    state: Option<String>,
}

/// `GET /oauth2/login` — consumes the state (single-use), mints the
/// encrypted session cookie, and redirects to the originally requested URL.
pub(crate) async fn login_handler(
    State(state): State<Arc<Inner>>,
    Query(query): Query<LoginQuery>,
    jar: CookieJar,
) -> Response {
    let Some(state_name) = query.state.filter(|s| !s.is_empty()) else {
        return error_page("state is required");
    };
    let Some(login_state) = state.state_store.acquire(&state_name) else {
        return error_page("state not found or expired");
    };
    let Some(user) = login_state.user else {
        return error_page("user was not authenticated");
    };

    let cookie_value = session::encode(&state.key, state.version, &user);
    let mut cookie = Cookie::new(state.cookie_name.clone(), cookie_value);
    cookie.set_domain(login_state.proxy.request_host.clone());
    cookie.set_path("/");
    cookie.set_max_age(time::Duration::seconds(
        i64::try_from(state.cookie_timeout).unwrap_or(i64::MAX),
    ));
    if state.cookie_secure {
        cookie.set_secure(true);
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
    }

    let jar = jar.add(cookie);
    (
        jar,
        Redirect::temporary(login_state.original_url.as_str()),
    )
        .into_response()
}

fn urlencoding_escape(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
