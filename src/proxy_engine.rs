//! Reverse-proxy request rewriting and dispatch to a [`Proxy`]'s upstream.

use axum::body::Body;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::registry::Proxy;

/// Joins an upstream base path with an inbound request path using the
/// single-slash-join rule: if exactly one side has a slash at the seam, use
/// simple concatenation; if both do, drop the duplicate; if neither does,
/// insert one.
fn join_paths(upstream_path: &str, request_path: &str) -> String {
    let upstream_has_trailing = upstream_path.ends_with('/');
    let request_has_leading = request_path.starts_with('/');
    match (upstream_has_trailing, request_has_leading) {
        (true, true) => format!("{upstream_path}{}", &request_path[1..]),
        (true, false) | (false, true) => format!("{upstream_path}{request_path}"),
        (false, false) => format!("{upstream_path}/{request_path}"),
    }
}

/// Merges two raw query strings: if either is empty, concatenate; otherwise
/// join with `&`.
fn merge_queries(upstream_query: &str, request_query: &str) -> String {
    match (upstream_query.is_empty(), request_query.is_empty()) {
        (true, _) => request_query.to_owned(),
        (false, true) => upstream_query.to_owned(),
        (false, false) => format!("{upstream_query}&{request_query}"),
    }
}

/// The upstream's `host[:port]`, used both to build the dispatch URI and,
/// when `preserve_host` is false, to override the forwarded `Host` header.
fn upstream_authority(proxy: &Proxy) -> String {
    proxy.endpoint.port().map_or_else(
        || proxy.endpoint.host_str().unwrap_or_default().to_owned(),
        |port| format!("{}:{port}", proxy.endpoint.host_str().unwrap_or_default()),
    )
}

/// Rewrites `uri` (as seen by the inbound request) into the target URI to
/// dispatch to `proxy`'s upstream.
fn build_upstream_uri(proxy: &Proxy, uri: &Uri) -> Uri {
    let upstream_path = proxy.endpoint.path();
    let request_path = uri.path();
    let joined_path = join_paths(upstream_path, request_path);

    let merged_query = merge_queries(
        proxy.endpoint.query().unwrap_or(""),
        uri.query().unwrap_or(""),
    );

    let authority = upstream_authority(proxy);
    let mut built = format!("{}://{authority}{joined_path}", proxy.endpoint.scheme());
    if !merged_query.is_empty() {
        built = format!("{built}?{merged_query}");
    }
    built.parse().unwrap_or_else(|_| uri.clone())
}

/// Forwards the inbound request to `proxy`'s upstream, streaming the
/// response body back without buffering. Adds `X-Forwarded-User`/
/// `X-Forwarded-Email` when `forwarded_user` is present.
pub(crate) async fn forward(
    client: &reqwest::Client,
    proxy: &Proxy,
    method: Method,
    uri: Uri,
    mut headers: HeaderMap,
    body: Body,
    forwarded_user: Option<(&str, &str)>,
) -> Response {
    let upstream_uri = build_upstream_uri(proxy, &uri);
    debug!(host = %proxy.request_host, upstream = %upstream_uri, "reverse proxy dispatch");

    if !headers.contains_key(axum::http::header::USER_AGENT) {
        headers.insert(axum::http::header::USER_AGENT, "".parse().unwrap());
    }

    if !proxy.preserve_host {
        if let Ok(value) = upstream_authority(proxy).parse() {
            headers.insert(axum::http::header::HOST, value);
        }
    }

    if let Some((name, email)) = forwarded_user {
        if let Ok(value) = name.parse() {
            headers.insert("x-forwarded-user", value);
        }
        if let Ok(value) = email.parse() {
            headers.insert("x-forwarded-email", value);
        }
    }

    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(%err, "failed to buffer request body for reverse proxy");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let upstream_method = match reqwest::Method::from_bytes(method.as_str().as_bytes()) {
        Ok(m) => m,
        Err(_) => return StatusCode::BAD_GATEWAY.into_response(),
    };

    let request = client
        .request(upstream_method, upstream_uri.to_string())
        .headers(headers)
        .body(body_bytes);

    let upstream_response = match request.send().await {
        Ok(response) => response,
        Err(err) => {
            debug!(%err, "upstream dispatch failed");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let status = upstream_response.status();
    let response_headers = upstream_response.headers().clone();
    let stream = upstream_response.bytes_stream();

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    response
}
