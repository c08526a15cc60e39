//! End-to-end integration tests: spawn the real `oauth_proxy` binary
//! against a temp config file and drive it over HTTP, the way
//! `tests/integration.rs` drives the coordinator binary in the teacher repo.
//!
//! These cover the parts of the request pipeline that don't require a live
//! GitHub API (banner, whitelist bypass, unauthenticated redirect, the
//! authorize-URL shape from `/oauth2/begin`); provider wire-contract tests
//! live in `src/provider/github.rs` against `wiremock`.

mod common;

use common::{KillOnDrop, get_free_port, spawn_proxy_with_config, wait_for_listening};

async fn spawn_upstream() -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = axum::Router::new()
        .route("/health", axum::routing::get(|| async { "ok upstream" }))
        .route(
            "/whoami",
            axum::routing::get(|headers: axum::http::HeaderMap| async move {
                headers
                    .get("x-forwarded-user")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("anonymous")
                    .to_owned()
            }),
        );
    let handle = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .unwrap();
    });
    (addr, handle)
}

fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn unknown_host_gets_version_banner() {
    let port = get_free_port();
    let config = format!(
        r#"
        [oauth]
        provider = "github"
        client_id = "cid"
        client_secret = "secret"
        callback_uri = "https://app/oauth2/callback"
        state_timeout = 60
        cookie_timeout = 604800
        cookie_name = "oauth_proxy_session"
        check_version = true

        [general]
        secret = "integration-test-secret"
        "#
    );
    let child = spawn_proxy_with_config(port, &config);
    let _guard = KillOnDrop(child);
    wait_for_listening(port, 5).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{port}/anything"))
        .send()
        .await
        .expect("request to proxy failed");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .starts_with("Anduin OAUTH proxy version")
    );
}

#[tokio::test]
async fn whitelisted_route_is_forwarded_without_login() {
    let port = get_free_port();
    let (upstream_addr, _upstream) = spawn_upstream().await;
    let config = format!(
        r#"
        [oauth]
        provider = "github"
        client_id = "cid"
        client_secret = "secret"
        callback_uri = "https://app/oauth2/callback"
        state_timeout = 60
        cookie_timeout = 604800
        cookie_name = "oauth_proxy_session"
        check_version = true

        [general]
        secret = "integration-test-secret"

        [[proxy]]
        request_host = "127.0.0.1:{port}"
        scheme = "http"
        end_point = "http://{upstream_addr}/"
        organizations = ["myorg"]
        whitelists = ["GET:/health"]
        "#
    );
    let child = spawn_proxy_with_config(port, &config);
    let _guard = KillOnDrop(child);
    wait_for_listening(port, 5).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{port}/health"))
        .send()
        .await
        .expect("request to proxy failed");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok upstream");
}

#[tokio::test]
async fn unauthenticated_request_redirects_to_begin() {
    let port = get_free_port();
    let (upstream_addr, _upstream) = spawn_upstream().await;
    let config = format!(
        r#"
        [oauth]
        provider = "github"
        client_id = "cid"
        client_secret = "secret"
        callback_uri = "https://app/oauth2/callback"
        state_timeout = 60
        cookie_timeout = 604800
        cookie_name = "oauth_proxy_session"
        check_version = true

        [general]
        secret = "integration-test-secret"

        [[proxy]]
        request_host = "127.0.0.1:{port}"
        scheme = "http"
        end_point = "http://{upstream_addr}/"
        organizations = ["myorg"]
        "#
    );
    let child = spawn_proxy_with_config(port, &config);
    let _guard = KillOnDrop(child);
    wait_for_listening(port, 5).await;

    let client = no_redirect_client();
    let response = client
        .get(format!("http://127.0.0.1:{port}/secret-page"))
        .send()
        .await
        .expect("request to proxy failed");

    assert_eq!(response.status(), reqwest::StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("/oauth2/begin?request-path=%2Fsecret-page"));
}

#[tokio::test]
async fn begin_redirects_to_github_authorize_url() {
    let port = get_free_port();
    let (upstream_addr, _upstream) = spawn_upstream().await;
    let config = format!(
        r#"
        [oauth]
        provider = "github"
        client_id = "test-client-id"
        client_secret = "secret"
        callback_uri = "https://app.example.com/oauth2/callback"
        state_timeout = 60
        cookie_timeout = 604800
        cookie_name = "oauth_proxy_session"
        check_version = true

        [general]
        secret = "integration-test-secret"

        [[proxy]]
        request_host = "127.0.0.1:{port}"
        scheme = "http"
        end_point = "http://{upstream_addr}/"
        organizations = ["myorg"]
        "#
    );
    let child = spawn_proxy_with_config(port, &config);
    let _guard = KillOnDrop(child);
    wait_for_listening(port, 5).await;

    let client = no_redirect_client();
    let response = client
        .get(format!(
            "http://127.0.0.1:{port}/oauth2/begin?request-path=/dashboard"
        ))
        .send()
        .await
        .expect("request to proxy failed");

    assert_eq!(response.status(), reqwest::StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("https://github.com/login/oauth/authorize?"));
    assert!(location.contains("client_id=test-client-id"));
    assert!(location.contains("scope=user%3Aemail%2Cread%3Aorg"));
    assert!(location.contains("allow_signup=false"));
}

#[tokio::test]
async fn favicon_without_session_is_not_found() {
    let port = get_free_port();
    let (upstream_addr, _upstream) = spawn_upstream().await;
    let config = format!(
        r#"
        [oauth]
        provider = "github"
        client_id = "cid"
        client_secret = "secret"
        callback_uri = "https://app/oauth2/callback"
        state_timeout = 60
        cookie_timeout = 604800
        cookie_name = "oauth_proxy_session"
        check_version = true

        [general]
        secret = "integration-test-secret"

        [[proxy]]
        request_host = "127.0.0.1:{port}"
        scheme = "http"
        end_point = "http://{upstream_addr}/"
        organizations = ["myorg"]
        "#
    );
    let child = spawn_proxy_with_config(port, &config);
    let _guard = KillOnDrop(child);
    wait_for_listening(port, 5).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{port}/favicon.ico"))
        .send()
        .await
        .expect("request to proxy failed");

    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}
