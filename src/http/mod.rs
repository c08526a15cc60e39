//! Router assembly: wires the five entry points behind the teacher's
//! `tower`/`tower-http` middleware stack (request IDs, tracing, timeouts,
//! sensitive-header redaction).

mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::routing::{IntoMakeService, any, get};
use tower::ServiceBuilder;
use tower_http::ServiceBuilderExt as _;
use tower_http::request_id::MakeRequestUuid;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::app::Inner;

/// Builds the router and wraps it in the observability/hardening middleware
/// stack, ready to hand to `axum::serve`.
pub(crate) fn create_app(state: Arc<Inner>) -> IntoMakeService<Router<()>> {
    let middleware_stack = ServiceBuilder::new()
        .sensitive_headers([AUTHORIZATION, COOKIE])
        .set_x_request_id(MakeRequestUuid)
        .propagate_x_request_id()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ));

    let router: Router<Arc<Inner>> = Router::new()
        .route("/favicon.ico", get(handlers::favicon_handler))
        .route("/oauth2/begin", get(handlers::begin_handler))
        .route("/oauth2/callback", get(handlers::callback_handler))
        .route("/oauth2/login", get(handlers::login_handler))
        .fallback(any(handlers::main_handler));

    router
        .with_state(state)
        .layer(middleware_stack)
        .into_make_service()
}
