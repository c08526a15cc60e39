//! In-request error kinds and their HTTP surface.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Errors raised while servicing a single request, as opposed to startup
/// failures (those are `eyre::Report`, bailed out of `main`).
///
/// `TokenExchangeFailed`/`VerifyUserFailed` are returned by [`crate::provider`]
/// implementations and surfaced to the browser as the generic §7 messages by
/// the callback handler directly (it never round-trips through
/// [`IntoResponse`] since it needs to log the underlying cause first);
/// `Internal` is the one variant a handler converts straight to a response,
/// reserved for a config-validated-at-startup invariant breaking at request
/// time (an unknown provider tag).
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("cannot request token")]
    TokenExchangeFailed,

    #[error("cannot verify user")]
    VerifyUserFailed,

    #[error("internal server error")]
    Internal,
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::TokenExchangeFailed | Self::VerifyUserFailed => StatusCode::OK,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
