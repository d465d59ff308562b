//! Authorization middleware
//!
//! Verifies the bearer token on every protected request, gates the HTTP
//! method through the permission matrix and hands the verified identity to
//! handlers as a request extension.

use crate::auth::Operation;
use crate::error::{AppError, AuthError};
use crate::state::SharedState;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use tracing::debug;

/// Token from an `Authorization: Bearer <token>` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
        .filter(|token| !token.is_empty())
}

pub async fn authorize(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers()).ok_or(AuthError::NoToken)?;
    let claims = state.auth.codec().verify(&token)?;

    let method = request.method().clone();
    let identity = state
        .permissions
        .authorize(claims, Operation::from_method(&method))
        .inspect_err(|_| debug!("Denied {} {} by permission matrix", method, request.uri().path()))?;

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
