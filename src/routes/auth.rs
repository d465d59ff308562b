//! Authentication route handlers
//!
//! Register, login and current-identity endpoints. None of these sit behind
//! the authorization middleware.

use crate::auth::{bearer_token, AuthSession, LoginRequest, RegisterRequest};
use crate::error::{ApiResult, AppError};
use crate::models::SuccessResponse;
use crate::state::SharedState;
use crate::users::IdentityView;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use axum_extra::extract::WithRejection;
use serde::Serialize;

type Body<T> = WithRejection<Json<T>, AppError>;

#[derive(Serialize)]
pub struct CurrentUser {
    pub user: IdentityView,
}

pub async fn register(
    State(state): State<SharedState>,
    WithRejection(Json(req), _): Body<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<AuthSession>>)> {
    let session = state.auth.register(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("User registered successfully", session)),
    ))
}

pub async fn login(
    State(state): State<SharedState>,
    WithRejection(Json(req), _): Body<LoginRequest>,
) -> ApiResult<Json<SuccessResponse<AuthSession>>> {
    let session = state.auth.login(req).await?;
    Ok(Json(SuccessResponse::with_data("Login successful", session)))
}

/// Current identity for the bearer token, re-read from the store
pub async fn me(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> ApiResult<Json<SuccessResponse<CurrentUser>>> {
    let token = bearer_token(&headers);
    let user = state.auth.verify_identity(token.as_deref()).await?;
    Ok(Json(SuccessResponse::with_data("User verified", CurrentUser { user })))
}
