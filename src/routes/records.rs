//! Record route handlers
//!
//! Generic over [`Resource`]; the authorization middleware has already
//! admitted the caller's role for the HTTP method, and each handler applies
//! the collection's own resource policy on top.

use crate::auth::{IdentityContext, Operation};
use crate::error::{not_found_error, ApiResult, AppError};
use crate::models::{
    prepare_create, prepare_update, CarInsurance, InsuranceCover, ListResponse, PropertyInsurance,
    Resource, SuccessResponse,
};
use crate::state::SharedState;
use crate::store::Document;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RecordQuery {
    pub id: Option<String>,
}

fn not_found<R: Resource>() -> AppError {
    not_found_error(format!("{} not found", R::LABEL))
}

/// Malformed IDs can't name a stored record, so they read as not found.
fn parse_id<R: Resource>(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| not_found::<R>())
}

fn admit<R: Resource>(state: &SharedState, ctx: &IdentityContext, op: Operation) -> Result<(), AppError> {
    state.policies.get(R::COLLECTION).check(ctx, op, R::PLURAL)
}

pub async fn list<R: Resource>(
    State(state): State<SharedState>,
    Extension(ctx): Extension<IdentityContext>,
) -> ApiResult<Json<ListResponse<Document>>> {
    admit::<R>(&state, &ctx, Operation::Read)?;

    let mut docs = state.records.find_all(R::COLLECTION).await?;
    R::ORDER.apply(&mut docs);
    debug!("Listed {} {} for {}", docs.len(), R::PLURAL, ctx.role);

    Ok(Json(ListResponse::new(docs, ctx.role)))
}

pub async fn get_one<R: Resource>(
    State(state): State<SharedState>,
    Extension(ctx): Extension<IdentityContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse<Document>>> {
    admit::<R>(&state, &ctx, Operation::Read)?;

    let doc = state
        .records
        .find_by_id(R::COLLECTION, parse_id::<R>(&id)?)
        .await?
        .ok_or_else(not_found::<R>)?;

    Ok(Json(SuccessResponse::with_data(format!("{} found", R::LABEL), doc)))
}

pub async fn create<R: Resource>(
    State(state): State<SharedState>,
    Extension(ctx): Extension<IdentityContext>,
    WithRejection(Json(body), _): WithRejection<Json<Value>, AppError>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Document>>)> {
    admit::<R>(&state, &ctx, Operation::Create)?;

    let body = prepare_create::<R>(body)?;
    let doc = state.records.insert(R::COLLECTION, body).await?;
    info!("{} {} created by {}", R::LABEL, doc.id, ctx.id);

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data(format!("{} created successfully", R::LABEL), doc)),
    ))
}

pub async fn update<R: Resource>(
    State(state): State<SharedState>,
    Extension(ctx): Extension<IdentityContext>,
    WithRejection(Json(body), _): WithRejection<Json<Value>, AppError>,
) -> ApiResult<Json<SuccessResponse<Document>>> {
    admit::<R>(&state, &ctx, Operation::Update)?;

    let (id, changes) = prepare_update::<R>(body)?;
    let doc = state
        .records
        .update(R::COLLECTION, parse_id::<R>(&id)?, changes)
        .await?
        .ok_or_else(not_found::<R>)?;
    info!("{} {} updated by {}", R::LABEL, doc.id, ctx.id);

    Ok(Json(SuccessResponse::with_data(format!("{} updated successfully", R::LABEL), doc)))
}

pub async fn remove<R: Resource>(
    State(state): State<SharedState>,
    Extension(ctx): Extension<IdentityContext>,
    Query(query): Query<RecordQuery>,
) -> ApiResult<Json<SuccessResponse<Document>>> {
    admit::<R>(&state, &ctx, Operation::Delete)?;

    let Some(id) = query.id.filter(|id| !id.is_empty()) else {
        return Err(AppError::BadRequest(format!("{} ID is required", R::ID_LABEL)));
    };

    let doc = state
        .records
        .delete(R::COLLECTION, parse_id::<R>(&id)?)
        .await?
        .ok_or_else(not_found::<R>)?;
    info!("{} {} deleted by {}", R::LABEL, doc.id, ctx.id);

    Ok(Json(SuccessResponse::with_data(format!("{} deleted successfully", R::LABEL), doc)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceCounts {
    pub property_insurance: usize,
    pub car_insurance: usize,
    pub insurance_cover: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceData {
    pub property_insurance: Vec<Document>,
    pub car_insurance: Vec<Document>,
    pub insurance_cover: Vec<Document>,
}

#[derive(Serialize)]
pub struct InsuranceOverview {
    pub success: bool,
    pub data: InsuranceData,
    pub counts: InsuranceCounts,
}

/// All three insurance collections in one response
pub async fn insurance_overview(
    State(state): State<SharedState>,
    Extension(ctx): Extension<IdentityContext>,
) -> ApiResult<Json<InsuranceOverview>> {
    admit::<PropertyInsurance>(&state, &ctx, Operation::Read)?;
    admit::<CarInsurance>(&state, &ctx, Operation::Read)?;
    admit::<InsuranceCover>(&state, &ctx, Operation::Read)?;

    let (mut property_insurance, mut car_insurance, mut insurance_cover) = tokio::try_join!(
        state.records.find_all(PropertyInsurance::COLLECTION),
        state.records.find_all(CarInsurance::COLLECTION),
        state.records.find_all(InsuranceCover::COLLECTION),
    )?;
    PropertyInsurance::ORDER.apply(&mut property_insurance);
    CarInsurance::ORDER.apply(&mut car_insurance);
    InsuranceCover::ORDER.apply(&mut insurance_cover);

    Ok(Json(InsuranceOverview {
        success: true,
        counts: InsuranceCounts {
            property_insurance: property_insurance.len(),
            car_insurance: car_insurance.len(),
            insurance_cover: insurance_cover.len(),
        },
        data: InsuranceData {
            property_insurance,
            car_insurance,
            insurance_cover,
        },
    }))
}
