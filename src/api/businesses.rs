use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use std::sync::Arc;

use super::validation;
use super::{ApiError, ApiResponse, AppState};
use crate::api::auth::extract_origin;
use crate::db::repositories::business::BusinessInput;
use crate::services::{AuthView, SessionClaims};

use super::types::{BusinessDto, BusinessRequest, ListBusinessesQuery, MessageResponse};

fn to_input(payload: BusinessRequest) -> Result<BusinessInput, ApiError> {
    let name = validation::validate_business_name(&payload.name)?.to_string();
    validation::validate_coordinates(payload.latitude, payload.longitude)?;

    if payload.category.trim().is_empty() || payload.region.trim().is_empty() {
        return Err(ApiError::validation("Category and region are required"));
    }

    Ok(BusinessInput {
        name,
        category: payload.category.trim().to_string(),
        region: payload.region.trim().to_string(),
        latitude: payload.latitude,
        longitude: payload.longitude,
        description: payload.description,
    })
}

/// GET /businesses
pub async fn list_businesses(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListBusinessesQuery>,
) -> Result<Json<ApiResponse<Vec<BusinessDto>>>, ApiError> {
    let rows = state
        .store()
        .business_repo()
        .list(query.region, query.category)
        .await?;

    Ok(Json(ApiResponse::success(
        rows.into_iter().map(BusinessDto::from).collect(),
    )))
}

/// GET /businesses/{id}
pub async fn get_business(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<BusinessDto>>, ApiError> {
    let row = state
        .store()
        .business_repo()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Business", id))?;

    Ok(Json(ApiResponse::success(BusinessDto::from(row))))
}

/// POST /businesses
pub async fn create_business(
    State(state): State<Arc<AppState>>,
    axum::Extension(claims): axum::Extension<SessionClaims>,
    headers: HeaderMap,
    Json(payload): Json<BusinessRequest>,
) -> Result<Json<ApiResponse<BusinessDto>>, ApiError> {
    let input = to_input(payload)?;

    let row = state
        .store()
        .business_repo()
        .create(claims.user_id, input)
        .await?;

    let origin = extract_origin(&headers);
    state
        .audit()
        .event(
            claims.user_id,
            "business.created",
            Some(serde_json::json!({ "business_id": row.id })),
            &origin,
        )
        .await;

    Ok(Json(ApiResponse::success(BusinessDto::from(row))))
}

/// PUT /businesses/{id}
/// Owners edit their own listings; admins may edit any.
pub async fn update_business(
    State(state): State<Arc<AppState>>,
    axum::Extension(claims): axum::Extension<SessionClaims>,
    Path(id): Path<i32>,
    Json(payload): Json<BusinessRequest>,
) -> Result<Json<ApiResponse<BusinessDto>>, ApiError> {
    let input = to_input(payload)?;

    let owner_id = if AuthView::from_claims(Some(&claims)).is_admin {
        let existing = state
            .store()
            .business_repo()
            .get(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Business", id))?;
        existing.owner_id
    } else {
        claims.user_id
    };

    let row = state
        .store()
        .business_repo()
        .update(id, owner_id, input)
        .await?
        .ok_or_else(|| ApiError::not_found("Business", id))?;

    Ok(Json(ApiResponse::success(BusinessDto::from(row))))
}

/// DELETE /businesses/{id}
/// Soft-delete; owners only (admins use the moderation route).
pub async fn delete_business(
    State(state): State<Arc<AppState>>,
    axum::Extension(claims): axum::Extension<SessionClaims>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let removed = state
        .store()
        .business_repo()
        .deactivate(id, Some(claims.user_id))
        .await?;

    if !removed {
        return Err(ApiError::not_found("Business", id));
    }

    let origin = extract_origin(&headers);
    state
        .audit()
        .event(
            claims.user_id,
            "business.deleted",
            Some(serde_json::json!({ "business_id": id })),
            &origin,
        )
        .await;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Business removed".to_string(),
    })))
}
