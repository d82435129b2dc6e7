//! Moderation endpoints. Everything here sits behind `require_admin` and
//! every state change lands in the audit log.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::api::auth::extract_origin;
use crate::services::SessionClaims;

use super::types::{
    AuditLogDto, LoginAttemptDto, MessageResponse, PageQuery, PagedResponse, UserDto,
};

const DEFAULT_PAGE_SIZE: u64 = 50;

/// GET /admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<UserDto>>>, ApiError> {
    let users = state.store().list_users().await?;

    Ok(Json(ApiResponse::success(
        users.into_iter().map(UserDto::from).collect(),
    )))
}

/// POST /admin/users/{id}/deactivate
/// Soft-deactivation; the record remains but drops out of all lookups.
pub async fn deactivate_user(
    State(state): State<Arc<AppState>>,
    axum::Extension(claims): axum::Extension<SessionClaims>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if id == claims.user_id {
        return Err(ApiError::validation("Cannot deactivate your own account"));
    }

    let flipped = state.store().deactivate_user(id).await?;

    if !flipped {
        return Err(ApiError::not_found("User", id));
    }

    let origin = extract_origin(&headers);
    state
        .audit()
        .event(
            claims.user_id,
            "admin.user_deactivated",
            Some(serde_json::json!({ "target_user_id": id })),
            &origin,
        )
        .await;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "User deactivated".to_string(),
    })))
}

/// POST /admin/businesses/{id}/verify
pub async fn verify_business(
    State(state): State<Arc<AppState>>,
    axum::Extension(claims): axum::Extension<SessionClaims>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let updated = state.store().business_repo().set_verified(id, true).await?;

    if !updated {
        return Err(ApiError::not_found("Business", id));
    }

    let origin = extract_origin(&headers);
    state
        .audit()
        .event(
            claims.user_id,
            "admin.business_verified",
            Some(serde_json::json!({ "business_id": id })),
            &origin,
        )
        .await;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Business verified".to_string(),
    })))
}

/// GET /admin/login-attempts
pub async fn list_login_attempts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<PagedResponse<LoginAttemptDto>>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 500);

    let (items, total_pages) = state
        .store()
        .audit_repo()
        .login_attempts(page, page_size, None)
        .await?;

    Ok(Json(ApiResponse::success(PagedResponse {
        items: items.into_iter().map(LoginAttemptDto::from).collect(),
        total_pages,
    })))
}

/// GET /admin/audit
pub async fn list_audit_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<PagedResponse<AuditLogDto>>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 500);

    let (items, total_pages) = state
        .store()
        .audit_repo()
        .audit_events(page, page_size, None)
        .await?;

    Ok(Json(ApiResponse::success(PagedResponse {
        items: items.into_iter().map(AuditLogDto::from).collect(),
        total_pages,
    })))
}
