use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tower_sessions::Session;

use super::validation;
use super::{ApiError, ApiResponse, AppState};
use crate::db::ClientOrigin;
use crate::db::repositories::two_factor::generate_secret;
use crate::services::{AuthView, FederatedIdentity, SessionClaims, SignUp};

use super::types::{
    ConsumeBackupCodeRequest, LoginRequest, MessageResponse, SignUpRequest, TwoFactorSetupDto,
    TwoFactorStatusDto, UserDto,
};
use serde::Serialize;

/// Session key the claims travel under.
const CLAIMS_KEY: &str = "claims";

#[derive(Serialize)]
pub struct SessionResponse {
    pub user: UserDto,
    pub auth: AuthView,
}

// ============================================================================
// Middleware
// ============================================================================

/// Rejects requests without live session claims; valid claims are placed in
/// request extensions so handlers receive them explicitly rather than
/// re-reading ambient session state.
pub async fn auth_middleware(
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let claims = session
        .get::<SessionClaims>(CLAIMS_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?;

    match claims {
        Some(claims) if !claims.is_expired(chrono::Utc::now().timestamp()) => {
            tracing::Span::current().record("user_id", claims.user_id);
            request.extensions_mut().insert(claims);
            Ok(next.run(request).await)
        }
        _ => Ok((StatusCode::UNAUTHORIZED, "Unauthorized").into_response()),
    }
}

/// Runs inside `auth_middleware`; forbids anything but the admin role.
pub async fn require_admin(request: Request, next: Next) -> Result<impl IntoResponse, ApiError> {
    let is_admin = request
        .extensions()
        .get::<SessionClaims>()
        .is_some_and(|claims| AuthView::from_claims(Some(claims)).is_admin);

    if is_admin {
        Ok(next.run(request).await)
    } else {
        Err(ApiError::Forbidden("Admin access required".to_string()))
    }
}

/// Request metadata for attempt/audit rows. Forwarded-for is taken as-is;
/// rate-limiting identity is not derived from it.
pub fn extract_origin(headers: &HeaderMap) -> ClientOrigin {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string());

    let user_agent = headers
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .map(ToString::to_string);

    ClientOrigin {
        ip_address,
        user_agent,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/signup
/// Register a local-credential account.
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SignUpRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    validation::validate_username(&payload.username)?;
    validation::validate_email(&payload.email)?;
    validation::validate_password(&payload.password)?;

    let origin = extract_origin(&headers);

    let user = state
        .auth_service()
        .sign_up(
            SignUp {
                username: payload.username,
                email: payload.email,
                password: payload.password,
                first_name: payload.first_name,
                last_name: payload.last_name,
                bio: payload.bio,
                location: payload.location,
            },
            &origin,
        )
        .await?;

    tracing::info!("New account registered: {}", user.username);

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// POST /auth/login
/// Authenticate with email-or-username plus password. Every failure mode
/// returns the same message.
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    if payload.identifier.is_empty() || payload.password.is_empty() {
        return Err(ApiError::invalid_credentials());
    }

    let origin = extract_origin(&headers);

    let signed_in = state
        .auth_service()
        .password_sign_in(&payload.identifier, &payload.password, &origin)
        .await?;

    let Some((user, claims)) = signed_in else {
        return Err(ApiError::invalid_credentials());
    };

    session
        .insert(CLAIMS_KEY, claims)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;

    Ok(Json(ApiResponse::success(SessionResponse {
        auth: AuthView::from_claims(Some(&claims)),
        user: UserDto::from(user),
    })))
}

/// POST /auth/federated
/// Sign in with an identity already asserted by the upstream provider flow.
/// First contact provisions a `user`-role account with no local password.
pub async fn federated_login(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    Json(assertion): Json<FederatedIdentity>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    if assertion.federated_id.is_empty() {
        return Err(ApiError::validation("Federated id is required"));
    }
    validation::validate_email(&assertion.email)?;

    let origin = extract_origin(&headers);

    let (user, claims) = state
        .auth_service()
        .federated_sign_in(assertion, &origin)
        .await?;

    session
        .insert(CLAIMS_KEY, claims)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;

    Ok(Json(ApiResponse::success(SessionResponse {
        auth: AuthView::from_claims(Some(&claims)),
        user: UserDto::from(user),
    })))
}

/// POST /auth/logout
/// Invalidate the current session.
pub async fn logout(session: Session) -> impl IntoResponse {
    let _ = session.flush().await;
    (StatusCode::OK, "Logged out")
}

/// GET /auth/me
/// Current user plus the authorization view the UI renders from.
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    axum::Extension(claims): axum::Extension<SessionClaims>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let user = state
        .store()
        .get_user_by_id(claims.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    Ok(Json(ApiResponse::success(SessionResponse {
        auth: AuthView::from_claims(Some(&claims)),
        user: UserDto::from(user),
    })))
}

/// POST /auth/2fa/setup
/// Generates a fresh secret and backup codes. Calling it again replaces the
/// previous secret and rotates the codes; there is never more than one
/// config per user.
pub async fn setup_2fa(
    State(state): State<Arc<AppState>>,
    axum::Extension(claims): axum::Extension<SessionClaims>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<TwoFactorSetupDto>>, ApiError> {
    let secret = generate_secret();

    let (config, backup_codes) = state.store().create_2fa(claims.user_id, &secret).await?;

    let origin = extract_origin(&headers);
    state
        .audit()
        .event(claims.user_id, "2fa.setup", None, &origin)
        .await;

    Ok(Json(ApiResponse::success(TwoFactorSetupDto {
        secret: config.secret,
        backup_codes,
    })))
}

/// POST /auth/2fa/enable
/// Confirms possession of the secret and turns enforcement on. Safe to call
/// when no config exists or it is already enabled.
pub async fn enable_2fa(
    State(state): State<Arc<AppState>>,
    axum::Extension(claims): axum::Extension<SessionClaims>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.store().enable_2fa(claims.user_id).await?;

    let origin = extract_origin(&headers);
    state
        .audit()
        .event(claims.user_id, "2fa.enabled", None, &origin)
        .await;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Two-factor authentication enabled".to_string(),
    })))
}

/// GET /auth/2fa
pub async fn get_2fa_status(
    State(state): State<Arc<AppState>>,
    axum::Extension(claims): axum::Extension<SessionClaims>,
) -> Result<Json<ApiResponse<TwoFactorStatusDto>>, ApiError> {
    let config = state
        .store()
        .get_2fa(claims.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Two-factor is not configured".to_string()))?;

    let remaining = state
        .store()
        .two_factor_repo()
        .remaining_backup_codes(claims.user_id)
        .await?;

    Ok(Json(ApiResponse::success(TwoFactorStatusDto {
        enabled: config.enabled,
        enabled_at: config.enabled_at,
        remaining_backup_codes: remaining,
    })))
}

/// POST /auth/2fa/backup/consume
/// Burns a single-use backup code. A reused or unknown code is rejected.
pub async fn consume_backup_code(
    State(state): State<Arc<AppState>>,
    axum::Extension(claims): axum::Extension<SessionClaims>,
    headers: HeaderMap,
    Json(payload): Json<ConsumeBackupCodeRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let consumed = state
        .store()
        .consume_backup_code(claims.user_id, &payload.code)
        .await?;

    if !consumed {
        return Err(ApiError::validation("Invalid or already used backup code"));
    }

    let origin = extract_origin(&headers);
    state
        .audit()
        .event(claims.user_id, "2fa.backup_code_used", None, &origin)
        .await;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Backup code accepted".to_string(),
    })))
}
