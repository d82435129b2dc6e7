use serde::{Deserialize, Serialize};

use crate::db::{Role, User};
use crate::entities::{audit_logs, businesses, login_attempts};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
    pub is_active: bool,
    pub last_login: Option<String>,
    pub has_federated_identity: bool,
    pub avatar_url: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub created_at: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            email_verified: user.email_verified,
            is_active: user.is_active,
            last_login: user.last_login,
            has_federated_identity: user.federated_id.is_some(),
            avatar_url: user.avatar_url,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
            location: user.location,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email address or username.
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TwoFactorSetupDto {
    pub secret: String,
    /// Shown exactly once; not retrievable afterwards.
    pub backup_codes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TwoFactorStatusDto {
    pub enabled: bool,
    pub enabled_at: Option<String>,
    pub remaining_backup_codes: u64,
}

#[derive(Debug, Deserialize)]
pub struct ConsumeBackupCodeRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BusinessDto {
    pub id: i32,
    pub owner_id: i32,
    pub name: String,
    pub category: String,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
    pub verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<businesses::Model> for BusinessDto {
    fn from(model: businesses::Model) -> Self {
        Self {
            id: model.id,
            owner_id: model.owner_id,
            name: model.name,
            category: model.category,
            region: model.region,
            latitude: model.latitude,
            longitude: model.longitude,
            description: model.description,
            verified: model.verified,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BusinessRequest {
    pub name: String,
    pub category: String,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListBusinessesQuery {
    pub region: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct LoginAttemptDto {
    pub id: i64,
    pub user_id: Option<i32>,
    pub email: String,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: String,
}

impl From<login_attempts::Model> for LoginAttemptDto {
    fn from(model: login_attempts::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            email: model.email,
            success: model.success,
            failure_reason: model.failure_reason,
            ip_address: model.ip_address,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuditLogDto {
    pub id: i64,
    pub user_id: i32,
    pub action: String,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: String,
}

impl From<audit_logs::Model> for AuditLogDto {
    fn from(model: audit_logs::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            action: model.action,
            details: model.details,
            ip_address: model.ip_address,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PagedResponse<T> {
    pub items: Vec<T>,
    pub total_pages: u64,
}
