use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use tokio::task;

use crate::config::SecurityConfig;
use crate::db::StoreError;
use crate::entities::users;

/// Role carried on the user record and copied into session claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        // Anything unrecognized degrades to the least-privileged role.
        if s == "admin" { Self::Admin } else { Self::User }
    }
}

/// User data returned from the repository (without the password hash).
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
    pub email_verified_at: Option<String>,
    pub is_active: bool,
    pub last_login: Option<String>,
    pub federated_id: Option<String>,
    pub avatar_url: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            role: Role::from(model.role.as_str()),
            email_verified: model.email_verified,
            email_verified_at: model.email_verified_at,
            is_active: model.is_active,
            last_login: model.last_login,
            federated_id: model.federated_id,
            avatar_url: model.avatar_url,
            first_name: model.first_name,
            last_name: model.last_name,
            bio: model.bio,
            location: model.location,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Input for `create`. The plaintext password never outlives the insert.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: Option<String>,
    pub federated_id: Option<String>,
    pub avatar_url: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}

pub struct UserRepository {
    conn: DatabaseConnection,
    security: SecurityConfig,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection, security: SecurityConfig) -> Self {
        Self { conn, security }
    }

    /// Creates a user. Every account must carry at least one authentication
    /// method (password or federated id); uniqueness conflicts surface as
    /// `StoreError::Constraint`.
    pub async fn create(&self, new: NewUser, role: Role) -> Result<User, StoreError> {
        if new.password.is_none() && new.federated_id.is_none() {
            return Err(StoreError::Validation(
                "a user needs a password or a federated identity".to_string(),
            ));
        }

        let password_hash = match new.password {
            Some(password) => {
                let security = self.security.clone();
                let hash = task::spawn_blocking(move || hash_password(&password, &security))
                    .await
                    .map_err(|e| StoreError::Internal(format!("hashing task panicked: {e}")))??;
                Some(hash)
            }
            None => None,
        };

        let now = chrono::Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            username: Set(new.username),
            email: Set(new.email),
            password_hash: Set(password_hash),
            role: Set(role.as_str().to_string()),
            email_verified: Set(false),
            email_verified_at: Set(None),
            is_active: Set(true),
            last_login: Set(None),
            federated_id: Set(new.federated_id),
            avatar_url: Set(new.avatar_url),
            first_name: Set(new.first_name),
            last_name: Set(new.last_name),
            bio: Set(new.bio),
            location: Set(new.location),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active.insert(&self.conn).await?;
        Ok(User::from(model))
    }

    /// Active users only; deactivated accounts are invisible to lookups.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .filter(users::Column::IsActive.eq(true))
            .one(&self.conn)
            .await?;

        Ok(user.map(User::from))
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .filter(users::Column::IsActive.eq(true))
            .one(&self.conn)
            .await?;

        Ok(user.map(User::from))
    }

    pub async fn find_by_federated_id(&self, federated_id: &str) -> Result<Option<User>, StoreError> {
        let user = users::Entity::find()
            .filter(users::Column::FederatedId.eq(federated_id))
            .filter(users::Column::IsActive.eq(true))
            .one(&self.conn)
            .await?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
        let user = users::Entity::find_by_id(id)
            .filter(users::Column::IsActive.eq(true))
            .one(&self.conn)
            .await?;

        Ok(user.map(User::from))
    }

    pub async fn list(&self) -> Result<Vec<User>, StoreError> {
        let rows = users::Entity::find().all(&self.conn).await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Verifies a password for the active user with this email. Returns the
    /// user on match, `None` on unknown email, missing hash, or mismatch.
    pub async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .filter(users::Column::IsActive.eq(true))
            .one(&self.conn)
            .await?;

        self.verify_against(user, password).await
    }

    /// Same contract as `verify_password`, keyed by username.
    pub async fn verify_password_by_username(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .filter(users::Column::IsActive.eq(true))
            .one(&self.conn)
            .await?;

        self.verify_against(user, password).await
    }

    /// Argon2 verification runs in `spawn_blocking` because it is
    /// CPU-intensive and would stall the async runtime.
    ///
    /// A missing user or missing hash verifies against a fixed dummy digest
    /// so the caller-observable timing matches the mismatch path.
    async fn verify_against(
        &self,
        user: Option<users::Model>,
        password: &str,
    ) -> Result<Option<User>, StoreError> {
        let (hash, user) = match user {
            Some(model) if model.password_hash.is_some() => {
                let hash = model.password_hash.clone().unwrap_or_default();
                (hash, Some(model))
            }
            _ => (DUMMY_DIGEST.clone(), None),
        };

        let password = password.to_string();
        let is_valid = task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&hash)
                .map_err(|e| StoreError::Internal(format!("stored hash unreadable: {e}")))?;
            Ok::<bool, StoreError>(
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok(),
            )
        })
        .await
        .map_err(|e| StoreError::Internal(format!("verification task panicked: {e}")))??;

        match user {
            Some(model) if is_valid => Ok(Some(User::from(model))),
            _ => Ok(None),
        }
    }

    /// Awaited to completion; the caller returns only after the write lands.
    pub async fn update_last_login(&self, user_id: i32) -> Result<(), StoreError> {
        let now = chrono::Utc::now().to_rfc3339();

        users::Entity::update_many()
            .col_expr(users::Column::LastLogin, sea_orm::sea_query::Expr::value(now.clone()))
            .col_expr(users::Column::UpdatedAt, sea_orm::sea_query::Expr::value(now))
            .filter(users::Column::Id.eq(user_id))
            .exec(&self.conn)
            .await?;

        Ok(())
    }

    /// Soft-deactivation; the row stays in storage but drops out of every
    /// lookup. Returns whether a row was flipped.
    pub async fn deactivate(&self, user_id: i32) -> Result<bool, StoreError> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = users::Entity::update_many()
            .col_expr(users::Column::IsActive, sea_orm::sea_query::Expr::value(false))
            .col_expr(users::Column::UpdatedAt, sea_orm::sea_query::Expr::value(now))
            .filter(users::Column::Id.eq(user_id))
            .filter(users::Column::IsActive.eq(true))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }
}

/// Digest verified against when no real hash exists, so the unknown-identity
/// path costs the same as a mismatch. Built with the default work factors,
/// which is what stored hashes carry.
static DUMMY_DIGEST: LazyLock<String> = LazyLock::new(|| {
    hash_password("sokoni-dummy-password", &SecurityConfig::default()).expect("dummy digest")
});

/// Hash a password with Argon2id using deployment-time work factors.
pub fn hash_password(password: &str, config: &SecurityConfig) -> Result<String, StoreError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = Params::new(
        config.argon2_memory_cost_kib,
        config.argon2_time_cost,
        config.argon2_parallelism,
        None,
    )
    .map_err(|e| StoreError::Internal(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| StoreError::Internal(format!("failed to hash password: {e}")))?;

    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trip() {
        let config = SecurityConfig::default();
        let digest = hash_password("Secret123!", &config).unwrap();

        assert!(!digest.contains("Secret123!"));

        let parsed = PasswordHash::new(&digest).unwrap();
        assert!(
            Argon2::default()
                .verify_password(b"Secret123!", &parsed)
                .is_ok()
        );
        assert!(
            Argon2::default()
                .verify_password(b"WrongPass", &parsed)
                .is_err()
        );
    }

    #[test]
    fn two_hashes_of_same_password_differ() {
        let config = SecurityConfig::default();
        let a = hash_password("same-input", &config).unwrap();
        let b = hash_password("same-input", &config).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn unknown_role_string_degrades_to_user() {
        assert_eq!(Role::from("admin"), Role::Admin);
        assert_eq!(Role::from("user"), Role::User);
        assert_eq!(Role::from("superuser"), Role::User);
    }
}
