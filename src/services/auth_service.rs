//! Domain service for authentication: credential verification, session-claim
//! minting, and federated sign-in.
//!
//! Expected authentication failure is a value (`Ok(None)`), never an error;
//! `AuthError` is reserved for validation problems and infrastructure
//! failures. Callers surface both behind a generic message that does not
//! disclose which factor was wrong.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{Role, StoreError, User};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Username/email already taken.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Constraint(msg) => Self::Conflict(msg),
            StoreError::Validation(msg) => Self::Validation(msg),
            StoreError::Transient(e) => Self::Unavailable(e.to_string()),
            StoreError::Internal(msg) => Self::Internal(msg),
        }
    }
}

/// Identity and role facts carried by the session cookie. Minted exclusively
/// by the token issuer; everything downstream only reads them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user_id: i32,
    pub role: Role,
    /// Unix seconds.
    pub issued_at: i64,
    /// Unix seconds.
    pub expires_at: i64,
}

impl SessionClaims {
    #[must_use]
    pub fn mint(user: &User, ttl_minutes: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            user_id: user.id,
            role: user.role,
            issued_at: now,
            expires_at: now + ttl_minutes * 60,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

/// Read-only authorization facts derived from the claims. A pure function of
/// its input: no lookups, no caching, no side effects.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AuthView {
    pub is_authenticated: bool,
    pub role: Option<Role>,
    pub is_admin: bool,
    pub is_user: bool,
}

impl AuthView {
    #[must_use]
    pub fn from_claims(claims: Option<&SessionClaims>) -> Self {
        match claims {
            Some(claims) => Self {
                is_authenticated: true,
                role: Some(claims.role),
                is_admin: claims.role == Role::Admin,
                is_user: claims.role == Role::User,
            },
            None => Self {
                is_authenticated: false,
                role: None,
                is_admin: false,
                is_user: false,
            },
        }
    }
}

/// Provider-asserted identity handed over by the delegated federation flow.
/// This service trusts its collaborator; it does not speak the protocol.
#[derive(Debug, Clone, Deserialize)]
pub struct FederatedIdentity {
    pub federated_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SignUp {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Registers a local-credential account with role `user`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Conflict`] when username or email is taken.
    async fn sign_up(
        &self,
        signup: SignUp,
        origin: &crate::db::ClientOrigin,
    ) -> Result<User, AuthError>;

    /// Verifies a password against the credential store; `identifier` may be
    /// an email address or a username, and both paths perform real
    /// verification. Exactly one login attempt is recorded per call. On
    /// success the user's last-login timestamp is updated before return and
    /// fresh claims are minted from the stored role.
    async fn password_sign_in(
        &self,
        identifier: &str,
        password: &str,
        origin: &crate::db::ClientOrigin,
    ) -> Result<Option<(User, SessionClaims)>, AuthError>;

    /// Signs in a provider-asserted identity, creating the account on first
    /// contact. A first-time federated account always gets role `user`;
    /// there is no federated path to `admin`.
    async fn federated_sign_in(
        &self,
        assertion: FederatedIdentity,
        origin: &crate::db::ClientOrigin,
    ) -> Result<(User, SessionClaims), AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_role(role: Role) -> User {
        User {
            id: 7,
            username: "biz1".to_string(),
            email: "biz1@example.com".to_string(),
            role,
            email_verified: false,
            email_verified_at: None,
            is_active: true,
            last_login: None,
            federated_id: None,
            avatar_url: None,
            first_name: None,
            last_name: None,
            bio: None,
            location: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn view_of_absent_claims_is_anonymous() {
        let view = AuthView::from_claims(None);
        assert!(!view.is_authenticated);
        assert!(!view.is_admin);
        assert!(!view.is_user);
        assert!(view.role.is_none());
    }

    #[test]
    fn view_reflects_admin_claims() {
        let claims = SessionClaims::mint(&user_with_role(Role::Admin), 60);
        let view = AuthView::from_claims(Some(&claims));
        assert!(view.is_authenticated);
        assert!(view.is_admin);
        assert!(!view.is_user);
    }

    #[test]
    fn minted_claims_expire_after_ttl() {
        let claims = SessionClaims::mint(&user_with_role(Role::User), 1);
        assert!(!claims.is_expired(claims.issued_at));
        assert!(claims.is_expired(claims.issued_at + 61));
    }
}
