//! `SeaORM` implementation of the [`AuthService`] trait.

use async_trait::async_trait;

use crate::db::{ClientOrigin, NewUser, Role, Store, User};
use crate::services::audit::AuditLogger;
use crate::services::auth_service::{
    AuthError, AuthService, FederatedIdentity, SessionClaims, SignUp,
};

pub struct SeaOrmAuthService {
    store: Store,
    audit: AuditLogger,
    session_ttl_minutes: i64,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store, audit: AuditLogger, session_ttl_minutes: i64) -> Self {
        Self {
            store,
            audit,
            session_ttl_minutes,
        }
    }

    /// Finishes a successful verification: last-login is written before this
    /// returns, then fresh claims are minted from the stored role.
    async fn complete_sign_in(&self, user: User) -> Result<(User, SessionClaims), AuthError> {
        self.store.update_last_login(user.id).await?;

        let claims = SessionClaims::mint(&user, self.session_ttl_minutes);
        Ok((user, claims))
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn sign_up(&self, signup: SignUp, origin: &ClientOrigin) -> Result<User, AuthError> {
        let new = NewUser {
            username: signup.username,
            email: signup.email,
            password: Some(signup.password),
            federated_id: None,
            first_name: signup.first_name,
            last_name: signup.last_name,
            bio: signup.bio,
            location: signup.location,
            ..Default::default()
        };

        let user = self.store.create_user(new, Role::User).await?;

        self.audit
            .event(user.id, "user.signup", None, origin)
            .await;

        Ok(user)
    }

    async fn password_sign_in(
        &self,
        identifier: &str,
        password: &str,
        origin: &ClientOrigin,
    ) -> Result<Option<(User, SessionClaims)>, AuthError> {
        // Both identifier forms verify against the stored hash; which form
        // was presented never influences the resulting role. The store
        // records the attempt row, one per call.
        let verified = if identifier.contains('@') {
            self.store
                .verify_user_password(identifier, password, origin)
                .await?
        } else {
            self.store
                .verify_user_password_by_username(identifier, password, origin)
                .await?
        };

        match verified {
            Some(user) => {
                let signed_in = self.complete_sign_in(user).await?;
                Ok(Some(signed_in))
            }
            None => Ok(None),
        }
    }

    async fn federated_sign_in(
        &self,
        assertion: FederatedIdentity,
        origin: &ClientOrigin,
    ) -> Result<(User, SessionClaims), AuthError> {
        let existing = self
            .store
            .find_user_by_federated_id(&assertion.federated_id)
            .await?;

        let user = match existing {
            Some(user) => user,
            None => {
                // First contact: provision with the least-privileged role and
                // no local credential. Usernames come from the email local
                // part; a clash with an existing account is surfaced rather
                // than silently linked.
                let username = assertion
                    .email
                    .split('@')
                    .next()
                    .unwrap_or(&assertion.email)
                    .to_string();

                let new = NewUser {
                    username,
                    email: assertion.email.clone(),
                    password: None,
                    federated_id: Some(assertion.federated_id.clone()),
                    first_name: assertion.first_name,
                    last_name: assertion.last_name,
                    avatar_url: assertion.avatar_url,
                    ..Default::default()
                };

                let user = self.store.create_user(new, Role::User).await?;

                self.audit
                    .event(user.id, "user.federated_signup", None, origin)
                    .await;

                user
            }
        };

        // No local verification happened, so the store did not log this
        // sign-in; record it here.
        self.audit
            .login_attempt(Some(user.id), &user.email, true, None, origin)
            .await;

        self.complete_sign_in(user).await
    }
}
