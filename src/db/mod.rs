use anyhow::Result;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, SqlErr, Statement,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SecurityConfig;

pub mod migrator;
pub mod repositories;

pub use repositories::audit::ClientOrigin;
pub use repositories::two_factor::TwoFactorConfig;
pub use repositories::user::{NewUser, Role, User};

/// Error taxonomy for store operations. Lookup misses are `Ok(None)`, never
/// an error variant.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Uniqueness/foreign-key conflict on a write.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Input rejected before any statement ran.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Connection/timeout/driver failure; eligible for caller-level retry.
    #[error("storage unavailable: {0}")]
    Transient(DbErr),

    #[error("internal store error: {0}")]
    Internal(String),
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg) | SqlErr::ForeignKeyConstraintViolation(msg)) => {
                Self::Constraint(msg)
            }
            _ => Self::Transient(err),
        }
    }
}

/// Facade over the pooled database connection. Constructed once at startup
/// and handed out by cloning; `close_and_drain` tears the pool down on
/// shutdown. Every repository call checks a connection out of the pool and
/// the pool returns it on every exit path, including errors and
/// cancellation.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
    security: SecurityConfig,
}

impl Store {
    pub async fn open(db_url: &str, security: SecurityConfig) -> Result<Self> {
        Self::open_with_pool_options(db_url, security, 5, 1).await
    }

    pub async fn open_with_pool_options(
        db_url: &str,
        security: SecurityConfig,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn, security })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    /// Stops accepting checkouts, lets in-flight statements finish, then
    /// closes the pool. Call after the server future has resolved.
    pub async fn close_and_drain(self) -> Result<()> {
        self.conn.close().await?;
        info!("Database pool drained and closed");
        Ok(())
    }

    #[must_use]
    pub fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone(), self.security.clone())
    }

    // ========== User Repository Methods ==========

    pub async fn create_user(&self, new: NewUser, role: Role) -> Result<User, StoreError> {
        self.user_repo().create(new, role).await
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.user_repo().find_by_email(email).await
    }

    pub async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        self.user_repo().find_by_username(username).await
    }

    pub async fn find_user_by_federated_id(
        &self,
        federated_id: &str,
    ) -> Result<Option<User>, StoreError> {
        self.user_repo().find_by_federated_id(federated_id).await
    }

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.user_repo().list().await
    }

    /// Verifies a password and records exactly one login attempt, success or
    /// not. The attempt write is best-effort: its failure never aborts the
    /// verification result.
    pub async fn verify_user_password(
        &self,
        email: &str,
        password: &str,
        origin: &ClientOrigin,
    ) -> Result<Option<User>, StoreError> {
        let verified = self.user_repo().verify_password(email, password).await?;
        self.record_attempt(email, verified.as_ref(), origin).await;
        Ok(verified)
    }

    pub async fn verify_user_password_by_username(
        &self,
        username: &str,
        password: &str,
        origin: &ClientOrigin,
    ) -> Result<Option<User>, StoreError> {
        let verified = self
            .user_repo()
            .verify_password_by_username(username, password)
            .await?;
        self.record_attempt(username, verified.as_ref(), origin).await;
        Ok(verified)
    }

    async fn record_attempt(
        &self,
        identifier: &str,
        verified: Option<&User>,
        origin: &ClientOrigin,
    ) {
        let (user_id, email, success, reason) = match verified {
            Some(user) => (Some(user.id), user.email.clone(), true, None),
            None => (
                None,
                identifier.to_string(),
                false,
                Some("invalid_credentials"),
            ),
        };

        let outcome = if success { "success" } else { "failure" };
        metrics::counter!("auth_login_total", &[("outcome", outcome.to_string())]).increment(1);

        if let Err(e) = self
            .audit_repo()
            .insert_login_attempt(user_id, &email, success, reason, origin)
            .await
        {
            metrics::counter!("audit_log_failures_total").increment(1);
            warn!("Failed to record login attempt for {email}: {e}");
        }
    }

    pub async fn update_last_login(&self, user_id: i32) -> Result<(), StoreError> {
        self.user_repo().update_last_login(user_id).await
    }

    pub async fn deactivate_user(&self, user_id: i32) -> Result<bool, StoreError> {
        self.user_repo().deactivate(user_id).await
    }

    // ========== Two-Factor Repository Methods ==========

    pub async fn create_2fa(
        &self,
        user_id: i32,
        secret: &str,
    ) -> Result<(TwoFactorConfig, Vec<String>), StoreError> {
        self.two_factor_repo().create(user_id, secret).await
    }

    pub async fn enable_2fa(&self, user_id: i32) -> Result<(), StoreError> {
        self.two_factor_repo().enable(user_id).await
    }

    pub async fn get_2fa(&self, user_id: i32) -> Result<Option<TwoFactorConfig>, StoreError> {
        self.two_factor_repo().get(user_id).await
    }

    pub async fn consume_backup_code(
        &self,
        user_id: i32,
        code: &str,
    ) -> Result<bool, StoreError> {
        self.two_factor_repo().consume_backup_code(user_id, code).await
    }

    #[must_use]
    pub fn two_factor_repo(&self) -> repositories::two_factor::TwoFactorRepository {
        repositories::two_factor::TwoFactorRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn audit_repo(&self) -> repositories::audit::AuditRepository {
        repositories::audit::AuditRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn business_repo(&self) -> repositories::business::BusinessRepository {
        repositories::business::BusinessRepository::new(self.conn.clone())
    }
}
