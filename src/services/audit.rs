//! Best-effort security-event logging.
//!
//! Writes here must never fail the operation being logged: a failed insert
//! is reported on the operational channel (tracing + the
//! `audit_log_failures_total` counter) and otherwise swallowed.

use tracing::warn;

use crate::db::{ClientOrigin, Store};

#[derive(Clone)]
pub struct AuditLogger {
    store: Store,
}

impl AuditLogger {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn login_attempt(
        &self,
        user_id: Option<i32>,
        email: &str,
        success: bool,
        failure_reason: Option<&str>,
        origin: &ClientOrigin,
    ) {
        let outcome = if success { "success" } else { "failure" };
        metrics::counter!("auth_login_total", &[("outcome", outcome.to_string())]).increment(1);

        if let Err(e) = self
            .store
            .audit_repo()
            .insert_login_attempt(user_id, email, success, failure_reason, origin)
            .await
        {
            metrics::counter!("audit_log_failures_total").increment(1);
            warn!("Failed to record login attempt for {email}: {e}");
        }
    }

    pub async fn event(
        &self,
        user_id: i32,
        action: &str,
        details: Option<serde_json::Value>,
        origin: &ClientOrigin,
    ) {
        if let Err(e) = self
            .store
            .audit_repo()
            .insert_audit_event(user_id, action, details, origin)
            .await
        {
            metrics::counter!("audit_log_failures_total").increment(1);
            warn!("Failed to record audit event {action} for user {user_id}: {e}");
        }
    }
}
