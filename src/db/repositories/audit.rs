use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};

use crate::db::StoreError;
use crate::entities::{audit_logs, login_attempts, prelude::*};

/// Request metadata captured alongside security events.
#[derive(Debug, Clone, Default)]
pub struct ClientOrigin {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Both tables here are append-only: this repository exposes inserts and
/// reads, nothing that mutates or deletes an existing row.
pub struct AuditRepository {
    conn: DatabaseConnection,
}

impl AuditRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert_login_attempt(
        &self,
        user_id: Option<i32>,
        email: &str,
        success: bool,
        failure_reason: Option<&str>,
        origin: &ClientOrigin,
    ) -> Result<(), StoreError> {
        let active = login_attempts::ActiveModel {
            user_id: Set(user_id),
            email: Set(email.to_string()),
            success: Set(success),
            failure_reason: Set(failure_reason.map(ToString::to_string)),
            ip_address: Set(origin.ip_address.clone()),
            user_agent: Set(origin.user_agent.clone()),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        LoginAttempts::insert(active).exec(&self.conn).await?;
        Ok(())
    }

    pub async fn insert_audit_event(
        &self,
        user_id: i32,
        action: &str,
        details: Option<serde_json::Value>,
        origin: &ClientOrigin,
    ) -> Result<(), StoreError> {
        let active = audit_logs::ActiveModel {
            user_id: Set(user_id),
            action: Set(action.to_string()),
            details: Set(details.map(|d| d.to_string())),
            ip_address: Set(origin.ip_address.clone()),
            user_agent: Set(origin.user_agent.clone()),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        AuditLogs::insert(active).exec(&self.conn).await?;
        Ok(())
    }

    pub async fn login_attempts(
        &self,
        page: u64,
        page_size: u64,
        email_filter: Option<String>,
    ) -> Result<(Vec<login_attempts::Model>, u64), StoreError> {
        let mut query =
            LoginAttempts::find().order_by_desc(login_attempts::Column::CreatedAt);

        if let Some(email) = email_filter {
            query = query.filter(login_attempts::Column::Email.eq(email));
        }

        let paginator = query.paginate(&self.conn, page_size);
        let total_pages = paginator.num_pages().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total_pages))
    }

    pub async fn audit_events(
        &self,
        page: u64,
        page_size: u64,
        action_filter: Option<String>,
    ) -> Result<(Vec<audit_logs::Model>, u64), StoreError> {
        let mut query = AuditLogs::find().order_by_desc(audit_logs::Column::CreatedAt);

        if let Some(action) = action_filter {
            query = query.filter(audit_logs::Column::Action.contains(action));
        }

        let paginator = query.paginate(&self.conn, page_size);
        let total_pages = paginator.num_pages().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total_pages))
    }
}
