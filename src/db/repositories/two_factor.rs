use rand::Rng;
use rand::distr::Alphanumeric;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, TransactionTrait,
};

use crate::db::StoreError;
use crate::entities::{prelude::*, two_factor_backup_codes, user_2fa};

/// Number of single-use backup codes issued per setup.
const BACKUP_CODE_COUNT: usize = 8;

const BACKUP_CODE_LEN: usize = 10;

/// 2FA configuration returned from the repository.
#[derive(Debug, Clone)]
pub struct TwoFactorConfig {
    pub user_id: i32,
    pub secret: String,
    pub enabled: bool,
    pub enabled_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<user_2fa::Model> for TwoFactorConfig {
    fn from(model: user_2fa::Model) -> Self {
        Self {
            user_id: model.user_id,
            secret: model.secret,
            enabled: model.enabled,
            enabled_at: model.enabled_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub struct TwoFactorRepository {
    conn: DatabaseConnection,
}

impl TwoFactorRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Creates or replaces the 2FA row for a user and rotates their backup
    /// codes. The row upsert is a single conditional-write statement keyed on
    /// the primary key, so two concurrent setups cannot produce two rows;
    /// the code rotation rides in the same transaction. Returns the stored
    /// config plus the plaintext codes, which are only ever shown once.
    pub async fn create(
        &self,
        user_id: i32,
        secret: &str,
    ) -> Result<(TwoFactorConfig, Vec<String>), StoreError> {
        let now = chrono::Utc::now().to_rfc3339();
        let codes: Vec<String> = (0..BACKUP_CODE_COUNT).map(|_| generate_backup_code()).collect();

        let txn = self.conn.begin().await?;

        let active = user_2fa::ActiveModel {
            user_id: Set(user_id),
            secret: Set(secret.to_string()),
            enabled: Set(false),
            enabled_at: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
        };

        User2fa::insert(active)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(user_2fa::Column::UserId)
                    .update_columns([
                        user_2fa::Column::Secret,
                        user_2fa::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&txn)
            .await?;

        two_factor_backup_codes::Entity::delete_many()
            .filter(two_factor_backup_codes::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        let rows = codes.iter().map(|code| two_factor_backup_codes::ActiveModel {
            user_id: Set(user_id),
            code: Set(code.clone()),
            used: Set(false),
            used_at: Set(None),
            created_at: Set(now.clone()),
            ..Default::default()
        });

        TwoFactorBackupCodes::insert_many(rows).exec(&txn).await?;

        txn.commit().await?;

        let config = self
            .get(user_id)
            .await?
            .ok_or_else(|| StoreError::Internal("2fa row missing after upsert".to_string()))?;

        Ok((config, codes))
    }

    /// Flips the enabled flag and stamps when it happened. A single
    /// conditional update: safe no-op when no row exists or the flag is
    /// already set.
    pub async fn enable(&self, user_id: i32) -> Result<(), StoreError> {
        let now = chrono::Utc::now().to_rfc3339();

        user_2fa::Entity::update_many()
            .col_expr(user_2fa::Column::Enabled, sea_orm::sea_query::Expr::value(true))
            .col_expr(
                user_2fa::Column::EnabledAt,
                sea_orm::sea_query::Expr::value(now.clone()),
            )
            .col_expr(user_2fa::Column::UpdatedAt, sea_orm::sea_query::Expr::value(now))
            .filter(user_2fa::Column::UserId.eq(user_id))
            .filter(user_2fa::Column::Enabled.eq(false))
            .exec(&self.conn)
            .await?;

        Ok(())
    }

    pub async fn get(&self, user_id: i32) -> Result<Option<TwoFactorConfig>, StoreError> {
        let config = User2fa::find_by_id(user_id).one(&self.conn).await?;
        Ok(config.map(TwoFactorConfig::from))
    }

    /// Marks a backup code used. Single-use is enforced by the conditional
    /// update itself: whichever of two racing calls the database applies
    /// first wins, the other sees zero rows affected.
    pub async fn consume_backup_code(
        &self,
        user_id: i32,
        code: &str,
    ) -> Result<bool, StoreError> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = two_factor_backup_codes::Entity::update_many()
            .col_expr(
                two_factor_backup_codes::Column::Used,
                sea_orm::sea_query::Expr::value(true),
            )
            .col_expr(
                two_factor_backup_codes::Column::UsedAt,
                sea_orm::sea_query::Expr::value(now),
            )
            .filter(two_factor_backup_codes::Column::UserId.eq(user_id))
            .filter(two_factor_backup_codes::Column::Code.eq(code))
            .filter(two_factor_backup_codes::Column::Used.eq(false))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    pub async fn remaining_backup_codes(&self, user_id: i32) -> Result<u64, StoreError> {
        use sea_orm::PaginatorTrait;

        let count = two_factor_backup_codes::Entity::find()
            .filter(two_factor_backup_codes::Column::UserId.eq(user_id))
            .filter(two_factor_backup_codes::Column::Used.eq(false))
            .count(&self.conn)
            .await?;

        Ok(count)
    }
}

fn generate_backup_code() -> String {
    let mut rng = rand::rng();
    (0..BACKUP_CODE_LEN)
        .map(|_| rng.sample(Alphanumeric) as char)
        .collect()
}

/// Random 2FA secret, generated at setup time. TOTP provisioning/encoding is
/// the client's concern.
#[must_use]
pub fn generate_secret() -> String {
    let mut rng = rand::rng();
    (0..32).map(|_| rng.sample(Alphanumeric) as char).collect()
}
