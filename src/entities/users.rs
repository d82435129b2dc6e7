use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,

    #[sea_orm(unique)]
    pub email: String,

    /// Argon2id digest; absent for federated-only accounts.
    pub password_hash: Option<String>,

    /// "admin" or "user". Sticky to the record, never derived per-request.
    pub role: String,

    pub email_verified: bool,

    pub email_verified_at: Option<String>,

    pub is_active: bool,

    pub last_login: Option<String>,

    /// Identity-provider subject for federated sign-in.
    #[sea_orm(unique)]
    pub federated_id: Option<String>,

    pub avatar_url: Option<String>,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    pub bio: Option<String>,

    pub location: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
