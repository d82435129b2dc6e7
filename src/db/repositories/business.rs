use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::db::StoreError;
use crate::entities::businesses;

/// Input for creating or updating a directory listing.
#[derive(Debug, Clone)]
pub struct BusinessInput {
    pub name: String,
    pub category: String,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
}

pub struct BusinessRepository {
    conn: DatabaseConnection,
}

impl BusinessRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(
        &self,
        owner_id: i32,
        input: BusinessInput,
    ) -> Result<businesses::Model, StoreError> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = businesses::ActiveModel {
            owner_id: Set(owner_id),
            name: Set(input.name),
            category: Set(input.category),
            region: Set(input.region),
            latitude: Set(input.latitude),
            longitude: Set(input.longitude),
            description: Set(input.description),
            verified: Set(false),
            is_active: Set(true),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active.insert(&self.conn).await?;
        Ok(model)
    }

    pub async fn get(&self, id: i32) -> Result<Option<businesses::Model>, StoreError> {
        let row = businesses::Entity::find_by_id(id)
            .filter(businesses::Column::IsActive.eq(true))
            .one(&self.conn)
            .await?;

        Ok(row)
    }

    pub async fn list(
        &self,
        region: Option<String>,
        category: Option<String>,
    ) -> Result<Vec<businesses::Model>, StoreError> {
        let mut query = businesses::Entity::find()
            .filter(businesses::Column::IsActive.eq(true))
            .order_by_asc(businesses::Column::Name);

        if let Some(region) = region {
            query = query.filter(businesses::Column::Region.eq(region));
        }

        if let Some(category) = category {
            query = query.filter(businesses::Column::Category.eq(category));
        }

        let rows = query.all(&self.conn).await?;
        Ok(rows)
    }

    /// Updates a listing owned by `owner_id`. Returns `None` when the
    /// listing does not exist, is inactive, or belongs to someone else.
    pub async fn update(
        &self,
        id: i32,
        owner_id: i32,
        input: BusinessInput,
    ) -> Result<Option<businesses::Model>, StoreError> {
        let Some(row) = businesses::Entity::find_by_id(id)
            .filter(businesses::Column::IsActive.eq(true))
            .filter(businesses::Column::OwnerId.eq(owner_id))
            .one(&self.conn)
            .await?
        else {
            return Ok(None);
        };

        let mut active: businesses::ActiveModel = row.into();
        active.name = Set(input.name);
        active.category = Set(input.category);
        active.region = Set(input.region);
        active.latitude = Set(input.latitude);
        active.longitude = Set(input.longitude);
        active.description = Set(input.description);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let model = active.update(&self.conn).await?;
        Ok(Some(model))
    }

    pub async fn set_verified(&self, id: i32, verified: bool) -> Result<bool, StoreError> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = businesses::Entity::update_many()
            .col_expr(
                businesses::Column::Verified,
                sea_orm::sea_query::Expr::value(verified),
            )
            .col_expr(businesses::Column::UpdatedAt, sea_orm::sea_query::Expr::value(now))
            .filter(businesses::Column::Id.eq(id))
            .filter(businesses::Column::IsActive.eq(true))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Soft-delete; mirrors user deactivation.
    pub async fn deactivate(&self, id: i32, owner_id: Option<i32>) -> Result<bool, StoreError> {
        let now = chrono::Utc::now().to_rfc3339();

        let mut query = businesses::Entity::update_many()
            .col_expr(
                businesses::Column::IsActive,
                sea_orm::sea_query::Expr::value(false),
            )
            .col_expr(businesses::Column::UpdatedAt, sea_orm::sea_query::Expr::value(now))
            .filter(businesses::Column::Id.eq(id))
            .filter(businesses::Column::IsActive.eq(true));

        if let Some(owner_id) = owner_id {
            query = query.filter(businesses::Column::OwnerId.eq(owner_id));
        }

        let result = query.exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }
}
