use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};

use super::Store;
use crate::entities::{
    category::{self, Entity as CategoryEntity},
    product::{self, Entity as ProductEntity},
};
use crate::error::Result;

impl Store {
    /// Newest first.
    pub async fn list_categories(&self) -> Result<Vec<category::Model>> {
        Ok(CategoryEntity::find()
            .order_by_desc(category::Column::CreatedAt)
            .order_by_desc(category::Column::Id)
            .all(&self.db)
            .await?)
    }

    pub async fn find_category(&self, id: i32) -> Result<Option<category::Model>> {
        Ok(CategoryEntity::find_by_id(id).one(&self.db).await?)
    }

    pub async fn create_category(
        &self,
        name: String,
        description: Option<String>,
    ) -> Result<category::Model> {
        let new_category = category::ActiveModel {
            name: Set(name),
            description: Set(description),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        };

        Ok(new_category.insert(&self.db).await?)
    }

    pub async fn update_category(
        &self,
        id: i32,
        name: String,
        description: Option<String>,
    ) -> Result<Option<category::Model>> {
        let txn = self.db.begin().await?;

        let Some(model) = CategoryEntity::find_by_id(id).one(&txn).await? else {
            txn.rollback().await?;
            return Ok(None);
        };

        let mut model = model.into_active_model();
        model.name = Set(name);
        model.description = Set(description);
        let updated = model.update(&txn).await?;
        txn.commit().await?;

        Ok(Some(updated))
    }

    /// Deletes the category and detaches its products (their `category_id`
    /// becomes null). Returns the number of detached products, or `None` if
    /// the category does not exist.
    pub async fn delete_category(&self, id: i32) -> Result<Option<u64>> {
        let txn = self.db.begin().await?;

        let Some(model) = CategoryEntity::find_by_id(id).one(&txn).await? else {
            txn.rollback().await?;
            return Ok(None);
        };

        let detached = ProductEntity::update_many()
            .col_expr(product::Column::CategoryId, Expr::value(Option::<i32>::None))
            .filter(product::Column::CategoryId.eq(id))
            .exec(&txn)
            .await?
            .rows_affected;

        model.delete(&txn).await?;
        txn.commit().await?;

        Ok(Some(detached))
    }
}
