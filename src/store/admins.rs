use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, Set,
    TransactionTrait,
};

use super::Store;
use crate::entities::admin::{self, hash_password, Entity as AdminEntity};
use crate::error::{AppError, Result};

impl Store {
    pub async fn find_admin_by_username(&self, username: &str) -> Result<Option<admin::Model>> {
        Ok(AdminEntity::find()
            .filter(admin::Column::Username.eq(username))
            .one(&self.db)
            .await?)
    }

    pub async fn find_admin_by_id(&self, id: i32) -> Result<Option<admin::Model>> {
        Ok(AdminEntity::find_by_id(id).one(&self.db).await?)
    }

    /// Creates the admin unless one with this username exists. Returns
    /// whether a row was inserted.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> Result<bool> {
        let txn = self.db.begin().await?;

        let existing = AdminEntity::find()
            .filter(admin::Column::Username.eq(username))
            .one(&txn)
            .await?;
        if existing.is_some() {
            txn.rollback().await?;
            return Ok(false);
        }

        let new_admin = admin::ActiveModel {
            username: Set(username.to_owned()),
            password: Set(hash(password)?),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        };
        new_admin.insert(&txn).await?;
        txn.commit().await?;

        Ok(true)
    }

    /// Hashes and stores a new password. Returns `false` if the admin is gone.
    pub async fn update_admin_password(&self, id: i32, new_password: &str) -> Result<bool> {
        let txn = self.db.begin().await?;

        let Some(model) = AdminEntity::find_by_id(id).one(&txn).await? else {
            txn.rollback().await?;
            return Ok(false);
        };

        let mut model = model.into_active_model();
        model.password = Set(hash(new_password)?);
        model.update(&txn).await?;
        txn.commit().await?;

        Ok(true)
    }
}

fn hash(password: &str) -> Result<String> {
    hash_password(password).map_err(|err| AppError::Internal(format!("Failed to hash password: {err}")))
}
