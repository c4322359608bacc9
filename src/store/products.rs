use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;

use super::Store;
use crate::entities::{
    category::{self, Entity as CategoryEntity},
    product::{self, Entity as ProductEntity},
    product_image::{self, Entity as ProductImageEntity},
};
use crate::error::{AppError, Result};

pub const MAX_IMAGES_PER_PRODUCT: usize = 10;

/// Validated product fields as submitted by the admin form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductDraft {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub category_id: Option<i32>,
    pub size_open: Option<String>,
    pub size_closed: Option<String>,
    pub weight_net: Option<String>,
    pub weight_gross: Option<String>,
    pub diameter: Option<String>,
    pub contents: Option<String>,
    pub delivery_return: Option<String>,
    pub care_instructions: Option<String>,
}

impl ProductDraft {
    fn apply(self, model: &mut product::ActiveModel) {
        model.name = Set(self.name);
        model.description = Set(self.description);
        model.price = Set(self.price);
        model.category_id = Set(self.category_id);
        model.size_open = Set(self.size_open);
        model.size_closed = Set(self.size_closed);
        model.weight_net = Set(self.weight_net);
        model.weight_gross = Set(self.weight_gross);
        model.diameter = Set(self.diameter);
        model.contents = Set(self.contents);
        model.delivery_return = Set(self.delivery_return);
        model.care_instructions = Set(self.care_instructions);
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub draft: ProductDraft,
    /// Preview the form asked to keep, if any.
    pub existing_image: Option<String>,
    /// Freshly stored uploads, in upload order.
    pub new_images: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductListing {
    #[serde(flatten)]
    pub product: product::Model,
    pub category_name: Option<String>,
}

impl From<(product::Model, Option<category::Model>)> for ProductListing {
    fn from((product, category): (product::Model, Option<category::Model>)) -> Self {
        Self {
            product,
            category_name: category.map(|c| c.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductRemoval {
    pub images: usize,
    pub files_removed: usize,
}

impl Store {
    /// Newest first, optionally restricted to one category.
    pub async fn list_products(&self, category_id: Option<i32>) -> Result<Vec<ProductListing>> {
        let mut query = ProductEntity::find().find_also_related(CategoryEntity);
        if let Some(category_id) = category_id {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }

        let rows = query
            .order_by_desc(product::Column::CreatedAt)
            .order_by_desc(product::Column::Id)
            .all(&self.db)
            .await?;

        Ok(rows.into_iter().map(ProductListing::from).collect())
    }

    pub async fn find_product(&self, id: i32) -> Result<Option<ProductListing>> {
        let row = ProductEntity::find_by_id(id)
            .find_also_related(CategoryEntity)
            .one(&self.db)
            .await?;

        Ok(row.map(ProductListing::from))
    }

    /// Inserts the product and its images. The first image becomes the preview.
    pub async fn create_product(
        &self,
        draft: ProductDraft,
        image_paths: Vec<String>,
    ) -> Result<product::Model> {
        check_image_count(0, image_paths.len())?;

        let txn = self.db.begin().await?;
        ensure_category(&txn, draft.category_id).await?;

        let mut new_product = product::ActiveModel {
            image_path: Set(image_paths.first().cloned()),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        };
        draft.apply(&mut new_product);
        let created = new_product.insert(&txn).await?;

        insert_images(&txn, created.id, &image_paths).await?;
        txn.commit().await?;

        Ok(created)
    }

    pub async fn update_product(
        &self,
        id: i32,
        update: ProductUpdate,
    ) -> Result<Option<product::Model>> {
        let txn = self.db.begin().await?;

        let Some(current) = ProductEntity::find_by_id(id).one(&txn).await? else {
            txn.rollback().await?;
            return Ok(None);
        };
        ensure_category(&txn, update.draft.category_id).await?;

        let stored = ProductImageEntity::find()
            .filter(product_image::Column::ProductId.eq(id))
            .count(&txn)
            .await?;
        check_image_count(stored as usize, update.new_images.len())?;
        insert_images(&txn, id, &update.new_images).await?;

        let known = product_image_paths(&txn, id).await?;
        let kept = update
            .existing_image
            .filter(|path| known.contains(path) || current.image_path.as_ref() == Some(path));
        let preview = match (update.new_images.first(), kept) {
            (Some(first_new), _) => Some(first_new.clone()),
            (None, Some(kept)) => Some(kept),
            (None, None) => first_image_path(&txn, id).await?,
        };

        let mut model = current.into_active_model();
        update.draft.apply(&mut model);
        model.image_path = Set(preview);
        let updated = model.update(&txn).await?;
        txn.commit().await?;

        Ok(Some(updated))
    }

    /// Deletes the product and its image rows in one transaction, then
    /// removes the image files. A file that cannot be removed is logged and
    /// does not fail the call.
    pub async fn delete_product(&self, id: i32) -> Result<Option<ProductRemoval>> {
        let txn = self.db.begin().await?;

        let Some(model) = ProductEntity::find_by_id(id).one(&txn).await? else {
            txn.rollback().await?;
            return Ok(None);
        };

        let mut image_paths = product_image_paths(&txn, id).await?;
        if let Some(preview) = &model.image_path {
            if !image_paths.contains(preview) {
                image_paths.push(preview.clone());
            }
        }

        let images = ProductImageEntity::delete_many()
            .filter(product_image::Column::ProductId.eq(id))
            .exec(&txn)
            .await?
            .rows_affected as usize;
        model.delete(&txn).await?;
        txn.commit().await?;

        let files_removed = self.remove_image_files(image_paths).await;

        Ok(Some(ProductRemoval {
            images,
            files_removed,
        }))
    }

    /// Oldest first.
    pub async fn list_product_images(&self, product_id: i32) -> Result<Vec<product_image::Model>> {
        Ok(images_of(product_id).all(&self.db).await?)
    }

    /// Path of the earliest image, the preview a product falls back to.
    pub async fn first_product_image(&self, product_id: i32) -> Result<Option<String>> {
        first_image_path(&self.db, product_id).await
    }

    /// Deletes one image of a product. If it was the preview, the preview
    /// moves to the earliest remaining image, or is cleared. Returns the
    /// remaining images, or `None` if the image does not belong to the product.
    pub async fn delete_product_image(
        &self,
        product_id: i32,
        image_id: i32,
    ) -> Result<Option<Vec<product_image::Model>>> {
        let txn = self.db.begin().await?;

        let image = ProductImageEntity::find_by_id(image_id)
            .filter(product_image::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;
        let (Some(image), Some(product)) = (
            image,
            ProductEntity::find_by_id(product_id).one(&txn).await?,
        ) else {
            txn.rollback().await?;
            return Ok(None);
        };

        let removed_path = image.image_path.clone();
        image.delete(&txn).await?;

        if product.image_path.as_deref() == Some(removed_path.as_str()) {
            let next_preview = first_image_path(&txn, product_id).await?;
            let mut product = product.into_active_model();
            product.image_path = Set(next_preview);
            product.update(&txn).await?;
        }
        let remaining = images_of(product_id).all(&txn).await?;
        txn.commit().await?;

        self.remove_image_files(vec![removed_path]).await;

        Ok(Some(remaining))
    }
}

fn images_of(product_id: i32) -> sea_orm::Select<ProductImageEntity> {
    ProductImageEntity::find()
        .filter(product_image::Column::ProductId.eq(product_id))
        .order_by_asc(product_image::Column::CreatedAt)
        .order_by_asc(product_image::Column::Id)
}

async fn product_image_paths<C: ConnectionTrait>(db: &C, product_id: i32) -> Result<Vec<String>> {
    Ok(images_of(product_id)
        .select_only()
        .column(product_image::Column::ImagePath)
        .into_tuple::<String>()
        .all(db)
        .await?)
}

async fn first_image_path<C: ConnectionTrait>(db: &C, product_id: i32) -> Result<Option<String>> {
    Ok(images_of(product_id)
        .select_only()
        .column(product_image::Column::ImagePath)
        .into_tuple::<String>()
        .one(db)
        .await?)
}

async fn insert_images<C: ConnectionTrait>(db: &C, product_id: i32, paths: &[String]) -> Result<()> {
    if paths.is_empty() {
        return Ok(());
    }

    let created_at = Utc::now().naive_utc();
    let rows = paths.iter().map(|path| product_image::ActiveModel {
        product_id: Set(product_id),
        image_path: Set(path.clone()),
        created_at: Set(created_at),
        ..Default::default()
    });
    ProductImageEntity::insert_many(rows).exec(db).await?;

    Ok(())
}

async fn ensure_category<C: ConnectionTrait>(db: &C, category_id: Option<i32>) -> Result<()> {
    let Some(category_id) = category_id else {
        return Ok(());
    };

    match CategoryEntity::find_by_id(category_id).one(db).await? {
        Some(_) => Ok(()),
        None => Err(AppError::Validation(format!(
            "Категория с id {category_id} не найдена"
        ))),
    }
}

fn check_image_count(stored: usize, incoming: usize) -> Result<()> {
    if stored + incoming > MAX_IMAGES_PER_PRODUCT {
        return Err(AppError::Validation(format!(
            "Можно загрузить не более {MAX_IMAGES_PER_PRODUCT} изображений на товар"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_count_is_capped_per_product() {
        assert!(check_image_count(0, MAX_IMAGES_PER_PRODUCT).is_ok());
        assert!(check_image_count(4, 6).is_ok());
        assert!(matches!(
            check_image_count(4, 7),
            Err(AppError::Validation(_))
        ));
    }
}
