use std::collections::HashMap;

use axum::{
    extract::{Extension, Multipart, Path},
    response::{Html, Redirect},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;
use validator::Validate;

use super::upload::{read_product_multipart, store_images};
use super::{not_blank, optional_text};
use crate::api::AppState;
use crate::entities::product_image;
use crate::error::{AppError, PageError, Result};
use crate::store::{ProductDraft, ProductListing, ProductUpdate};
use crate::views::{self, AdminProductsPage};

const PRODUCTS_PATH: &str = "/admin/products";

/// Text fields of the product form, before parsing.
#[derive(Debug, Default, Validate)]
pub struct ProductForm {
    #[validate(
        custom(function = "not_blank", message = "Название товара обязательно"),
        length(max = 200, message = "Название товара не длиннее 200 символов")
    )]
    pub name: String,
    pub description: Option<String>,
    pub price: String,
    pub category_id: Option<String>,
    pub existing_image: Option<String>,
    pub size_open: Option<String>,
    pub size_closed: Option<String>,
    pub weight_net: Option<String>,
    pub weight_gross: Option<String>,
    pub diameter: Option<String>,
    pub contents: Option<String>,
    pub delivery_return: Option<String>,
    pub care_instructions: Option<String>,
}

impl ProductForm {
    pub fn from_fields(mut fields: HashMap<String, String>) -> Self {
        let mut take = |key: &str| fields.remove(key);
        Self {
            name: take("name").unwrap_or_default(),
            description: take("description"),
            price: take("price").unwrap_or_default(),
            category_id: take("category_id"),
            existing_image: take("existing_image"),
            size_open: take("size_open"),
            size_closed: take("size_closed"),
            weight_net: take("weight_net"),
            weight_gross: take("weight_gross"),
            diameter: take("diameter"),
            contents: take("contents"),
            delivery_return: take("delivery_return"),
            care_instructions: take("care_instructions"),
        }
    }

    /// Validates and parses the form. Returns the draft and the preview the
    /// form asked to keep.
    pub fn into_draft(self) -> Result<(ProductDraft, Option<String>)> {
        self.validate()?;

        let price = parse_price(&self.price)?;
        let category_id = match optional_text(self.category_id) {
            None => None,
            Some(raw) => Some(
                raw.parse::<i32>()
                    .map_err(|_| AppError::Validation("Некорректная категория".to_owned()))?,
            ),
        };

        let draft = ProductDraft {
            name: self.name.trim().to_owned(),
            description: optional_text(self.description),
            price,
            category_id,
            size_open: optional_text(self.size_open),
            size_closed: optional_text(self.size_closed),
            weight_net: optional_text(self.weight_net),
            weight_gross: optional_text(self.weight_gross),
            diameter: optional_text(self.diameter),
            contents: optional_text(self.contents),
            delivery_return: optional_text(self.delivery_return),
            care_instructions: optional_text(self.care_instructions),
        };

        Ok((draft, optional_text(self.existing_image)))
    }
}

/// Accepts `12.5` and `12,5`. Must be finite and not negative.
fn parse_price(raw: &str) -> Result<f64> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|price| price.is_finite() && *price >= 0.0)
        .ok_or_else(|| AppError::Validation("Цена должна быть неотрицательным числом".to_owned()))
}

#[derive(Debug, Serialize)]
pub struct ProductDetails {
    #[serde(flatten)]
    pub listing: ProductListing,
    pub images: Vec<product_image::Model>,
}

pub async fn products_page(
    Extension(state): Extension<AppState>,
) -> std::result::Result<Html<String>, PageError> {
    let products = state.store.list_products(None).await?;
    let categories = state.store.list_categories().await?;

    Ok(views::render(&AdminProductsPage {
        products,
        categories,
    })?)
}

pub async fn create_product(
    Extension(state): Extension<AppState>,
    multipart: Multipart,
) -> std::result::Result<Redirect, PageError> {
    let upload = read_product_multipart(multipart).await?;
    let (draft, _) = ProductForm::from_fields(upload.fields).into_draft()?;

    let image_paths = store_images(&state.store, upload.images).await?;
    match state.store.create_product(draft, image_paths.clone()).await {
        Ok(created) => {
            info!(id = created.id, images = image_paths.len(), "Product created");
            Ok(Redirect::to(PRODUCTS_PATH))
        }
        Err(err) => {
            state.store.remove_image_files(image_paths).await;
            Err(err.into())
        }
    }
}

pub async fn update_product(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
    multipart: Multipart,
) -> std::result::Result<Redirect, PageError> {
    let upload = read_product_multipart(multipart).await?;
    let (draft, existing_image) = ProductForm::from_fields(upload.fields).into_draft()?;

    let new_images = store_images(&state.store, upload.images).await?;
    let update = ProductUpdate {
        draft,
        existing_image,
        new_images: new_images.clone(),
    };

    let outcome = match state.store.update_product(id, update).await {
        Ok(Some(updated)) => {
            info!(id = updated.id, added_images = new_images.len(), "Product updated");
            return Ok(Redirect::to(PRODUCTS_PATH));
        }
        Ok(None) => AppError::NotFound("Товар не найден".to_owned()),
        Err(err) => err,
    };

    state.store.remove_image_files(new_images).await;
    Err(outcome.into())
}

pub async fn delete_product(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> std::result::Result<Redirect, PageError> {
    let removal = state
        .store
        .delete_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Товар не найден".to_owned()))?;
    info!(
        id,
        images = removal.images,
        files_removed = removal.files_removed,
        "Product deleted"
    );

    Ok(Redirect::to(PRODUCTS_PATH))
}

pub async fn get_product(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> Result<Json<ProductDetails>> {
    let listing = state
        .store
        .find_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Товар не найден".to_owned()))?;
    let images = state.store.list_product_images(id).await?;

    Ok(Json(ProductDetails { listing, images }))
}

pub async fn delete_product_image(
    Path((id, image_id)): Path<(i32, i32)>,
    Extension(state): Extension<AppState>,
) -> Result<Json<Value>> {
    let images = state
        .store
        .delete_product_image(id, image_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Изображение не найдено".to_owned()))?;
    info!(product_id = id, image_id, remaining = images.len(), "Product image deleted");

    Ok(Json(json!({
        "success": true,
        "images": images,
    })))
}
