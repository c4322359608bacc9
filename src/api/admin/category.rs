use axum::{
    extract::{Extension, Path},
    response::{Html, Redirect},
    Form,
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::{not_blank, optional_text};
use crate::api::AppState;
use crate::error::{AppError, PageError};
use crate::views::{self, AdminCategoriesPage};

const CATEGORIES_PATH: &str = "/admin/categories";

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CategoryForm {
    #[validate(
        custom(function = "not_blank", message = "Название категории обязательно"),
        length(max = 200, message = "Название категории не длиннее 200 символов")
    )]
    pub name: String,
    pub description: Option<String>,
}

impl CategoryForm {
    fn into_fields(self) -> Result<(String, Option<String>), AppError> {
        self.validate()?;
        Ok((self.name.trim().to_owned(), optional_text(self.description)))
    }
}

pub async fn categories_page(
    Extension(state): Extension<AppState>,
) -> Result<Html<String>, PageError> {
    let categories = state.store.list_categories().await?;
    let products = state.store.list_products(None).await?;

    Ok(views::render(&AdminCategoriesPage::new(categories, &products))?)
}

pub async fn create_category(
    Extension(state): Extension<AppState>,
    Form(form): Form<CategoryForm>,
) -> Result<Redirect, PageError> {
    let (name, description) = form.into_fields()?;
    let created = state.store.create_category(name, description).await?;
    info!(id = created.id, name = %created.name, "Category created");

    Ok(Redirect::to(CATEGORIES_PATH))
}

pub async fn update_category(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
    Form(form): Form<CategoryForm>,
) -> Result<Redirect, PageError> {
    let (name, description) = form.into_fields()?;
    state
        .store
        .update_category(id, name, description)
        .await?
        .ok_or_else(|| AppError::NotFound("Категория не найдена".to_owned()))?;

    Ok(Redirect::to(CATEGORIES_PATH))
}

pub async fn delete_category(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> Result<Redirect, PageError> {
    let detached = state
        .store
        .delete_category(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Категория не найдена".to_owned()))?;
    info!(id, detached, "Category deleted");

    Ok(Redirect::to(CATEGORIES_PATH))
}
