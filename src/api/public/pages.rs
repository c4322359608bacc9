use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::api::AppState;
use crate::error::PageError;
use crate::views::{self, CategoryPage, GalleryPage, NotFoundPage, OrderPage, ProductPage, StaticPage};

pub async fn home() -> Result<Html<String>, PageError> {
    Ok(views::render(&StaticPage::home())?)
}

pub async fn about() -> Result<Html<String>, PageError> {
    Ok(views::render(&StaticPage::about())?)
}

pub async fn collaboration() -> Result<Html<String>, PageError> {
    Ok(views::render(&StaticPage::collaboration())?)
}

pub async fn contacts() -> Result<Html<String>, PageError> {
    Ok(views::render(&StaticPage::contacts())?)
}

pub async fn order_page() -> Result<Html<String>, PageError> {
    Ok(views::render(&OrderPage)?)
}

pub async fn gallery(Extension(state): Extension<AppState>) -> Result<Html<String>, PageError> {
    let products = state.store.list_products(None).await?;
    let categories = state.store.list_categories().await?;

    Ok(views::render(&GalleryPage {
        products,
        categories,
    })?)
}

pub async fn category(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> Result<Response, PageError> {
    let Some(category) = state.store.find_category(id).await? else {
        return missing("Категория не найдена");
    };
    let products = state.store.list_products(Some(id)).await?;

    Ok(views::render(&CategoryPage { category, products })?.into_response())
}

pub async fn product(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> Result<Response, PageError> {
    let Some(listing) = state.store.find_product(id).await? else {
        return missing("Товар не найден");
    };
    let images = state.store.list_product_images(id).await?;

    Ok(views::render(&ProductPage::new(listing, images))?.into_response())
}

pub async fn not_found() -> Result<Response, PageError> {
    missing("Страница не найдена")
}

fn missing(title: &str) -> Result<Response, PageError> {
    let page = NotFoundPage {
        title: title.to_owned(),
    };
    Ok((StatusCode::NOT_FOUND, views::render(&page)?).into_response())
}
