pub mod auth;
pub mod category;
pub mod product;
pub mod upload;

use axum::{
    extract::Extension,
    middleware::from_fn_with_state,
    response::Html,
    routing::{get, post},
    Router,
};
use validator::ValidationError;

use crate::api::AppState;
use crate::error::PageError;
use crate::middleware::auth::{require_admin, require_admin_api, AuthState};
use crate::views::{self, AdminIndexPage};

pub fn admin_router(auth: AuthState) -> Router {
    let pages = Router::new()
        .route("/admin", get(dashboard))
        .route(
            "/admin/change-password",
            get(auth::change_password_page).post(auth::change_password),
        )
        .route(
            "/admin/categories",
            get(category::categories_page).post(category::create_category),
        )
        .route("/admin/categories/:id/update", post(category::update_category))
        .route("/admin/categories/:id/delete", post(category::delete_category))
        .route(
            "/admin/products",
            get(product::products_page).post(product::create_product),
        )
        .route("/admin/products/:id/update", post(product::update_product))
        .route("/admin/products/:id/delete", post(product::delete_product))
        .route_layer(from_fn_with_state(auth.clone(), require_admin));

    let api = Router::new()
        .route("/admin/products/:id", get(product::get_product))
        .route(
            "/admin/products/:id/images/:image_id/delete",
            post(product::delete_product_image),
        )
        .route_layer(from_fn_with_state(auth, require_admin_api));

    Router::new()
        .route("/admin/login", get(auth::login_page).post(auth::login))
        .route("/admin/logout", get(auth::logout).post(auth::logout))
        .merge(pages)
        .merge(api)
}

async fn dashboard(Extension(state): Extension<AppState>) -> Result<Html<String>, PageError> {
    let products = state.store.list_products(None).await?;
    let categories = state.store.list_categories().await?;

    Ok(views::render(&AdminIndexPage {
        product_count: products.len(),
        category_count: categories.len(),
    })?)
}

pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Trimmed value, or `None` when nothing is left.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
