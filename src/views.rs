//! Server-rendered pages. Markup lives in `templates/`; askama escapes every
//! interpolated value.

use askama::Template;
use axum::response::Html;

use crate::entities::{category, product_image};
use crate::error::AppError;
use crate::store::ProductListing;

pub fn render<T: Template>(page: &T) -> Result<Html<String>, AppError> {
    Ok(Html(page.render()?))
}

/// A form error tied to one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Template)]
#[template(path = "static.html")]
pub struct StaticPage {
    pub title: &'static str,
    pub text: &'static str,
}

impl StaticPage {
    pub fn home() -> Self {
        Self {
            title: "Главная",
            text: "Изделия из дерева ручной работы.",
        }
    }

    pub fn about() -> Self {
        Self {
            title: "О нас",
            text: "Мастерская HandWood.",
        }
    }

    pub fn collaboration() -> Self {
        Self {
            title: "Сотрудничество",
            text: "Открыты к сотрудничеству.",
        }
    }

    pub fn contacts() -> Self {
        Self {
            title: "Контакты",
            text: "Свяжитесь с нами через форму заказа.",
        }
    }
}

#[derive(Template)]
#[template(path = "order.html")]
pub struct OrderPage;

#[derive(Template)]
#[template(path = "gallery.html")]
pub struct GalleryPage {
    pub products: Vec<ProductListing>,
    pub categories: Vec<category::Model>,
}

#[derive(Template)]
#[template(path = "category.html")]
pub struct CategoryPage {
    pub category: category::Model,
    pub products: Vec<ProductListing>,
}

#[derive(Template)]
#[template(path = "product.html")]
pub struct ProductPage {
    pub listing: ProductListing,
    pub images: Vec<product_image::Model>,
    specs: Vec<(&'static str, String)>,
}

impl ProductPage {
    pub fn new(listing: ProductListing, images: Vec<product_image::Model>) -> Self {
        let product = &listing.product;
        let specs = [
            ("Размер в раскрытом виде", &product.size_open),
            ("Размер в сложенном виде", &product.size_closed),
            ("Вес нетто", &product.weight_net),
            ("Вес брутто", &product.weight_gross),
            ("Диаметр", &product.diameter),
            ("Комплектация", &product.contents),
            ("Доставка и возврат", &product.delivery_return),
            ("Уход", &product.care_instructions),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.clone().map(|value| (label, value)))
        .collect();

        Self {
            listing,
            images,
            specs,
        }
    }
}

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundPage {
    pub title: String,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorPage {
    pub status: u16,
    pub message: String,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "change_password.html")]
pub struct ChangePasswordPage {
    pub username: String,
    pub error: Option<FieldError>,
    pub success: Option<String>,
}

#[derive(Template)]
#[template(path = "admin/index.html")]
pub struct AdminIndexPage {
    pub product_count: usize,
    pub category_count: usize,
}

pub struct CategoryRow {
    pub category: category::Model,
    pub product_count: usize,
}

#[derive(Template)]
#[template(path = "admin/categories.html")]
pub struct AdminCategoriesPage {
    pub rows: Vec<CategoryRow>,
}

impl AdminCategoriesPage {
    pub fn new(categories: Vec<category::Model>, products: &[ProductListing]) -> Self {
        let rows = categories
            .into_iter()
            .map(|category| {
                let product_count = products
                    .iter()
                    .filter(|listing| listing.product.category_id == Some(category.id))
                    .count();
                CategoryRow {
                    category,
                    product_count,
                }
            })
            .collect();
        Self { rows }
    }
}

#[derive(Template)]
#[template(path = "admin/products.html")]
pub struct AdminProductsPage {
    pub products: Vec<ProductListing>,
    pub categories: Vec<category::Model>,
}
