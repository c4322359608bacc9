pub mod order;
pub mod pages;

use axum::{
    routing::{get, post},
    Router,
};

use order::submit_order;
use pages::{about, category, collaboration, contacts, gallery, home, not_found, order_page, product};

pub fn public_router() -> Router {
    Router::new()
        .route("/", get(home))
        .route("/about", get(about))
        .route("/gallery", get(gallery))
        .route("/category/:id", get(category))
        .route("/product/:id", get(product))
        .route("/collaboration", get(collaboration))
        .route("/contacts", get(contacts))
        .route("/order", get(order_page))
        .route("/api/order", post(submit_order))
        .route("/api/send_order.php", post(submit_order))
        .fallback(not_found)
}
