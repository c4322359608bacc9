//! Multipart handling for the product forms: text fields are collected,
//! `images` parts are type-checked and later written under the public dir.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{multipart::MultipartError, Multipart};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::store::{Store, MAX_IMAGES_PER_PRODUCT, PRODUCT_IMAGE_DIR};

pub const IMAGES_FIELD: &str = "images";

/// An accepted upload that has not been written yet.
#[derive(Debug)]
pub struct PendingImage {
    pub extension: &'static str,
    pub data: Bytes,
}

#[derive(Debug, Default)]
pub struct ProductMultipart {
    pub fields: HashMap<String, String>,
    pub images: Vec<PendingImage>,
}

/// Maps an image MIME type to the extension used on disk.
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Content type of the part, or one guessed from the client file name when
/// the browser sent none or a generic one.
fn resolve_content_type(declared: Option<&str>, file_name: Option<&str>) -> Option<String> {
    match declared {
        Some(declared) if declared != "application/octet-stream" => Some(declared.to_owned()),
        _ => file_name
            .and_then(|name| mime_guess::from_path(name).first_raw())
            .map(str::to_owned),
    }
}

pub async fn read_product_multipart(mut multipart: Multipart) -> Result<ProductMultipart> {
    let mut form = ProductMultipart::default();

    while let Some(field) = multipart.next_field().await.map_err(unreadable)? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name != IMAGES_FIELD {
            let value = field.text().await.map_err(unreadable)?;
            form.fields.insert(name, value);
            continue;
        }

        let file_name = field.file_name().map(str::to_owned);
        let content_type = resolve_content_type(field.content_type(), file_name.as_deref());
        let data = field.bytes().await.map_err(unreadable)?;

        // An empty file input still posts one nameless, empty part.
        if data.is_empty() && file_name.as_deref().unwrap_or_default().is_empty() {
            continue;
        }

        let extension = content_type
            .as_deref()
            .and_then(image_extension)
            .ok_or_else(|| {
                AppError::Validation(
                    "Разрешены только изображения (jpeg, jpg, png, webp, gif)".to_owned(),
                )
            })?;

        if form.images.len() == MAX_IMAGES_PER_PRODUCT {
            return Err(AppError::Validation(format!(
                "Можно загрузить не более {MAX_IMAGES_PER_PRODUCT} изображений на товар"
            )));
        }
        form.images.push(PendingImage { extension, data });
    }

    Ok(form)
}

/// Writes the images under the product image dir and returns their public
/// paths, in upload order. On failure nothing written so far is left behind.
pub async fn store_images(store: &Store, images: Vec<PendingImage>) -> Result<Vec<String>> {
    let dir = store.public_dir().join(PRODUCT_IMAGE_DIR);
    let mut stored = Vec::with_capacity(images.len());

    for image in images {
        let file_name = format!("{}.{}", Uuid::new_v4(), image.extension);
        if let Err(err) = tokio::fs::write(dir.join(&file_name), &image.data).await {
            warn!(file = %file_name, error = %err, "Failed to store uploaded image");
            store.remove_image_files(stored).await;
            return Err(err.into());
        }
        debug!(file = %file_name, bytes = image.data.len(), "Stored uploaded image");
        stored.push(format!("/{PRODUCT_IMAGE_DIR}/{file_name}"));
    }

    Ok(stored)
}

fn unreadable(err: MultipartError) -> AppError {
    debug!(error = %err, "Failed to read multipart body");
    AppError::Validation("Не удалось прочитать загруженные данные".to_owned())
}
