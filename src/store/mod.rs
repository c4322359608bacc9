//! Data access for the catalog. Every mutating call runs in its own
//! transaction, so callers never see a half-applied change.

mod admins;
mod categories;
mod products;

pub use products::{
    ProductDraft, ProductListing, ProductRemoval, ProductUpdate, MAX_IMAGES_PER_PRODUCT,
};

use std::path::{Path, PathBuf};

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr, TransactionTrait};
use tracing::info;

use crate::config::AdminSeed;
use crate::entities::{self, MigrationReport};
use crate::error::Result;

/// Public path prefix under which product images are stored.
pub const PRODUCT_IMAGE_DIR: &str = "images/products";

#[derive(Debug, Clone)]
pub struct Store {
    db: DatabaseConnection,
    public_dir: PathBuf,
}

impl Store {
    pub async fn connect(database_url: &str, public_dir: impl Into<PathBuf>) -> Result<Self, DbErr> {
        let mut options = ConnectOptions::new(database_url.to_owned());
        options.sqlx_logging(false);
        let db = Database::connect(options).await?;

        Ok(Self {
            db,
            public_dir: public_dir.into(),
        })
    }

    /// Schema setup, migration and admin seeding. Must complete before the
    /// server accepts traffic.
    pub async fn init(&self, seed: &AdminSeed) -> Result<MigrationReport> {
        let report = self.migrate().await?;
        if report.is_noop() {
            info!("Schema is up to date");
        } else {
            info!(
                added = ?report.added_columns,
                backfilled = report.backfilled_rows,
                "Migration finished"
            );
        }

        if self.ensure_admin(&seed.username, &seed.password).await? {
            info!(username = %seed.username, "Created initial admin account, change its password");
        }

        tokio::fs::create_dir_all(self.public_dir.join(PRODUCT_IMAGE_DIR)).await?;

        Ok(report)
    }

    /// Table creation and column migration in a single transaction.
    pub async fn migrate(&self) -> Result<MigrationReport, DbErr> {
        let txn = self.db.begin().await?;
        entities::setup_schema(&txn).await?;
        let report = entities::migrate(&txn).await?;
        txn.commit().await?;
        Ok(report)
    }

    pub async fn close(&self) -> Result<(), DbErr> {
        self.db.clone().close().await
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    /// Maps a stored public path (`/images/products/x.jpg`) to its file.
    ///
    /// Only the final path component is kept, so a tampered row cannot
    /// point outside the image directory.
    pub fn image_file(&self, image_path: &str) -> Option<PathBuf> {
        let file_name = Path::new(image_path).file_name()?;
        Some(self.public_dir.join(PRODUCT_IMAGE_DIR).join(file_name))
    }

    /// Removes image files concurrently. Failures are logged and skipped.
    pub async fn remove_image_files(&self, image_paths: Vec<String>) -> usize {
        let mut tasks = tokio::task::JoinSet::new();

        for image_path in image_paths {
            let Some(file) = self.image_file(&image_path) else {
                tracing::warn!(%image_path, "Image path has no file name, skipping");
                continue;
            };
            tasks.spawn(async move {
                match tokio::fs::remove_file(&file).await {
                    Ok(()) => true,
                    Err(err) => {
                        tracing::warn!(file = %file.display(), error = %err, "Failed to remove image file");
                        false
                    }
                }
            });
        }

        let mut removed = 0;
        while let Some(result) = tasks.join_next().await {
            if matches!(result, Ok(true)) {
                removed += 1;
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn image_file_cannot_escape_the_image_dir() {
        let store = Store {
            db: DatabaseConnection::Disconnected,
            public_dir: PathBuf::from("/srv/public"),
        };
        assert_eq!(
            store.image_file("/images/products/a.jpg"),
            Some(PathBuf::from("/srv/public/images/products/a.jpg"))
        );
        assert_eq!(
            store.image_file("/images/products/../../etc/passwd"),
            Some(PathBuf::from("/srv/public/images/products/passwd"))
        );
    }
}
