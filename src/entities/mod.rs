pub mod admin;
pub mod category;
pub mod product;
pub mod product_image;

use sea_orm::{ConnectionTrait, DbErr, Schema, Statement};
use tracing::info;

use crate::entities::{
    admin::Entity as Admin,
    category::Entity as Category,
    product::Entity as Product,
    product_image::Entity as ProductImage,
};

/// Product columns introduced after the first release, in the order they are added.
const PRODUCT_LATE_COLUMNS: [(&str, &str); 9] = [
    ("size_open", "TEXT"),
    ("size_closed", "TEXT"),
    ("weight_net", "TEXT"),
    ("weight_gross", "TEXT"),
    ("diameter", "TEXT"),
    ("contents", "TEXT"),
    ("delivery_return", "TEXT"),
    ("care_instructions", "TEXT"),
    ("created_at", "DATETIME"),
];

const CATEGORY_LATE_COLUMNS: [(&str, &str); 1] = [("created_at", "DATETIME")];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// `table.column` for every column that had to be added.
    pub added_columns: Vec<String>,
    /// Rows whose `created_at` was filled in.
    pub backfilled_rows: u64,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.added_columns.is_empty() && self.backfilled_rows == 0
    }
}

/// Creates missing tables and indexes. Existing tables are left untouched.
pub async fn setup_schema<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut tables = [
        schema.create_table_from_entity(Admin),
        schema.create_table_from_entity(Category),
        schema.create_table_from_entity(Product),
        schema.create_table_from_entity(ProductImage),
    ];
    for table in tables.iter_mut() {
        table.if_not_exists();
        db.execute(backend.build(&*table)).await?;
    }

    for mut index in schema.create_index_from_entity(ProductImage) {
        index.if_not_exists();
        db.execute(backend.build(&index)).await?;
    }

    Ok(())
}

/// Brings tables created by older releases up to the current shape.
///
/// Idempotent: a second run on the same database reports nothing.
pub async fn migrate<C: ConnectionTrait>(db: &C) -> Result<MigrationReport, DbErr> {
    let mut report = MigrationReport::default();

    add_missing_columns(db, "products", &PRODUCT_LATE_COLUMNS, &mut report).await?;
    add_missing_columns(db, "categories", &CATEGORY_LATE_COLUMNS, &mut report).await?;

    for table in ["categories", "products"] {
        let result = db
            .execute(Statement::from_string(
                db.get_database_backend(),
                format!("UPDATE {table} SET created_at = CURRENT_TIMESTAMP WHERE created_at IS NULL"),
            ))
            .await?;
        report.backfilled_rows += result.rows_affected();
    }

    Ok(report)
}

async fn add_missing_columns<C: ConnectionTrait>(
    db: &C,
    table: &str,
    columns: &[(&str, &str)],
    report: &mut MigrationReport,
) -> Result<(), DbErr> {
    let existing = table_columns(db, table).await?;

    for (column, sql_type) in columns {
        if existing.iter().any(|name| name == column) {
            continue;
        }
        db.execute(Statement::from_string(
            db.get_database_backend(),
            format!("ALTER TABLE {table} ADD COLUMN {column} {sql_type}"),
        ))
        .await?;
        info!(table, column, "Added missing column");
        report.added_columns.push(format!("{table}.{column}"));
    }

    Ok(())
}

pub async fn table_columns<C: ConnectionTrait>(db: &C, table: &str) -> Result<Vec<String>, DbErr> {
    let rows = db
        .query_all(Statement::from_string(
            db.get_database_backend(),
            format!("PRAGMA table_info({table})"),
        ))
        .await?;

    rows.iter()
        .map(|row| row.try_get::<String>("", "name"))
        .collect()
}
