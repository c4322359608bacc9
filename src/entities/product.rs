use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::entities::category::Entity as Category;
use crate::entities::product_image::Entity as ProductImage;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub price: f64,
    pub category_id: Option<i32>,
    /// Preview image shown in listings.
    pub image_path: Option<String>,
    pub size_open: Option<String>,
    pub size_closed: Option<String>,
    pub weight_net: Option<String>,
    pub weight_gross: Option<String>,
    pub diameter: Option<String>,
    pub contents: Option<String>,
    pub delivery_return: Option<String>,
    pub care_instructions: Option<String>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Category",
        from = "crate::entities::product::Column::CategoryId",
        to = "crate::entities::category::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Category,
    #[sea_orm(has_many = "ProductImage")]
    ProductImage,
}

impl Related<crate::entities::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<crate::entities::product_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductImage.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
