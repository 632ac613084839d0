use sea_orm::entity::prelude::*;

/// Catalog documents. Prices, stock and variants keep their stored JSON
/// shape since values may be numbers or numeric strings.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub slug: Option<String>,
    pub sku: String,
    pub description: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub price: Json,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub stock: Option<Json>,
    #[sea_orm(column_type = "JsonBinary")]
    pub variants: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub categories: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub image_urls: Json,
    pub ecommerce: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
