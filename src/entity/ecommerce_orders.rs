use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "ecommerce_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_number: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub customer: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub items: Json,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub status: String,
    pub source: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,
    pub internal_notes: Option<String>,
    pub whatsapp_message_sent: bool,
    pub whatsapp_conversation_url: Option<String>,
    pub fulfillment_id: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub confirmed_at: Option<DateTimeWithTimeZone>,
    pub shipped_at: Option<DateTimeWithTimeZone>,
    pub delivered_at: Option<DateTimeWithTimeZone>,
    pub cancelled_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::abandoned_carts::Entity")]
    AbandonedCarts,
}

impl Related<super::abandoned_carts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AbandonedCarts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
