use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "abandoned_carts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub session_id: String,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub customer: Option<Json>,
    #[sea_orm(column_type = "JsonBinary")]
    pub items: Json,
    pub items_count: i32,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub status: String,
    pub converted_order_id: Option<Uuid>,
    pub recovery_messages_sent: i32,
    pub last_recovery_message_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,
    pub revision: i64,
    pub first_added_at: DateTimeWithTimeZone,
    pub last_activity_at: DateTimeWithTimeZone,
    pub abandoned_at: Option<DateTimeWithTimeZone>,
    pub converted_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::ecommerce_orders::Entity",
        from = "Column::ConvertedOrderId",
        to = "super::ecommerce_orders::Column::Id"
    )]
    EcommerceOrders,
}

impl Related<super::ecommerce_orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EcommerceOrders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
