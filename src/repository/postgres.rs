use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DbBackend, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    prelude::DateTimeWithTimeZone,
    sea_query::{Expr, LikeExpr, extension::postgres::PgExpr},
};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{
    db::OrmConn,
    entity::{
        abandoned_carts::{
            ActiveModel as CartActive, Column as CartCol, Entity as AbandonedCarts,
            Model as CartModel,
        },
        ecommerce_orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as EcommerceOrders,
            Model as OrderModel,
        },
        products::{Column as ProdCol, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    models::{
        AbandonedCart, CartMirrorWrite, CartRecordStatus, ContactSnapshot, NewOrder, Order,
        OrderSource, OrderStatus, Product,
    },
};

use super::{
    AbandonedCartRepository, MirrorOutcome, OrderRepository, PageRequest, ProductFilter,
    ProductRepository,
};

fn to_json<T: Serialize>(value: &T) -> AppResult<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}

fn from_json<T: DeserializeOwned>(value: serde_json::Value) -> AppResult<T> {
    Ok(serde_json::from_value(value)?)
}

fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

fn count_from_db(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn product_from_entity(model: ProductModel) -> AppResult<Product> {
    Ok(Product {
        id: model.id,
        name: model.name,
        slug: model.slug,
        sku: model.sku,
        description: model.description,
        price: from_json(model.price)?,
        stock: model.stock.map(from_json).transpose()?,
        variants: from_json(model.variants)?,
        categories: from_json(model.categories)?,
        image_urls: from_json(model.image_urls)?,
        ecommerce: model.ecommerce,
    })
}

fn cart_from_entity(model: CartModel) -> AppResult<AbandonedCart> {
    let status = CartRecordStatus::parse(&model.status)
        .ok_or_else(|| AppError::Internal(anyhow!("unknown cart status `{}`", model.status)))?;

    Ok(AbandonedCart {
        id: model.id,
        session_id: model.session_id,
        customer: model.customer.map(from_json).transpose()?,
        items: from_json(model.items)?,
        items_count: count_from_db(model.items_count),
        subtotal: model.subtotal,
        total: model.total,
        status,
        converted_order_id: model.converted_order_id,
        recovery_messages_sent: count_from_db(model.recovery_messages_sent),
        last_recovery_message_at: model.last_recovery_message_at.map(|dt| dt.with_timezone(&Utc)),
        metadata: from_json(model.metadata)?,
        revision: model.revision,
        first_added_at: model.first_added_at.with_timezone(&Utc),
        last_activity_at: model.last_activity_at.with_timezone(&Utc),
        abandoned_at: model.abandoned_at.map(|dt| dt.with_timezone(&Utc)),
        converted_at: model.converted_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let status = OrderStatus::parse(&model.status)
        .ok_or_else(|| AppError::Internal(anyhow!("unknown order status `{}`", model.status)))?;
    let source = OrderSource::parse(&model.source)
        .ok_or_else(|| AppError::Internal(anyhow!("unknown order source `{}`", model.source)))?;

    Ok(Order {
        id: model.id,
        order_number: model.order_number,
        customer: from_json(model.customer)?,
        items: from_json(model.items)?,
        subtotal: model.subtotal,
        shipping_cost: model.shipping_cost,
        discount: model.discount,
        total: model.total,
        status,
        source,
        metadata: from_json(model.metadata)?,
        internal_notes: model.internal_notes,
        whatsapp_message_sent: model.whatsapp_message_sent,
        whatsapp_conversation_url: model.whatsapp_conversation_url,
        fulfillment_id: model.fulfillment_id,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
        confirmed_at: model.confirmed_at.map(|dt| dt.with_timezone(&Utc)),
        shipped_at: model.shipped_at.map(|dt| dt.with_timezone(&Utc)),
        delivered_at: model.delivered_at.map(|dt| dt.with_timezone(&Utc)),
        cancelled_at: model.cancelled_at.map(|dt| dt.with_timezone(&Utc)),
    })
}

#[derive(Debug, Clone)]
pub struct PgProducts {
    orm: OrmConn,
}

impl PgProducts {
    pub fn new(orm: OrmConn) -> Self {
        Self { orm }
    }
}

#[async_trait]
impl ProductRepository for PgProducts {
    async fn list(
        &self,
        filter: ProductFilter<'_>,
        page: PageRequest,
    ) -> AppResult<(Vec<Product>, u64)> {
        let mut condition = Condition::all().add(ProdCol::Ecommerce.eq(true));
        if let Some(category) = filter.category.filter(|c| !c.is_empty()) {
            condition = condition.add(Expr::cust_with_values(
                "categories @> ?",
                [serde_json::json!([category])],
            ));
        }
        if let Some(search) = filter.search.filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            condition = condition.add(
                Condition::any()
                    .add(Expr::col(ProdCol::Name).ilike(pattern.clone()))
                    .add(Expr::col(ProdCol::Sku).ilike(pattern)),
            );
        }

        let finder = Products::find()
            .filter(condition)
            .order_by_asc(ProdCol::Name);
        let total = finder.clone().count(&self.orm).await?;

        let products = finder
            .limit(page.limit)
            .offset(page.offset)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(product_from_entity)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((products, total))
    }

    async fn get(&self, id: &str) -> AppResult<Option<Product>> {
        Products::find_by_id(id.to_string())
            .one(&self.orm)
            .await?
            .map(product_from_entity)
            .transpose()
    }

    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<Product>> {
        Products::find()
            .filter(ProdCol::Slug.eq(slug))
            .filter(ProdCol::Ecommerce.eq(true))
            .one(&self.orm)
            .await?
            .map(product_from_entity)
            .transpose()
    }

    async fn find_by_id_suffix(&self, suffix: &str) -> AppResult<Vec<Product>> {
        if suffix.is_empty() {
            return Ok(Vec::new());
        }
        let escaped = suffix
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        Products::find()
            .filter(ProdCol::Id.like(LikeExpr::new(format!("%{escaped}")).escape('\\')))
            .filter(ProdCol::Ecommerce.eq(true))
            .all(&self.orm)
            .await?
            .into_iter()
            .map(product_from_entity)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct PgAbandonedCarts {
    orm: OrmConn,
}

impl PgAbandonedCarts {
    pub fn new(orm: OrmConn) -> Self {
        Self { orm }
    }
}

#[async_trait]
impl AbandonedCartRepository for PgAbandonedCarts {
    async fn find_by_session(&self, session_id: &str) -> AppResult<Option<AbandonedCart>> {
        AbandonedCarts::find()
            .filter(CartCol::SessionId.eq(session_id))
            .one(&self.orm)
            .await?
            .map(cart_from_entity)
            .transpose()
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<AbandonedCart>> {
        AbandonedCarts::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(cart_from_entity)
            .transpose()
    }

    async fn upsert(&self, session_id: &str, write: &CartMirrorWrite) -> AppResult<MirrorOutcome> {
        let new_id = Uuid::new_v4();
        let customer = write.customer.as_ref().map(to_json).transpose()?;
        let items_count = i32::try_from(write.items_count).unwrap_or(i32::MAX);

        // The guarded DO UPDATE returns no row when the record is converted
        // or the stored revision is not older than this one.
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO abandoned_carts
                (id, session_id, customer, items, items_count, subtotal, total, status, metadata, revision)
            VALUES ($1, $2, $3, $4, $5, $6, $6, 'active', $7, $8)
            ON CONFLICT (session_id) DO UPDATE SET
                customer = COALESCE(EXCLUDED.customer, abandoned_carts.customer),
                items = EXCLUDED.items,
                items_count = EXCLUDED.items_count,
                subtotal = EXCLUDED.subtotal,
                total = EXCLUDED.total,
                metadata = EXCLUDED.metadata,
                revision = EXCLUDED.revision,
                last_activity_at = now(),
                updated_at = now()
            WHERE abandoned_carts.status <> 'converted'
              AND abandoned_carts.revision < EXCLUDED.revision
            RETURNING *
            "#,
            [
                new_id.into(),
                session_id.into(),
                customer.into(),
                to_json(&write.items)?.into(),
                items_count.into(),
                write.total.into(),
                to_json(&write.metadata)?.into(),
                write.revision.into(),
            ],
        );

        if let Some(model) = AbandonedCarts::find()
            .from_raw_sql(stmt)
            .one(&self.orm)
            .await?
        {
            let created = model.id == new_id;
            let cart = cart_from_entity(model)?;
            return Ok(if created {
                MirrorOutcome::Created(cart)
            } else {
                MirrorOutcome::Updated(cart)
            });
        }

        let existing = self
            .find_by_session(session_id)
            .await?
            .ok_or_else(|| AppError::Conflict(format!("cart for {session_id} vanished mid-write")))?;
        Ok(if existing.is_converted() {
            MirrorOutcome::SkippedConverted(existing.id)
        } else {
            MirrorOutcome::SkippedStale(existing.id)
        })
    }

    async fn update_customer(&self, session_id: &str, customer: &ContactSnapshot) -> AppResult<bool> {
        let result = AbandonedCarts::update_many()
            .col_expr(CartCol::Customer, Expr::value(to_json(customer)?))
            .col_expr(CartCol::UpdatedAt, Expr::value(now()))
            .filter(CartCol::SessionId.eq(session_id))
            .filter(CartCol::Status.ne(CartRecordStatus::Converted.as_str()))
            .exec(&self.orm)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn mark_abandoned(&self, id: Uuid) -> AppResult<bool> {
        let at = now();
        let result = AbandonedCarts::update_many()
            .col_expr(CartCol::Status, Expr::value(CartRecordStatus::Abandoned.as_str()))
            .col_expr(CartCol::AbandonedAt, Expr::value(at))
            .col_expr(CartCol::UpdatedAt, Expr::value(at))
            .filter(CartCol::Id.eq(id))
            .filter(CartCol::Status.ne(CartRecordStatus::Converted.as_str()))
            .exec(&self.orm)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn mark_converted(&self, session_id: &str, order_id: Uuid) -> AppResult<Option<Uuid>> {
        let at = now();
        let converted = AbandonedCarts::update_many()
            .col_expr(CartCol::Status, Expr::value(CartRecordStatus::Converted.as_str()))
            .col_expr(CartCol::ConvertedOrderId, Expr::value(order_id))
            .col_expr(CartCol::ConvertedAt, Expr::value(at))
            .col_expr(CartCol::UpdatedAt, Expr::value(at))
            .filter(CartCol::SessionId.eq(session_id))
            .filter(CartCol::Status.ne(CartRecordStatus::Converted.as_str()))
            .exec_with_returning(&self.orm)
            .await?;
        Ok(converted.first().map(|model| model.id))
    }

    async fn record_recovery_message(&self, id: Uuid) -> AppResult<Option<AbandonedCart>> {
        let at = now();
        let updated = AbandonedCarts::update_many()
            .col_expr(
                CartCol::RecoveryMessagesSent,
                Expr::col(CartCol::RecoveryMessagesSent).add(1),
            )
            .col_expr(CartCol::LastRecoveryMessageAt, Expr::value(at))
            .col_expr(CartCol::UpdatedAt, Expr::value(at))
            .filter(CartCol::Id.eq(id))
            .exec_with_returning(&self.orm)
            .await?;
        updated.into_iter().next().map(cart_from_entity).transpose()
    }

    async fn list(
        &self,
        status: Option<CartRecordStatus>,
        page: PageRequest,
    ) -> AppResult<(Vec<AbandonedCart>, u64)> {
        let mut condition = Condition::all();
        if let Some(status) = status {
            condition = condition.add(CartCol::Status.eq(status.as_str()));
        }

        let finder = AbandonedCarts::find()
            .filter(condition)
            .order_by_desc(CartCol::LastActivityAt);
        let total = finder.clone().count(&self.orm).await?;

        let carts = finder
            .limit(page.limit)
            .offset(page.offset)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(cart_from_entity)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((carts, total))
    }
}

#[derive(Debug, Clone)]
pub struct PgOrders {
    orm: OrmConn,
}

impl PgOrders {
    pub fn new(orm: OrmConn) -> Self {
        Self { orm }
    }

    async fn modify(
        &self,
        id: Uuid,
        change: impl FnOnce(&mut OrderActive, DateTimeWithTimeZone) + Send,
    ) -> AppResult<Option<Order>> {
        let Some(model) = EcommerceOrders::find_by_id(id).one(&self.orm).await? else {
            return Ok(None);
        };
        let at = now();
        let mut active = model.into_active_model();
        change(&mut active, at);
        active.updated_at = Set(at);
        let model = active.update(&self.orm).await?;
        order_from_entity(model).map(Some)
    }
}

#[async_trait]
impl OrderRepository for PgOrders {
    async fn insert(&self, order: NewOrder) -> AppResult<Order> {
        let at = now();
        let model = OrderActive {
            id: Set(Uuid::new_v4()),
            order_number: Set(order.order_number),
            customer: Set(to_json(&order.customer)?),
            items: Set(to_json(&order.items)?),
            subtotal: Set(order.subtotal),
            shipping_cost: Set(order.shipping_cost),
            discount: Set(order.discount),
            total: Set(order.total),
            status: Set(order.status.as_str().to_string()),
            source: Set(order.source.as_str().to_string()),
            metadata: Set(to_json(&order.metadata)?),
            internal_notes: Set(None),
            whatsapp_message_sent: Set(order.whatsapp_message_sent),
            whatsapp_conversation_url: Set(order.whatsapp_conversation_url),
            fulfillment_id: Set(None),
            created_at: Set(at),
            updated_at: Set(at),
            confirmed_at: Set(None),
            shipped_at: Set(None),
            delivered_at: Set(None),
            cancelled_at: Set(None),
        }
        .insert(&self.orm)
        .await?;

        order_from_entity(model)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Order>> {
        EcommerceOrders::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(order_from_entity)
            .transpose()
    }

    async fn list(
        &self,
        status: Option<OrderStatus>,
        newest_first: bool,
        page: PageRequest,
    ) -> AppResult<(Vec<Order>, u64)> {
        let mut condition = Condition::all();
        if let Some(status) = status {
            condition = condition.add(OrderCol::Status.eq(status.as_str()));
        }

        let mut finder = EcommerceOrders::find().filter(condition);
        finder = if newest_first {
            finder.order_by_desc(OrderCol::CreatedAt)
        } else {
            finder.order_by_asc(OrderCol::CreatedAt)
        };
        let total = finder.clone().count(&self.orm).await?;

        let orders = finder
            .limit(page.limit)
            .offset(page.offset)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(order_from_entity)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((orders, total))
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> AppResult<Option<Order>> {
        self.modify(id, |active, at| {
            active.status = Set(status.as_str().to_string());
            match status {
                OrderStatus::Confirmed => active.confirmed_at = Set(Some(at)),
                OrderStatus::Shipped => active.shipped_at = Set(Some(at)),
                OrderStatus::Delivered => active.delivered_at = Set(Some(at)),
                OrderStatus::Cancelled => active.cancelled_at = Set(Some(at)),
                OrderStatus::Pending | OrderStatus::Preparing => {}
            }
        })
        .await
    }

    async fn set_internal_notes(&self, id: Uuid, notes: String) -> AppResult<Option<Order>> {
        self.modify(id, |active, _| active.internal_notes = Set(Some(notes)))
            .await
    }

    async fn link_fulfillment(&self, id: Uuid, fulfillment_id: String) -> AppResult<Option<Order>> {
        self.modify(id, |active, _| active.fulfillment_id = Set(Some(fulfillment_id)))
            .await
    }
}
