use utoipa::{OpenApi, openapi::OpenApi as OpenApiSpec};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    cart::CartLine,
    customer::{CustomerForm, CustomerInfo},
    device::{DeviceType, RequestContext},
    dto::{
        carts::{CartList, MirrorCartRequest, MirrorResult, RecoveredCart, RecoveryMessage},
        orders::{
            CheckoutReceipt, CheckoutRequest, FulfillmentLinkRequest, InternalNotesRequest,
            OrderList, UpdateOrderStatusRequest,
        },
        products::ProductList,
    },
    models::{
        AbandonedCart, CartRecordStatus, ContactSnapshot, ItemSnapshot, Order, OrderCustomer,
        OrderSource, OrderStatus, Product, ProductVariant, SessionMetadata, VariantSnapshot,
    },
    response::{ApiResponse, Meta},
    routes::{carts, health, orders, params, products},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        products::list_products,
        products::get_product,
        products::get_product_by_slug,
        carts::mirror_cart,
        carts::update_customer,
        carts::abandon_cart,
        carts::recover_cart,
        carts::list_carts,
        carts::record_recovery_message,
        orders::checkout,
        orders::list_orders,
        orders::get_order,
        orders::update_order_status,
        orders::set_internal_notes,
        orders::link_fulfillment
    ),
    components(
        schemas(
            Product,
            ProductVariant,
            ItemSnapshot,
            VariantSnapshot,
            ContactSnapshot,
            SessionMetadata,
            DeviceType,
            RequestContext,
            CartLine,
            CartRecordStatus,
            AbandonedCart,
            Order,
            OrderCustomer,
            OrderStatus,
            OrderSource,
            CustomerForm,
            CustomerInfo,
            MirrorCartRequest,
            MirrorResult,
            CartList,
            RecoveryMessage,
            RecoveredCart,
            CheckoutRequest,
            CheckoutReceipt,
            OrderList,
            UpdateOrderStatusRequest,
            InternalNotesRequest,
            FulfillmentLinkRequest,
            ProductList,
            params::Pagination,
            params::SortOrder,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<CartList>,
            ApiResponse<CheckoutReceipt>,
            ApiResponse<RecoveredCart>
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Storefront catalogue"),
        (name = "Carts", description = "Abandoned-cart mirror and recovery"),
        (name = "Orders", description = "WhatsApp checkout and order back office"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
