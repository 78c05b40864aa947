use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    catalog::CategoryRef,
    dto::{
        cart::{
            AddCartItemRequest, CartItemList, CartProductView, PricedCart, PricedCartLine,
            UpdateCartItemRequest,
        },
        orders::{OrderList, OrderLookup, OrderLookupItem, OrderWithItems},
    },
    models::{CartItem, Order, OrderItem},
    response::{ApiResponse, ErrorBody, Meta},
    routes::{cart, health, orders, params},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        cart::get_cart,
        cart::list_items,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        orders::checkout,
        orders::lookup_order,
        orders::list_orders,
        orders::get_order
    ),
    components(
        schemas(
            CartItem,
            Order,
            OrderItem,
            CategoryRef,
            AddCartItemRequest,
            UpdateCartItemRequest,
            CartItemList,
            CartProductView,
            PricedCartLine,
            PricedCart,
            OrderList,
            OrderWithItems,
            OrderLookup,
            OrderLookupItem,
            params::Pagination,
            params::SortOrder,
            params::OrderListQuery,
            Meta,
            ErrorBody,
            ApiResponse<ErrorBody>,
            ApiResponse<PricedCart>,
            ApiResponse<CartItem>,
            ApiResponse<CartItemList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<OrderLookup>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Cart", description = "Active cart and its lines"),
        (name = "Orders", description = "Checkout and order history"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
