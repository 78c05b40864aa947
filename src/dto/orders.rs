use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Order, OrderItem};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

/// Public order-status view. Carries no owner or contact data.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderLookup {
    pub order_number: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub total_price: Decimal,
    pub subtotal_original: Decimal,
    pub discount_total: Decimal,
    pub currency: String,
    pub items: Vec<OrderLookupItem>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderLookupItem {
    pub title: String,
    pub quantity: i32,
    pub unit_price_original: Decimal,
    pub discount_percent: i32,
    pub unit_price_final: Decimal,
    pub line_total: Decimal,
}
