use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{catalog::CategoryRef, models::CartItem};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddCartItemRequest {
    pub product_id: String,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemList {
    pub items: Vec<CartItem>,
}

/// Product display fields embedded in a priced line.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartProductView {
    pub id: String,
    pub title: String,
    pub slug: Option<String>,
    pub image_url: String,
    pub thumbnail_url: Option<String>,
    pub currency: String,
    pub category: Option<CategoryRef>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PricedCartLine {
    pub id: Uuid,
    pub product: CartProductView,
    pub quantity: i32,
    pub unit_price_original: Decimal,
    pub discount_percent: i32,
    pub unit_price_final: Decimal,
    pub line_total: Decimal,
}

/// Live-priced view of the active cart. Never persisted.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PricedCart {
    pub id: Uuid,
    pub items: Vec<PricedCartLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub total_quantity: i64,
    pub subtotal_original: Decimal,
    pub subtotal_final: Decimal,
    pub discount_total: Decimal,
    pub total: Decimal,
}
