use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::{cart_items, order_items, orders},
    pricing::{self, from_minor_units},
};

/// Stored cart line with its display snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: String,
    pub quantity: i32,
    pub title_snapshot: String,
    pub unit_price_snapshot: Decimal,
    pub currency_snapshot: String,
    pub image_url_snapshot: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<cart_items::Model> for CartItem {
    fn from(model: cart_items::Model) -> Self {
        Self {
            id: model.id,
            cart_id: model.cart_id,
            product_id: model.product_id,
            quantity: model.quantity,
            title_snapshot: model.title_snapshot,
            unit_price_snapshot: from_minor_units(model.unit_price_snapshot),
            currency_snapshot: model.currency_snapshot,
            image_url_snapshot: model.image_url_snapshot,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: i32,
    pub order_number: i32,
    pub user_id: Option<Uuid>,
    pub status: String,
    pub total: Decimal,
    pub subtotal_original: Decimal,
    pub discount_total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build the order view. Derived figures come from the frozen items.
    pub fn from_entity(model: orders::Model, items: &[order_items::Model]) -> Self {
        let total = from_minor_units(model.total);
        let subtotal_original = subtotal_original(items);

        Self {
            id: model.id,
            order_number: model.id,
            user_id: model.user_id,
            status: model.status,
            total,
            subtotal_original,
            discount_total: subtotal_original - total,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: i32,
    pub product_id: String,
    pub title: String,
    pub quantity: i32,
    pub unit_price_original: Decimal,
    pub discount_percent: i32,
    pub unit_price_final: Decimal,
    pub line_total: Decimal,
    pub currency: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

impl From<order_items::Model> for OrderItem {
    fn from(model: order_items::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            title: model.title,
            quantity: model.quantity,
            unit_price_original: from_minor_units(model.unit_price_original),
            discount_percent: model.discount_percent,
            unit_price_final: from_minor_units(model.unit_price_final),
            line_total: from_minor_units(model.line_total),
            currency: model.currency,
            image_url: model.image_url,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

/// `Σ unit_price_original × quantity` over frozen order items.
///
/// Items were range-checked at checkout; saturating keeps the read path
/// total.
pub fn subtotal_original(items: &[order_items::Model]) -> Decimal {
    items.iter().fold(pricing::zero(), |acc, item| {
        let line = from_minor_units(item.unit_price_original)
            .saturating_mul(Decimal::from(item.quantity));
        acc.saturating_add(pricing::quantize(line))
    })
}
