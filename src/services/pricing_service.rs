//! Live pricing of cart lines against the catalog.
//!
//! Read-only: nothing here writes back to cart storage.

use chrono::Utc;

use crate::{
    catalog::{CatalogError, CatalogGateway, ProductSnapshot},
    dto::cart::{CartProductView, PricedCart, PricedCartLine},
    entity::{cart_items, carts},
    pricing::{CartTotals, LinePricing},
};

/// One cart line priced with the catalog's current figures.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub item: cart_items::Model,
    pub product: ProductSnapshot,
    pub pricing: LinePricing,
}

impl PricedLine {
    // Display fields resolve as: live catalog value, else stored snapshot, else empty.

    pub fn product_id(&self) -> &str {
        if self.product.id.is_empty() {
            &self.item.product_id
        } else {
            &self.product.id
        }
    }

    pub fn title(&self) -> String {
        live_or_snapshot(self.product.title.as_deref(), &self.item.title_snapshot)
    }

    pub fn currency(&self) -> String {
        live_or_snapshot(Some(&self.product.currency), &self.item.currency_snapshot)
    }

    pub fn image_url(&self) -> String {
        live_or_snapshot(self.product.image_url.as_deref(), &self.item.image_url_snapshot)
    }

    fn product_view(&self) -> CartProductView {
        CartProductView {
            id: self.product_id().to_owned(),
            title: self.title(),
            slug: self.product.slug.clone(),
            image_url: self.image_url(),
            thumbnail_url: self.product.thumbnail_url.clone(),
            currency: self.currency(),
            category: self.product.category.clone(),
        }
    }
}

fn live_or_snapshot(live: Option<&str>, snapshot: &str) -> String {
    live.filter(|value| !value.is_empty())
        .unwrap_or(snapshot)
        .to_owned()
}

/// Price every line, in order, stopping at the first catalog failure.
pub async fn price_lines(
    catalog: &dyn CatalogGateway,
    items: Vec<cart_items::Model>,
) -> Result<Vec<PricedLine>, CatalogError> {
    let mut priced = Vec::with_capacity(items.len());
    for item in items {
        let product = match catalog.get_product(&item.product_id).await {
            Ok(product) => product,
            Err(err) => {
                tracing::warn!(
                    product_id = %item.product_id,
                    cart_item_id = %item.id,
                    error = %err,
                    "catalog lookup failed while pricing cart line"
                );
                return Err(err);
            }
        };
        let Some(pricing) =
            LinePricing::compute(product.price, product.discount_percent, item.quantity)
        else {
            tracing::error!(
                product_id = %item.product_id,
                cart_item_id = %item.id,
                price = %product.price,
                quantity = item.quantity,
                "catalog price overflows the line total"
            );
            return Err(out_of_range(&item.product_id));
        };
        priced.push(PricedLine {
            item,
            product,
            pricing,
        });
    }
    Ok(priced)
}

fn out_of_range(product_id: &str) -> CatalogError {
    CatalogError::Unavailable(format!("price of product {product_id} is out of range"))
}

/// Sum the priced lines, failing as unavailable when the cart total overflows.
pub fn totals_of(lines: &[PricedLine]) -> Result<CartTotals, CatalogError> {
    let mut totals = CartTotals::default();
    for line in lines {
        if totals.add_line(&line.pricing, line.item.quantity).is_none() {
            tracing::error!(cart_item_id = %line.item.id, "cart total overflows");
            return Err(out_of_range(line.product_id()));
        }
    }
    Ok(totals)
}

/// Build the priced cart view from already priced lines.
pub fn assemble(cart: &carts::Model, lines: &[PricedLine]) -> Result<PricedCart, CatalogError> {
    let totals = totals_of(lines)?;
    let items = lines
        .iter()
        .map(|line| PricedCartLine {
            id: line.item.id,
            product: line.product_view(),
            quantity: line.item.quantity,
            unit_price_original: line.pricing.unit_price_original,
            discount_percent: line.pricing.discount_percent,
            unit_price_final: line.pricing.unit_price_final,
            line_total: line.pricing.line_total,
        })
        .collect();

    Ok(PricedCart {
        id: cart.id,
        items,
        created_at: cart.created_at.with_timezone(&Utc),
        updated_at: cart.updated_at.with_timezone(&Utc),
        total_quantity: totals.total_quantity,
        subtotal_original: totals.subtotal_original,
        discount_total: totals.discount_total(),
        total: totals.subtotal_final,
        subtotal_final: totals.subtotal_final,
    })
}
