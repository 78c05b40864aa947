//! Narrow lookup contract over the external product catalog.
//!
//! Everything the core knows about a product comes through
//! [`CatalogGateway::get_product`], already normalized into a
//! [`ProductSnapshot`]. Payload shapes never leak past this module.

use async_trait::async_trait;
use mockall::automock;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

pub mod client;
pub mod normalize;

pub use client::HttpCatalogClient;

/// The only two ways a lookup can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("product {0} not found in catalog")]
    NotFound(String),

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Current catalog view of one product.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSnapshot {
    pub id: String,
    pub title: Option<String>,
    pub slug: Option<String>,
    /// Undiscounted unit price, scale 2.
    pub price: Decimal,
    pub currency: String,
    /// Already clamped into `0..=100`.
    pub discount_percent: i32,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub category: Option<CategoryRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CategoryRef {
    pub id: String,
    pub slug: Option<String>,
    pub title: Option<String>,
}

#[automock]
#[async_trait]
pub trait CatalogGateway: Send + Sync {
    /// Fetch one product by its opaque catalog id.
    async fn get_product(&self, product_id: &str) -> Result<ProductSnapshot, CatalogError>;
}
