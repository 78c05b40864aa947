//! Turn raw catalog payloads into [`ProductSnapshot`] values.
//!
//! Two shapes are accepted: the nested `{id, attributes: {...}}` form and
//! the flat `{documentId, ...}` form. Anything past this module only ever
//! sees the strict snapshot.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::{config::CatalogConfig, pricing};

use super::{CatalogError, CategoryRef, ProductSnapshot};

/// Longest currency code the order and cart tables accept.
pub const MAX_CURRENCY_LEN: usize = 16;

/// Normalize the body of `GET /api/products/{id}`.
///
/// A body whose `data` is null means the product does not exist.
pub fn product_from_payload(
    product_id: &str,
    payload: &Value,
    config: &CatalogConfig,
) -> Result<ProductSnapshot, CatalogError> {
    let item = match payload {
        Value::Object(map) if map.contains_key("data") => &map["data"],
        other => other,
    };
    if item.is_null() {
        return Err(CatalogError::NotFound(product_id.to_owned()));
    }

    normalize_product(item, config).map_err(|reason| {
        tracing::error!(product_id, reason, "malformed catalog payload");
        CatalogError::Unavailable(format!("malformed catalog payload: {reason}"))
    })
}

fn normalize_product(item: &Value, config: &CatalogConfig) -> Result<ProductSnapshot, &'static str> {
    let attrs = extract_attributes(item).ok_or("product is not an object")?;
    let id = document_id(&attrs).ok_or("product has no documentId")?;
    let price = parse_price(attrs.get("price")).ok_or("product price is missing or invalid")?;
    let currency = non_empty_str(attrs.get("currency"))
        .unwrap_or_else(|| config.default_currency.clone());
    if currency.chars().count() > MAX_CURRENCY_LEN {
        return Err("product currency is too long");
    }

    Ok(ProductSnapshot {
        id,
        title: non_empty_str(attrs.get("title")),
        slug: non_empty_str(attrs.get("slug")),
        price,
        currency,
        discount_percent: pricing::clamp_discount_percent(attrs.get("discount_percent")),
        image_url: image_url(attrs.get("image"), &config.public_url),
        thumbnail_url: thumbnail_url(attrs.get("image"), &config.public_url),
        category: category(attrs.get("category")),
    })
}

/// Flatten `{id, documentId, attributes}` into one attribute map.
fn extract_attributes(item: &Value) -> Option<Map<String, Value>> {
    let object = item.as_object()?;
    let Some(Value::Object(attributes)) = object.get("attributes") else {
        return Some(object.clone());
    };

    let mut merged = attributes.clone();
    if let Some(document_id) = object.get("documentId") {
        merged.insert("documentId".into(), document_id.clone());
    }
    if let Some(id) = object.get("id") {
        merged.entry("id").or_insert_with(|| id.clone());
    }
    Some(merged)
}

fn document_id(attrs: &Map<String, Value>) -> Option<String> {
    match attrs.get("documentId")? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}

fn parse_price(value: Option<&Value>) -> Option<Decimal> {
    let parsed = match value? {
        Value::Number(number) => match number.as_i64() {
            Some(whole) => Decimal::from(whole),
            None => Decimal::from_str(&number.to_string()).ok()?,
        },
        Value::String(text) => Decimal::from_str(text.trim()).ok()?,
        _ => return None,
    };
    if parsed.is_sign_negative() && !parsed.is_zero() {
        return None;
    }
    let price = pricing::quantize(parsed);
    // must be storable as minor units
    pricing::to_minor_units(price)?;
    Some(price)
}

/// Unwrap `{data: ...}` and lists down to the first media object.
fn media_object(value: Option<&Value>) -> Option<Map<String, Value>> {
    match value? {
        Value::Array(items) => media_object(items.first()),
        Value::Object(object) if object.contains_key("data") => match &object["data"] {
            Value::Null => None,
            inner => media_object(Some(inner)),
        },
        object @ Value::Object(_) => extract_attributes(object),
        _ => None,
    }
}

fn image_url(value: Option<&Value>, public_url: &str) -> Option<String> {
    match value? {
        Value::String(url) if !url.is_empty() => Some(absolute_media_url(url, public_url)),
        Value::Array(items) => image_url(items.first(), public_url),
        other => {
            let attrs = media_object(Some(other))?;
            non_empty_str(attrs.get("url")).map(|url| absolute_media_url(&url, public_url))
        }
    }
}

fn thumbnail_url(value: Option<&Value>, public_url: &str) -> Option<String> {
    let attrs = media_object(value)?;
    let url = attrs.get("formats")?.get("thumbnail")?.get("url");
    non_empty_str(url).map(|url| absolute_media_url(&url, public_url))
}

fn category(value: Option<&Value>) -> Option<CategoryRef> {
    let attrs = match value? {
        Value::Object(object) if object.contains_key("data") => {
            extract_attributes(&object["data"])?
        }
        other => extract_attributes(other)?,
    };

    Some(CategoryRef {
        id: document_id(&attrs)?,
        slug: non_empty_str(attrs.get("slug")),
        title: non_empty_str(attrs.get("title")),
    })
}

fn absolute_media_url(url: &str, public_url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_owned();
    }
    format!(
        "{}/{}",
        public_url.trim_end_matches('/'),
        url.trim_start_matches('/')
    )
}
