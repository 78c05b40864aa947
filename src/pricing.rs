//! Money arithmetic for cart and order lines.
//!
//! Every monetary value is a [`Decimal`] with scale 2. Rounding is always
//! half-up (away from zero on a tie).

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde_json::Value;

/// Number of fractional digits carried by every monetary value.
pub const MONEY_SCALE: u32 = 2;

const MAX_DISCOUNT_PERCENT: i64 = 100;

/// Round to two decimals (half-up) and pin the scale to exactly two.
pub fn quantize(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// A zero amount with the money scale.
pub fn zero() -> Decimal {
    Decimal::new(0, MONEY_SCALE)
}

/// Convert persisted minor units (cents) into a money value.
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, MONEY_SCALE)
}

/// Convert a money value into minor units for persistence.
///
/// Returns `None` when the amount does not fit an `i64`.
pub fn to_minor_units(value: Decimal) -> Option<i64> {
    let quantized = quantize(value);
    i64::try_from(quantized.mantissa()).ok()
}

/// Clamp an already-integral percentage into `0..=100`.
pub fn clamp_percent(value: i64) -> i32 {
    value.clamp(0, MAX_DISCOUNT_PERCENT) as i32
}

/// Interpret a loosely-typed discount field from an external payload.
///
/// Numbers and numeric strings are truncated toward zero and clamped into
/// `0..=100`. Anything else (missing, null, booleans, garbage) yields 0.
pub fn clamp_discount_percent(raw: Option<&Value>) -> i32 {
    let parsed = match raw {
        Some(Value::Number(number)) => number
            .as_i64()
            .map(Decimal::from)
            .or_else(|| number.as_f64().and_then(decimal_from_f64)),
        Some(Value::String(text)) => parse_decimal(text),
        _ => None,
    };

    parsed.map(clamp_decimal_percent).unwrap_or(0)
}

/// Unit price after applying `discount_percent`.
///
/// The price is quantized before the discount is applied and again after.
/// Returns `None` if the arithmetic leaves the decimal range.
pub fn discounted_unit_price(price: Decimal, discount_percent: i32) -> Option<Decimal> {
    let safe_price = quantize(price);
    let discount = clamp_percent(i64::from(discount_percent));
    if discount <= 0 {
        return Some(safe_price);
    }

    let factor = Decimal::ONE - Decimal::from(discount) / Decimal::ONE_HUNDRED;
    safe_price.checked_mul(factor).map(quantize)
}

/// `unit_price * quantity`, quantized. `None` on overflow.
pub fn line_total(unit_price: Decimal, quantity: i32) -> Option<Decimal> {
    unit_price.checked_mul(Decimal::from(quantity)).map(quantize)
}

/// Fully priced figures for one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinePricing {
    pub unit_price_original: Decimal,
    pub discount_percent: i32,
    pub unit_price_final: Decimal,
    pub line_total: Decimal,
    pub line_total_original: Decimal,
}

impl LinePricing {
    /// Price one line, or `None` when any figure overflows.
    pub fn compute(
        unit_price_original: Decimal,
        discount_percent: i32,
        quantity: i32,
    ) -> Option<Self> {
        let unit_price_original = quantize(unit_price_original);
        let discount_percent = clamp_percent(i64::from(discount_percent));
        let unit_price_final = discounted_unit_price(unit_price_original, discount_percent)?;

        Some(Self {
            unit_price_original,
            discount_percent,
            unit_price_final,
            line_total: line_total(unit_price_final, quantity)?,
            line_total_original: line_total(unit_price_original, quantity)?,
        })
    }
}

/// Running cart-level totals.
///
/// `subtotal_final` is the exact sum of already-quantized line totals; it is
/// never re-derived from the original subtotal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartTotals {
    pub total_quantity: i64,
    pub subtotal_original: Decimal,
    pub subtotal_final: Decimal,
}

impl Default for CartTotals {
    fn default() -> Self {
        Self {
            total_quantity: 0,
            subtotal_original: zero(),
            subtotal_final: zero(),
        }
    }
}

impl CartTotals {
    /// Fold one line into the totals. On overflow nothing is changed and
    /// `None` is returned.
    pub fn add_line(&mut self, pricing: &LinePricing, quantity: i32) -> Option<()> {
        let total_quantity = self.total_quantity.checked_add(i64::from(quantity))?;
        let subtotal_original = self.subtotal_original.checked_add(pricing.line_total_original)?;
        let subtotal_final = self.subtotal_final.checked_add(pricing.line_total)?;

        self.total_quantity = total_quantity;
        self.subtotal_original = subtotal_original;
        self.subtotal_final = subtotal_final;
        Some(())
    }

    pub fn discount_total(&self) -> Decimal {
        // both subtotals are non-negative and final <= original
        self.subtotal_original - self.subtotal_final
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

fn clamp_decimal_percent(value: Decimal) -> i32 {
    if value <= Decimal::ZERO {
        return 0;
    }
    if value >= Decimal::ONE_HUNDRED {
        return MAX_DISCOUNT_PERCENT as i32;
    }
    value.trunc().to_i32().unwrap_or(0)
}

fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    // magnitudes beyond the decimal range still clamp to the right bound
    match Decimal::try_from(value) {
        Ok(decimal) => Some(decimal),
        Err(_) if value.is_sign_negative() => Some(Decimal::MIN),
        Err(_) => Some(Decimal::MAX),
    }
}
