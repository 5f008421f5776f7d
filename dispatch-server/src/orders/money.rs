//! Money calculation utilities using rust_decimal for precision
//!
//! All order amounts are computed with `Decimal` internally, then
//! converted to `f64` for storage/serialization (2 decimal places,
//! half-up).

use rust_decimal::prelude::*;

use super::error::{OrderError, OrderResult};
use shared::models::order::OrderItem;

/// Rounding: 2 decimal places, half-up
const DECIMAL_PLACES: u32 = 2;

/// Maximum allowed unit price per item
const MAX_PRICE: f64 = 1_000_000.0;
/// Maximum allowed quantity per line item
const MAX_QUANTITY: i32 = 99;

/// Computed order amounts
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTotals {
    pub subtotal: f64,
    pub tax: f64,
    pub delivery_fee: f64,
    pub discount: f64,
    pub total: f64,
}

fn require_finite(value: f64, field: &str) -> OrderResult<Decimal> {
    if !value.is_finite() {
        return Err(OrderError::Validation(format!(
            "{} must be a finite number, got {}",
            field, value
        )));
    }
    if value < 0.0 {
        return Err(OrderError::Validation(format!(
            "{} must be non-negative, got {}",
            field, value
        )));
    }
    Decimal::from_f64_retain(value)
        .ok_or_else(|| OrderError::Validation(format!("{} is not representable", field)))
}

fn round_money(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or(0.0)
}

/// Line total for one item (unit_price * quantity)
pub fn line_total(unit_price: f64, quantity: i32) -> OrderResult<f64> {
    if quantity < 1 || quantity > MAX_QUANTITY {
        return Err(OrderError::Validation(format!(
            "quantity must be between 1 and {}, got {}",
            MAX_QUANTITY, quantity
        )));
    }
    if unit_price > MAX_PRICE {
        return Err(OrderError::Validation(format!(
            "unit price exceeds maximum allowed ({})",
            MAX_PRICE
        )));
    }
    let price = require_finite(unit_price, "unit_price")?;
    Ok(round_money(price * Decimal::from(quantity)))
}

/// 计算订单总额
///
/// `total = subtotal + tax + delivery_fee - discount`，创建时计算一次，
/// 此后除取消外不再变化。
pub fn compute_totals(
    items: &[OrderItem],
    tax: f64,
    delivery_fee: f64,
    discount: f64,
) -> OrderResult<OrderTotals> {
    if items.is_empty() {
        return Err(OrderError::Validation("order has no items".to_string()));
    }

    let mut subtotal = Decimal::ZERO;
    for item in items {
        subtotal += require_finite(item.line_total, "line_total")?;
    }

    let tax_d = require_finite(tax, "tax")?;
    let fee_d = require_finite(delivery_fee, "delivery_fee")?;
    let discount_d = require_finite(discount, "discount")?;

    let total = subtotal + tax_d + fee_d - discount_d;
    if total < Decimal::ZERO {
        return Err(OrderError::Validation(
            "discount exceeds order value".to_string(),
        ));
    }

    Ok(OrderTotals {
        subtotal: round_money(subtotal),
        tax: round_money(tax_d),
        delivery_fee: round_money(fee_d),
        discount: round_money(discount_d),
        total: round_money(total),
    })
}

/// Percentage-based tax on a subtotal (used when the request omits tax)
pub fn tax_from_rate(subtotal: f64, rate_percent: f64) -> OrderResult<f64> {
    let subtotal = require_finite(subtotal, "subtotal")?;
    let rate = require_finite(rate_percent, "tax_rate")?;
    Ok(round_money(subtotal * rate / Decimal::from(100)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(unit_price: f64, quantity: i32) -> OrderItem {
        OrderItem {
            product_id: "product:p1".into(),
            name: "Test".into(),
            unit_price,
            quantity,
            line_total: line_total(unit_price, quantity).unwrap(),
        }
    }

    #[test]
    fn test_total_formula() {
        // items [{price 199, qty 2}], tax 18, fee 30, discount 0 -> 646
        let items = vec![item(199.0, 2)];
        let totals = compute_totals(&items, 18.0, 30.0, 0.0).unwrap();
        assert_eq!(totals.subtotal, 398.0);
        assert_eq!(totals.total, 646.0);
    }

    #[test]
    fn test_discount_applied() {
        let items = vec![item(100.0, 1), item(50.0, 2)];
        let totals = compute_totals(&items, 10.0, 30.0, 40.0).unwrap();
        assert_eq!(totals.subtotal, 200.0);
        assert_eq!(totals.total, 200.0);
    }

    #[test]
    fn test_rejects_negative_and_nan() {
        let items = vec![item(10.0, 1)];
        assert!(compute_totals(&items, -1.0, 0.0, 0.0).is_err());
        assert!(compute_totals(&items, f64::NAN, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_rejects_excessive_discount() {
        let items = vec![item(10.0, 1)];
        assert!(compute_totals(&items, 0.0, 0.0, 100.0).is_err());
    }

    #[test]
    fn test_rejects_empty_order() {
        assert!(compute_totals(&[], 0.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_line_total_bounds() {
        assert!(line_total(10.0, 0).is_err());
        assert!(line_total(10.0, 100).is_err());
        assert_eq!(line_total(19.99, 3).unwrap(), 59.97);
    }

    #[test]
    fn test_tax_from_rate() {
        assert_eq!(tax_from_rate(200.0, 5.0).unwrap(), 10.0);
        assert_eq!(tax_from_rate(199.0, 5.0).unwrap(), 9.95);
    }
}
