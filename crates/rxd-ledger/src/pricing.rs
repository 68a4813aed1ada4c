//! Checked order arithmetic. All amounts are integer minor units.

use rxd_schemas::OrderItem;

use crate::LedgerError;

pub fn line_total(quantity: i64, unit_price_minor: i64) -> Result<i64, LedgerError> {
    quantity
        .checked_mul(unit_price_minor)
        .ok_or(LedgerError::Overflow)
}

/// Sum of recomputed line totals. Ignores the stored `line_total_minor` so a
/// tampered line cannot skew the order total.
pub fn order_total(items: &[OrderItem]) -> Result<i64, LedgerError> {
    items.iter().try_fold(0i64, |acc, item| {
        let line = line_total(item.quantity, item.unit_price_minor)?;
        acc.checked_add(line).ok_or(LedgerError::Overflow)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn item(quantity: i64, unit_price_minor: i64) -> OrderItem {
        OrderItem {
            product_id: Uuid::new_v4(),
            sku: "X".into(),
            product_name: "x".into(),
            quantity,
            unit_price_minor,
            line_total_minor: 0,
            deducted: 0,
        }
    }

    #[test]
    fn total_sums_recomputed_lines() {
        assert_eq!(order_total(&[item(3, 1250), item(1, 99)]).unwrap(), 3849);
        assert_eq!(order_total(&[]).unwrap(), 0);
    }

    #[test]
    fn overflow_is_an_error() {
        assert_eq!(line_total(i64::MAX, 2), Err(LedgerError::Overflow));
        assert_eq!(
            order_total(&[item(1, i64::MAX), item(1, 1)]),
            Err(LedgerError::Overflow)
        );
    }
}
