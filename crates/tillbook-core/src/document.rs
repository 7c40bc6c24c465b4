//! # Document Totals
//!
//! Pure derivation of document-aggregate totals and payment status.
//!
//! The repositories never write `total_amount`, `remaining_balance`, or
//! `payment_status` by hand: every line-item mutation and every payment
//! application re-derives them through this module, in the same database
//! transaction as the mutation itself. That closes the classic
//! "recompute-then-save, forgot the recompute" gap.
//!
//! ## Fixed payment-status rule
//! ```text
//! remaining_balance <= 0  →  Paid
//! amount_paid > 0         →  Partial
//! otherwise               →  Pending
//! ```

use crate::money::Money;
use crate::types::PaymentStatus;

/// Derived totals for a document aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentTotals {
    pub subtotal: Money,
    pub total_amount: Money,
    pub remaining_balance: Money,
    pub payment_status: PaymentStatus,
}

/// Applies the fixed payment-status rule.
pub fn derive_payment_status(remaining_balance: Money, amount_paid: Money) -> PaymentStatus {
    if remaining_balance.cents() <= 0 {
        PaymentStatus::Paid
    } else if amount_paid.is_positive() {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Pending
    }
}

/// Totals for a sales transaction: the discount reduces the subtotal.
pub fn sale_totals(subtotal: Money, discount_amount: Money, amount_paid: Money) -> DocumentTotals {
    let total_amount = subtotal - discount_amount;
    let remaining_balance = total_amount - amount_paid;
    DocumentTotals {
        subtotal,
        total_amount,
        remaining_balance,
        payment_status: derive_payment_status(remaining_balance, amount_paid),
    }
}

/// Totals for a purchase: the tax amount is added on top of the subtotal.
pub fn purchase_totals(subtotal: Money, tax_amount: Money, amount_paid: Money) -> DocumentTotals {
    let total_amount = subtotal + tax_amount;
    let remaining_balance = total_amount - amount_paid;
    DocumentTotals {
        subtotal,
        total_amount,
        remaining_balance,
        payment_status: derive_payment_status(remaining_balance, amount_paid),
    }
}

/// Line total: `quantity × unit_price`.
#[inline]
pub fn line_total(quantity: i64, unit_price: Money) -> Money {
    unit_price.multiply_quantity(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_rule() {
        // remaining <= 0 wins even with zero paid (free sale)
        assert_eq!(
            derive_payment_status(Money::zero(), Money::zero()),
            PaymentStatus::Paid
        );
        assert_eq!(
            derive_payment_status(Money::from_cents(-100), Money::from_cents(200)),
            PaymentStatus::Paid
        );
        assert_eq!(
            derive_payment_status(Money::from_cents(60), Money::from_cents(40)),
            PaymentStatus::Partial
        );
        assert_eq!(
            derive_payment_status(Money::from_cents(100), Money::zero()),
            PaymentStatus::Pending
        );
    }

    #[test]
    fn test_sale_totals() {
        let t = sale_totals(
            Money::from_cents(10000),
            Money::from_cents(1000),
            Money::from_cents(4000),
        );
        assert_eq!(t.total_amount.cents(), 9000);
        assert_eq!(t.remaining_balance.cents(), 5000);
        assert_eq!(t.payment_status, PaymentStatus::Partial);
        // invariant: remaining = total - paid
        assert_eq!(
            t.remaining_balance,
            t.total_amount - Money::from_cents(4000)
        );
    }

    #[test]
    fn test_purchase_totals() {
        let t = purchase_totals(
            Money::from_cents(10000),
            Money::from_cents(825),
            Money::from_cents(10825),
        );
        assert_eq!(t.total_amount.cents(), 10825);
        assert_eq!(t.remaining_balance.cents(), 0);
        assert_eq!(t.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(3, Money::from_cents(299)).cents(), 897);
    }
}
