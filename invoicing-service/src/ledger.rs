//! Pure financial derivations for invoices.
//!
//! Everything in this module is side-effect free: totals and payment checks
//! are computed from the values handed in, and the persistence layer applies
//! the results. Stored totals are never trusted; any change to items or
//! rates goes back through [`compute_totals`].
//!
//! All arithmetic is exact [`Decimal`] arithmetic. Rounding to the
//! currency's minor-unit scale happens once, via [`Totals::rounded`], at the
//! persistence boundary, never per intermediate step.

use crate::models::LineItem;
use rust_decimal::{Decimal, RoundingStrategy};
use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("{field} must be between 0 and 100, got {value}")]
    InvalidRate { field: &'static str, value: Decimal },

    #[error("line item {index}: quantity and unit price must be non-negative")]
    InvalidLineItem { index: usize },

    #[error("an invoice must have at least one line item")]
    EmptyInvoice,

    #[error("payment amount must be positive, got {amount}")]
    InvalidPaymentAmount { amount: Decimal },

    #[error("payment amount {amount} exceeds outstanding balance {balance}")]
    Overpayment { amount: Decimal, balance: Decimal },
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError::BadRequest(anyhow::Error::new(err))
    }
}

/// Derived invoice totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub sub_total: Decimal,
    pub discount_amount: Decimal,
    pub taxable_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

impl Totals {
    /// Round every figure to the currency's minor-unit scale, midpoint away
    /// from zero. Applied once, when the totals leave the computation layer.
    pub fn rounded(&self, scale: u32) -> Totals {
        let round =
            |d: Decimal| d.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
        Totals {
            sub_total: round(self.sub_total),
            discount_amount: round(self.discount_amount),
            taxable_amount: round(self.taxable_amount),
            tax_amount: round(self.tax_amount),
            total_amount: round(self.total_amount),
        }
    }
}

/// Compute invoice totals from line items and rates.
///
/// The discount applies to the pre-discount subtotal; tax applies to the
/// discounted (taxable) amount. Out-of-range rates and negative items are
/// rejected, never clamped.
pub fn compute_totals(
    items: &[LineItem],
    tax_rate: Decimal,
    discount_rate: Decimal,
) -> Result<Totals, LedgerError> {
    if items.is_empty() {
        return Err(LedgerError::EmptyInvoice);
    }
    validate_rate("tax rate", tax_rate)?;
    validate_rate("discount rate", discount_rate)?;

    let mut sub_total = Decimal::ZERO;
    for (index, item) in items.iter().enumerate() {
        if item.quantity < Decimal::ZERO || item.unit_price < Decimal::ZERO {
            return Err(LedgerError::InvalidLineItem { index });
        }
        sub_total += item.quantity * item.unit_price;
    }

    let discount_amount = sub_total * discount_rate / Decimal::ONE_HUNDRED;
    let taxable_amount = sub_total - discount_amount;
    let tax_amount = taxable_amount * tax_rate / Decimal::ONE_HUNDRED;
    let total_amount = taxable_amount + tax_amount;

    Ok(Totals {
        sub_total,
        discount_amount,
        taxable_amount,
        tax_amount,
        total_amount,
    })
}

fn validate_rate(field: &'static str, value: Decimal) -> Result<(), LedgerError> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(LedgerError::InvalidRate { field, value });
    }
    Ok(())
}

/// Outstanding balance of an invoice.
pub fn balance(total_amount: Decimal, total_paid: Decimal) -> Decimal {
    total_amount - total_paid
}

/// Validate a prospective payment against the current balance.
///
/// On rejection the invoice is left exactly as it was: this function only
/// inspects, the caller only writes after it succeeds.
pub fn validate_payment(
    total_amount: Decimal,
    total_paid: Decimal,
    amount: Decimal,
) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidPaymentAmount { amount });
    }
    let balance = balance(total_amount, total_paid);
    if amount > balance {
        return Err(LedgerError::Overpayment { amount, balance });
    }
    Ok(())
}

/// Whether the invoice is fully settled.
///
/// Convenience derivation for callers; `status` is assigned independently
/// and never driven from this.
pub fn is_fully_paid(total_amount: Decimal, total_paid: Decimal) -> bool {
    balance(total_amount, total_paid) <= Decimal::ZERO
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: i64, unit_price: i64) -> LineItem {
        LineItem {
            description: "test item".to_string(),
            quantity: Decimal::from(quantity),
            unit_price: Decimal::from(unit_price),
        }
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn computes_the_worked_example() {
        // 2×100 + 1×50, 10% discount then 20% tax
        let items = vec![item(2, 100), item(1, 50)];
        let totals = compute_totals(&items, Decimal::from(20), Decimal::from(10)).unwrap();

        assert_eq!(totals.sub_total, Decimal::from(250));
        assert_eq!(totals.discount_amount, Decimal::from(25));
        assert_eq!(totals.taxable_amount, Decimal::from(225));
        assert_eq!(totals.tax_amount, Decimal::from(45));
        assert_eq!(totals.total_amount, Decimal::from(270));
    }

    #[test]
    fn zero_rates_leave_total_equal_to_subtotal() {
        let items = vec![item(3, 7), item(1, 9)];
        let totals = compute_totals(&items, Decimal::ZERO, Decimal::ZERO).unwrap();

        assert_eq!(totals.sub_total, Decimal::from(30));
        assert_eq!(totals.discount_amount, Decimal::ZERO);
        assert_eq!(totals.tax_amount, Decimal::ZERO);
        assert_eq!(totals.total_amount, totals.sub_total);
    }

    #[test]
    fn total_matches_closed_form() {
        // total = subTotal × (1 − d/100) × (1 + t/100)
        let items = vec![item(4, 125), item(2, 30)];
        let tax = dec("8.5");
        let discount = dec("12.5");
        let totals = compute_totals(&items, tax, discount).unwrap();

        let expected = totals.sub_total * (Decimal::ONE - discount / Decimal::ONE_HUNDRED)
            * (Decimal::ONE + tax / Decimal::ONE_HUNDRED);
        assert_eq!(totals.total_amount, expected);
    }

    #[test]
    fn discount_applies_before_tax() {
        let items = vec![item(1, 100)];
        let totals = compute_totals(&items, Decimal::from(10), Decimal::from(50)).unwrap();

        // Tax is charged on the discounted 50, not the original 100.
        assert_eq!(totals.tax_amount, Decimal::from(5));
        assert_eq!(totals.total_amount, Decimal::from(55));
    }

    #[test]
    fn identical_inputs_yield_identical_outputs() {
        let items = vec![item(2, 100), item(1, 50)];
        let a = compute_totals(&items, dec("19.6"), dec("2.5")).unwrap();
        let b = compute_totals(&items, dec("19.6"), dec("2.5")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_rates_outside_range() {
        let items = vec![item(1, 10)];

        let err = compute_totals(&items, dec("100.01"), Decimal::ZERO).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRate { field: "tax rate", .. }));

        let err = compute_totals(&items, Decimal::ZERO, Decimal::from(-1)).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidRate {
                field: "discount rate",
                ..
            }
        ));

        // Boundary values are valid.
        assert!(compute_totals(&items, Decimal::ONE_HUNDRED, Decimal::ONE_HUNDRED).is_ok());
    }

    #[test]
    fn rejects_negative_line_items() {
        let items = vec![item(1, 10), item(-1, 10)];
        let err = compute_totals(&items, Decimal::ZERO, Decimal::ZERO).unwrap_err();
        assert_eq!(err, LedgerError::InvalidLineItem { index: 1 });

        let items = vec![item(1, -10)];
        let err = compute_totals(&items, Decimal::ZERO, Decimal::ZERO).unwrap_err();
        assert_eq!(err, LedgerError::InvalidLineItem { index: 0 });
    }

    #[test]
    fn rejects_empty_invoices() {
        let err = compute_totals(&[], Decimal::ZERO, Decimal::ZERO).unwrap_err();
        assert_eq!(err, LedgerError::EmptyInvoice);
    }

    #[test]
    fn zero_quantity_items_are_allowed() {
        let items = vec![item(0, 100), item(1, 50)];
        let totals = compute_totals(&items, Decimal::ZERO, Decimal::ZERO).unwrap();
        assert_eq!(totals.sub_total, Decimal::from(50));
    }

    #[test]
    fn rounding_happens_once_at_the_boundary() {
        // 3 × 33.335 = 100.005; 5% discount and 5% tax leave repeating
        // intermediate figures that must not be rounded individually.
        let items = vec![LineItem {
            description: "odd lot".to_string(),
            quantity: Decimal::from(3),
            unit_price: dec("33.335"),
        }];
        let exact = compute_totals(&items, Decimal::from(5), Decimal::from(5)).unwrap();

        assert_eq!(exact.sub_total, dec("100.005"));
        // Exact: 100.005 × 0.95 × 1.05 = 99.75498750
        assert_eq!(exact.total_amount, dec("99.7549875"));

        let rounded = exact.rounded(0);
        assert_eq!(rounded.sub_total, Decimal::from(100));
        assert_eq!(rounded.total_amount, Decimal::from(100));

        let cents = exact.rounded(2);
        assert_eq!(cents.total_amount, dec("99.75"));
    }

    #[test]
    fn payment_sequence_accounting_stays_consistent() {
        let total = Decimal::from(270);
        let mut paid = Decimal::ZERO;

        for amount in [100i64, 100, 70] {
            let amount = Decimal::from(amount);
            validate_payment(total, paid, amount).unwrap();
            paid += amount;
            assert!(balance(total, paid) >= Decimal::ZERO);
        }

        assert_eq!(balance(total, paid), Decimal::ZERO);
        assert!(is_fully_paid(total, paid));
    }

    #[test]
    fn rejects_overpayment_and_reports_balance() {
        let err = validate_payment(Decimal::from(270), Decimal::from(100), Decimal::from(200))
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::Overpayment {
                amount: Decimal::from(200),
                balance: Decimal::from(170),
            }
        );
    }

    #[test]
    fn rejects_non_positive_payments() {
        let err =
            validate_payment(Decimal::from(100), Decimal::ZERO, Decimal::ZERO).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPaymentAmount { .. }));

        let err =
            validate_payment(Decimal::from(100), Decimal::ZERO, Decimal::from(-5)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPaymentAmount { .. }));
    }

    #[test]
    fn exact_balance_payment_is_accepted() {
        validate_payment(Decimal::from(100), Decimal::from(30), Decimal::from(70)).unwrap();
    }

    #[test]
    fn fully_paid_is_a_derivation_only() {
        assert!(!is_fully_paid(Decimal::from(100), Decimal::from(99)));
        assert!(is_fully_paid(Decimal::from(100), Decimal::from(100)));
        assert!(is_fully_paid(Decimal::ZERO, Decimal::ZERO));
    }
}
