//! Invoice amounts

use serde::{Deserialize, Serialize};

/// Tax rate applied when an invoice does not set one, in percent
pub const DEFAULT_TAX_RATE: f64 = 16.0;

/// Subtotal, tax and total of a single-line invoice
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

impl InvoiceTotals {
    /// `rate_percent` is a percentage, e.g. `16.0`
    pub fn compute(amount: f64, rate_percent: f64) -> Self {
        let subtotal = amount;
        let tax = subtotal * rate_percent / 100.0;
        Self {
            subtotal,
            tax,
            total: subtotal + tax,
        }
    }
}
