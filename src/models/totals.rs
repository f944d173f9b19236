use serde::{Deserialize, Serialize};

use super::LineItem;

/// Totales derivados de un borrador. Se recalculan desde cero en cada lectura.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceTotals {
    pub subtotal: f64,
    pub tax_amount: f64,
    pub discount_amount: f64,
    pub total: f64,
}

impl InvoiceTotals {
    /// `tax_rate` y `discount_rate` son porcentajes (10 = 10%).
    pub fn compute(items: &[LineItem], tax_rate: f64, discount_rate: f64) -> Self {
        let subtotal: f64 = items.iter().map(LineItem::amount).sum();
        Self::from_subtotal(subtotal, tax_rate, discount_rate)
    }

    pub fn from_subtotal(subtotal: f64, tax_rate: f64, discount_rate: f64) -> Self {
        let tax_amount = subtotal * (tax_rate / 100.0);
        let discount_amount = subtotal * (discount_rate / 100.0);

        InvoiceTotals {
            subtotal,
            tax_amount,
            discount_amount,
            total: subtotal + tax_amount - discount_amount,
        }
    }
}
