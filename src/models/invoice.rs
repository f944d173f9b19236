use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::line_item::sanitize;
use super::{InvoiceTotals, MISSING_CLIENT, MISSING_ITEMS};
use crate::core::{InvoiceError, InvoiceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Viewed,
    Paid,
    Overdue,
    Canceled,
    Refunded,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Viewed => "viewed",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Canceled => "canceled",
            InvoiceStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "sent" => Ok(InvoiceStatus::Sent),
            "viewed" => Ok(InvoiceStatus::Viewed),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "canceled" => Ok(InvoiceStatus::Canceled),
            "refunded" => Ok(InvoiceStatus::Refunded),
            other => Err(format!("unknown invoice status: {}", other)),
        }
    }
}

/// Payload que el borrador entrega a la capa de persistencia.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInvoice {
    pub client_id: Option<String>,
    pub client_name: String,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub template_id: String,
    pub issue_date: String,
    pub due_date: String,
    pub subtotal: f64,
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub discount_rate: f64,
    pub discount_amount: f64,
    pub total: f64,
    pub currency: String,
    pub notes: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInvoiceItem {
    pub description: String,
    pub quantity: f64,
    pub rate: f64,
    pub amount: f64,
    pub sort_order: i64,
}

/// Factura persistida (fila de `invoices`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub client_id: Option<String>,
    pub client_name: String,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub template_id: String,
    pub issue_date: String,
    pub due_date: String,
    pub subtotal: f64,
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub discount_rate: f64,
    pub discount_amount: f64,
    pub total: f64,
    pub amount_paid: f64,
    pub amount_due: f64,
    pub currency: String,
    pub notes: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    pub fn from_new(id: String, invoice_number: String, new: NewInvoice, now: DateTime<Utc>) -> Self {
        Invoice {
            id,
            client_id: new.client_id,
            client_name: new.client_name,
            invoice_number,
            status: new.status,
            template_id: new.template_id,
            issue_date: new.issue_date,
            due_date: new.due_date,
            subtotal: new.subtotal,
            tax_rate: new.tax_rate,
            tax_amount: new.tax_amount,
            discount_rate: new.discount_rate,
            discount_amount: new.discount_amount,
            total: new.total,
            amount_paid: 0.0,
            amount_due: new.total,
            currency: new.currency,
            notes: new.notes,
            sent_at: new.sent_at,
            paid_at: None,
            created_at: now,
        }
    }

    /// Aplica un cambio de estado con su marca de tiempo.
    pub fn apply_status(&mut self, status: InvoiceStatus, now: DateTime<Utc>) {
        self.status = status;
        match status {
            InvoiceStatus::Sent => self.sent_at = Some(now),
            InvoiceStatus::Paid => {
                self.paid_at = Some(now);
                self.amount_paid = self.total;
                self.amount_due = 0.0;
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub description: String,
    pub quantity: f64,
    pub rate: f64,
    pub amount: f64,
    pub sort_order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceWithItems {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

/// Línea de una factura guardada cuando se reemplazan sus ítems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItemInput {
    pub description: String,
    pub quantity: f64,
    pub rate: f64,
}

/// Cambios parciales sobre una factura guardada (PUT /invoices/{id}).
///
/// Los ítems, si llegan, reemplazan a los anteriores. Cambiar ítems o tasas
/// recalcula los totales y el saldo pendiente.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InvoiceUpdate {
    pub client_name: Option<String>,
    pub invoice_number: Option<String>,
    pub template_id: Option<String>,
    pub issue_date: Option<String>,
    pub due_date: Option<String>,
    /// `Some("")` borra las notas.
    pub notes: Option<String>,
    pub currency: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub tax_rate: Option<f64>,
    pub discount_rate: Option<f64>,
    pub items: Option<Vec<InvoiceItemInput>>,
}

impl InvoiceWithItems {
    /// Aplica el cambio completo o nada.
    pub fn apply_update(&mut self, update: InvoiceUpdate, now: DateTime<Utc>) -> InvoiceResult<()> {
        if matches!(&update.client_name, Some(name) if name.trim().is_empty()) {
            return Err(InvoiceError::validation(MISSING_CLIENT));
        }
        if let Some(items) = &update.items {
            if !items.iter().any(|item| !item.description.trim().is_empty()) {
                return Err(InvoiceError::validation(MISSING_ITEMS));
            }
        }

        let items_replaced = update.items.is_some();
        let recompute = items_replaced || update.tax_rate.is_some() || update.discount_rate.is_some();

        if let Some(v) = update.client_name {
            self.invoice.client_name = v.trim().to_string();
        }
        if let Some(v) = update.invoice_number.filter(|v| !v.trim().is_empty()) {
            self.invoice.invoice_number = v.trim().to_string();
        }
        if let Some(v) = update.template_id {
            self.invoice.template_id = v;
        }
        if let Some(v) = update.issue_date {
            self.invoice.issue_date = v;
        }
        if let Some(v) = update.due_date {
            self.invoice.due_date = v;
        }
        if let Some(v) = update.notes {
            self.invoice.notes = Some(v.trim().to_string()).filter(|n| !n.is_empty());
        }
        if let Some(v) = update.currency {
            self.invoice.currency = v;
        }
        if let Some(v) = update.tax_rate {
            self.invoice.tax_rate = sanitize(v);
        }
        if let Some(v) = update.discount_rate {
            self.invoice.discount_rate = sanitize(v);
        }

        if let Some(items) = update.items {
            let invoice_id = self.invoice.id.clone();
            self.items = items
                .into_iter()
                .filter(|item| !item.description.trim().is_empty())
                .enumerate()
                .map(|(index, item)| {
                    let quantity = sanitize(item.quantity);
                    let rate = sanitize(item.rate);
                    InvoiceItem {
                        id: Uuid::new_v4().to_string(),
                        invoice_id: invoice_id.clone(),
                        description: item.description,
                        quantity,
                        rate,
                        amount: quantity * rate,
                        sort_order: index as i64,
                    }
                })
                .collect();
        }

        if recompute {
            // sin ítems nuevos se conserva el subtotal guardado
            let subtotal = if items_replaced {
                self.items.iter().map(|item| item.amount).sum()
            } else {
                self.invoice.subtotal
            };
            let totals = InvoiceTotals::from_subtotal(
                subtotal,
                self.invoice.tax_rate,
                self.invoice.discount_rate,
            );
            self.invoice.subtotal = totals.subtotal;
            self.invoice.tax_amount = totals.tax_amount;
            self.invoice.discount_amount = totals.discount_amount;
            self.invoice.total = totals.total;
            self.invoice.amount_due = (totals.total - self.invoice.amount_paid).max(0.0);
        }

        if let Some(status) = update.status.filter(|s| *s != self.invoice.status) {
            self.invoice.apply_status(status, now);
        }
        Ok(())
    }
}

/// Número asignado por el almacén cuando el borrador no trae uno.
pub fn sequential_invoice_number(year: i32, existing: usize) -> String {
    format!("INV-{}-{:04}", year, existing + 1)
}

/// Cifras del panel, derivadas de la lista de facturas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceStats {
    pub total_revenue: f64,
    pub pending_amount: f64,
    pub overdue_amount: f64,
    pub total_invoices: usize,
    pub paid_invoices: usize,
    pub pending_invoices: usize,
    pub overdue_invoices: usize,
    pub draft_invoices: usize,
    pub this_month_invoices: usize,
    pub this_month_revenue: f64,
}

impl InvoiceStats {
    pub fn from_invoices(invoices: &[Invoice], now: DateTime<Utc>) -> Self {
        let sum = |status: InvoiceStatus| -> f64 {
            invoices.iter().filter(|i| i.status == status).map(|i| i.total).sum()
        };
        let count = |status: InvoiceStatus| invoices.iter().filter(|i| i.status == status).count();

        let this_month: Vec<&Invoice> = invoices
            .iter()
            .filter(|i| i.created_at.year() == now.year() && i.created_at.month() == now.month())
            .collect();

        InvoiceStats {
            total_revenue: sum(InvoiceStatus::Paid),
            pending_amount: sum(InvoiceStatus::Sent),
            overdue_amount: sum(InvoiceStatus::Overdue),
            total_invoices: invoices.len(),
            paid_invoices: count(InvoiceStatus::Paid),
            pending_invoices: count(InvoiceStatus::Sent),
            overdue_invoices: count(InvoiceStatus::Overdue),
            draft_invoices: count(InvoiceStatus::Draft),
            this_month_invoices: this_month.len(),
            this_month_revenue: this_month
                .iter()
                .filter(|i| i.status == InvoiceStatus::Paid)
                .map(|i| i.total)
                .sum(),
        }
    }
}
