use serde::Serialize;

use super::catalog::TemplateDescriptor;
use super::helpers::{format_currency, format_decimal, format_display_date};
use crate::models::{InvoiceDraft, InvoiceTotals};

pub const DEFAULT_CURRENCY_SYMBOL: &str = "$";
pub const UNTITLED_ITEM: &str = "Untitled item";
pub const NO_ITEMS: &str = "No items added";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartyView {
    pub label: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    /// Data URL del logo, sólo para el emisor.
    pub logo: Option<String>,
}

impl PartyView {
    /// Líneas de contacto no vacías bajo el nombre.
    pub fn detail_lines(&self) -> Vec<&str> {
        [self.email.as_str(), self.phone.as_str(), self.address.as_str()]
            .into_iter()
            .filter(|line| !line.trim().is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowView {
    pub description: String,
    pub quantity: String,
    pub rate: String,
    pub amount: String,
}

/// Línea de ajuste (impuesto o descuento) ya etiquetada.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjustmentView {
    pub label: String,
    pub amount: String,
}

/// Modelo de presentación compartido por la vista HTML y el PDF.
///
/// Todo texto visible se formatea aquí una sola vez, así ambos
/// renderizadores muestran exactamente las mismas cadenas.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceView {
    pub template_id: String,
    pub template_name: String,
    pub color: String,
    pub accent_color: String,
    pub title: String,
    pub invoice_number: String,
    pub sender: PartyView,
    pub recipient: PartyView,
    pub issue_date_label: String,
    pub issue_date: String,
    pub due_date_label: String,
    pub due_date: String,
    pub column_labels: [String; 4],
    pub rows: Vec<RowView>,
    pub empty_items_text: String,
    pub subtotal_label: String,
    pub subtotal: String,
    pub tax: Option<AdjustmentView>,
    pub discount: Option<AdjustmentView>,
    pub total_label: String,
    pub total: String,
    pub notes_label: String,
    pub notes: Option<String>,
    pub footer: String,
    pub totals: InvoiceTotals,
}

impl InvoiceView {
    pub fn build(draft: &InvoiceDraft, template: &TemplateDescriptor) -> Self {
        Self::with_currency(draft, template, DEFAULT_CURRENCY_SYMBOL)
    }

    pub fn with_currency(draft: &InvoiceDraft, template: &TemplateDescriptor, symbol: &str) -> Self {
        let style = &template.layout.style;
        let totals = draft.totals();
        let money = |amount: f64| format_currency(amount, symbol);

        let sender = PartyView {
            label: style.sender_label.to_string(),
            name: or_placeholder(&draft.sender.name, style.sender_placeholder),
            email: draft.sender.email.trim().to_string(),
            phone: draft.sender.phone.trim().to_string(),
            address: draft.sender.address.trim().to_string(),
            logo: draft.sender.logo.as_ref().map(|l| l.data_url().to_string()),
        };

        let recipient = PartyView {
            label: style.recipient_label.to_string(),
            name: or_placeholder(&draft.recipient.name, style.recipient_placeholder),
            email: draft.recipient.email.trim().to_string(),
            phone: String::new(),
            address: draft.recipient.address.trim().to_string(),
            logo: None,
        };

        // Se muestran las líneas con descripción o con importe
        let rows = draft
            .items()
            .iter()
            .filter(|item| item.has_description() || item.amount() != 0.0)
            .map(|item| RowView {
                description: if item.has_description() {
                    item.description.trim().to_string()
                } else {
                    UNTITLED_ITEM.to_string()
                },
                quantity: format_decimal(item.quantity),
                rate: money(item.rate),
                amount: money(item.amount()),
            })
            .collect();

        let tax = (draft.tax_rate > 0.0).then(|| AdjustmentView {
            label: format!("Tax ({}%)", format_decimal(draft.tax_rate)),
            amount: money(totals.tax_amount),
        });

        let discount = (draft.discount_rate > 0.0).then(|| AdjustmentView {
            label: format!("Discount ({}%)", format_decimal(draft.discount_rate)),
            amount: money(-totals.discount_amount),
        });

        let notes = Some(draft.notes.trim())
            .filter(|n| !n.is_empty())
            .or(style.default_notes)
            .map(str::to_string);

        InvoiceView {
            template_id: template.id.to_string(),
            template_name: template.name.to_string(),
            color: template.color.to_string(),
            accent_color: template.accent_color.to_string(),
            title: style.title.to_string(),
            invoice_number: draft.invoice_number.trim().to_string(),
            sender,
            recipient,
            issue_date_label: "Issue Date".to_string(),
            issue_date: format_display_date(&draft.issue_date),
            due_date_label: "Due Date".to_string(),
            due_date: format_display_date(&draft.due_date),
            column_labels: [
                "Description".to_string(),
                "Qty".to_string(),
                "Rate".to_string(),
                "Amount".to_string(),
            ],
            rows,
            empty_items_text: NO_ITEMS.to_string(),
            subtotal_label: "Subtotal".to_string(),
            subtotal: money(totals.subtotal),
            tax,
            discount,
            total_label: style.total_label.to_string(),
            total: money(totals.total),
            notes_label: "Notes".to_string(),
            notes,
            footer: style.footer.to_string(),
            totals,
        }
    }

    /// Nombre del archivo exportado.
    pub fn pdf_filename(&self) -> String {
        let number = self.invoice_number.trim();
        if number.is_empty() {
            "invoice.pdf".to_string()
        } else {
            format!("{}.pdf", number)
        }
    }

    /// Filas de totales en orden: subtotal, impuesto, descuento.
    pub fn summary_lines(&self) -> Vec<(&str, &str)> {
        let mut lines = vec![(self.subtotal_label.as_str(), self.subtotal.as_str())];
        if let Some(tax) = &self.tax {
            lines.push((tax.label.as_str(), tax.amount.as_str()));
        }
        if let Some(discount) = &self.discount {
            lines.push((discount.label.as_str(), discount.amount.as_str()));
        }
        lines
    }
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        placeholder.to_string()
    } else {
        trimmed.to_string()
    }
}
