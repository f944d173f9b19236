use chrono::{Duration, Local, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{
    Client, FieldUpdate, InvoiceStatus, InvoiceTotals, ItemField, LineItem, LineItemId, LogoImage,
    NewInvoice, NewInvoiceItem, NumericInput, Profile,
};
use crate::core::{InvoiceError, InvoiceResult};

pub const DEFAULT_SENDER_NAME: &str = "Your Company";
pub const DEFAULT_SENDER_EMAIL: &str = "hello@company.com";
pub const DEFAULT_SENDER_PHONE: &str = "+1 555-0100";
pub const DEFAULT_SENDER_ADDRESS: &str = "123 Business Street, City, State 12345";

/// Plazo de pago por defecto, en días.
pub const PAYMENT_TERM_DAYS: i64 = 14;

pub const MISSING_CLIENT: &str = "Please select or enter a client";
pub const MISSING_ITEMS: &str = "Please add at least one line item";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub logo: Option<LogoImage>,
}

impl Default for SenderInfo {
    fn default() -> Self {
        SenderInfo {
            name: DEFAULT_SENDER_NAME.to_string(),
            email: DEFAULT_SENDER_EMAIL.to_string(),
            phone: DEFAULT_SENDER_PHONE.to_string(),
            address: DEFAULT_SENDER_ADDRESS.to_string(),
            logo: None,
        }
    }
}

impl SenderInfo {
    pub fn from_profile(profile: &Profile) -> Self {
        let defaults = SenderInfo::default();
        let pick = |value: Option<&String>, fallback: String| {
            value
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or(fallback)
        };

        let address = profile.company_address_line();
        let logo = profile
            .company_logo
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .and_then(|url| match LogoImage::from_data_url(url) {
                Ok(logo) => Some(logo),
                Err(e) => {
                    warn!("Ignoring profile logo: {}", e);
                    None
                }
            });

        SenderInfo {
            name: pick(
                profile.company_name.as_ref().or(profile.full_name.as_ref()),
                defaults.name,
            ),
            email: pick(
                profile.company_email.as_ref().or(Some(&profile.email)),
                defaults.email,
            ),
            phone: pick(profile.company_phone.as_ref(), defaults.phone),
            address: if address.is_empty() { defaults.address } else { address },
            logo,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientInfo {
    pub client_id: Option<String>,
    pub name: String,
    pub email: String,
    pub address: String,
}

impl RecipientInfo {
    pub fn is_present(&self) -> bool {
        self.client_id.is_some() || !self.name.trim().is_empty()
    }
}

/// Factura en edición. Nunca guarda totales: se derivan en cada lectura.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDraft {
    pub sender: SenderInfo,
    pub recipient: RecipientInfo,
    pub invoice_number: String,
    pub issue_date: String,
    pub due_date: String,
    pub template_id: String,
    pub notes: String,
    items: Vec<LineItem>,
    pub tax_rate: f64,
    pub discount_rate: f64,
}

/// Cambios parciales sobre la cabecera del borrador (PUT /drafts/{id}).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftPatch {
    pub sender_name: Option<String>,
    pub sender_email: Option<String>,
    pub sender_phone: Option<String>,
    pub sender_address: Option<String>,
    /// `Some("")` quita el logo.
    pub sender_logo: Option<String>,
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_address: Option<String>,
    pub invoice_number: Option<String>,
    pub issue_date: Option<String>,
    pub due_date: Option<String>,
    pub template_id: Option<String>,
    pub notes: Option<String>,
    pub tax_rate: Option<String>,
    pub discount_rate: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchOutcome {
    pub tax_rate: Option<NumericInput>,
    pub discount_rate: Option<NumericInput>,
}

impl PatchOutcome {
    pub fn was_coerced(&self) -> bool {
        [self.tax_rate, self.discount_rate]
            .iter()
            .flatten()
            .any(NumericInput::was_coerced)
    }
}

impl InvoiceDraft {
    pub fn new(profile: Option<&Profile>, template_id: impl Into<String>) -> Self {
        Self::dated(profile, template_id, Local::now().date_naive())
    }

    /// Igual que `new` con una fecha de emisión fija.
    pub fn dated(profile: Option<&Profile>, template_id: impl Into<String>, today: NaiveDate) -> Self {
        let sender = profile.map(SenderInfo::from_profile).unwrap_or_default();
        let due = today + Duration::days(PAYMENT_TERM_DAYS);

        InvoiceDraft {
            sender,
            recipient: RecipientInfo::default(),
            invoice_number: random_invoice_number(),
            issue_date: today.format(DATE_FORMAT).to_string(),
            due_date: due.format(DATE_FORMAT).to_string(),
            template_id: template_id.into(),
            notes: String::new(),
            items: vec![LineItem::empty()],
            tax_rate: 0.0,
            discount_rate: 0.0,
        }
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn add_item(&mut self) -> LineItemId {
        let item = LineItem::empty();
        let id = item.id.clone();
        self.items.push(item);
        id
    }

    /// Añade una línea ya rellena.
    pub fn push_item(&mut self, item: LineItem) -> LineItemId {
        let id = item.id.clone();
        self.items.push(item);
        id
    }

    /// `false` si la línea no existe o es la única que queda.
    pub fn remove_item(&mut self, id: &LineItemId) -> bool {
        if self.items.len() <= 1 {
            return false;
        }
        match self.items.iter().position(|item| &item.id == id) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn update_item(
        &mut self,
        id: &LineItemId,
        field: ItemField,
        value: &str,
    ) -> InvoiceResult<FieldUpdate> {
        let item = self
            .items
            .iter_mut()
            .find(|item| &item.id == id)
            .ok_or_else(|| InvoiceError::ItemNotFound(id.to_string()))?;

        let numeric = match field {
            ItemField::Description => {
                item.description = value.to_string();
                None
            }
            ItemField::Quantity => {
                let parsed = NumericInput::parse(value);
                item.quantity = parsed.value;
                Some(parsed)
            }
            ItemField::Rate => {
                let parsed = NumericInput::parse(value);
                item.rate = parsed.value;
                Some(parsed)
            }
        };

        Ok(FieldUpdate { field, numeric })
    }

    pub fn set_tax_rate(&mut self, input: &str) -> NumericInput {
        let parsed = NumericInput::parse(input);
        self.tax_rate = parsed.value;
        parsed
    }

    pub fn set_discount_rate(&mut self, input: &str) -> NumericInput {
        let parsed = NumericInput::parse(input);
        self.discount_rate = parsed.value;
        parsed
    }

    /// Valida y fija el logo del emisor; `None` o vacío lo quita.
    pub fn set_logo(&mut self, data_url: Option<&str>) -> InvoiceResult<()> {
        self.sender.logo = match data_url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) => Some(LogoImage::from_data_url(url)?),
            None => None,
        };
        Ok(())
    }

    pub fn select_client(&mut self, client: &Client) {
        self.recipient = RecipientInfo {
            client_id: Some(client.id.clone()),
            name: client.name.clone(),
            email: client.email.clone(),
            address: client.full_address(),
        };
    }

    /// Aplica un parche de cabecera. El logo se valida antes de tocar nada.
    pub fn apply_patch(&mut self, patch: DraftPatch) -> InvoiceResult<PatchOutcome> {
        if let Some(url) = patch.sender_logo.as_deref() {
            self.set_logo(Some(url))?;
        }
        if let Some(v) = patch.sender_name {
            self.sender.name = v;
        }
        if let Some(v) = patch.sender_email {
            self.sender.email = v;
        }
        if let Some(v) = patch.sender_phone {
            self.sender.phone = v;
        }
        if let Some(v) = patch.sender_address {
            self.sender.address = v;
        }

        // editar el nombre a mano desvincula el cliente guardado
        if let Some(v) = patch.client_name {
            if v != self.recipient.name {
                self.recipient.client_id = None;
            }
            self.recipient.name = v;
        }
        if let Some(v) = patch.client_email {
            self.recipient.email = v;
        }
        if let Some(v) = patch.client_address {
            self.recipient.address = v;
        }

        if let Some(v) = patch.invoice_number {
            self.invoice_number = v;
        }
        if let Some(v) = patch.issue_date {
            self.issue_date = v;
        }
        if let Some(v) = patch.due_date {
            self.due_date = v;
        }
        if let Some(v) = patch.template_id {
            self.template_id = v;
        }
        if let Some(v) = patch.notes {
            self.notes = v;
        }

        Ok(PatchOutcome {
            tax_rate: patch.tax_rate.as_deref().map(|v| self.set_tax_rate(v)),
            discount_rate: patch.discount_rate.as_deref().map(|v| self.set_discount_rate(v)),
        })
    }

    pub fn totals(&self) -> InvoiceTotals {
        InvoiceTotals::compute(&self.items, self.tax_rate, self.discount_rate)
    }

    /// Líneas con descripción, en orden. Son las que se guardan.
    pub fn described_items(&self) -> impl Iterator<Item = &LineItem> {
        self.items.iter().filter(|item| item.has_description())
    }

    pub fn validate_for_save(&self) -> InvoiceResult<()> {
        if !self.recipient.is_present() {
            return Err(InvoiceError::validation(MISSING_CLIENT));
        }
        if self.described_items().next().is_none() {
            return Err(InvoiceError::validation(MISSING_ITEMS));
        }
        Ok(())
    }

    /// Valida y convierte el borrador en filas para el almacén.
    pub fn to_new_invoice(
        &self,
        status: InvoiceStatus,
        currency: &str,
    ) -> InvoiceResult<(NewInvoice, Vec<NewInvoiceItem>)> {
        self.validate_for_save()?;
        let totals = self.totals();

        let invoice = NewInvoice {
            client_id: self.recipient.client_id.clone(),
            client_name: self.recipient.name.trim().to_string(),
            invoice_number: self.invoice_number.trim().to_string(),
            status,
            template_id: self.template_id.clone(),
            issue_date: self.issue_date.clone(),
            due_date: self.due_date.clone(),
            subtotal: totals.subtotal,
            tax_rate: self.tax_rate,
            tax_amount: totals.tax_amount,
            discount_rate: self.discount_rate,
            discount_amount: totals.discount_amount,
            total: totals.total,
            currency: currency.to_string(),
            notes: Some(self.notes.trim())
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            sent_at: (status == InvoiceStatus::Sent).then(chrono::Utc::now),
        };

        let items = self
            .described_items()
            .enumerate()
            .map(|(index, item)| NewInvoiceItem {
                description: item.description.clone(),
                quantity: item.quantity,
                rate: item.rate,
                amount: item.amount(),
                sort_order: index as i64,
            })
            .collect();

        Ok((invoice, items))
    }
}

fn random_invoice_number() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1000);
    format!("INV-{:03}", n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> InvoiceDraft {
        InvoiceDraft::dated(None, "minimal", NaiveDate::from_ymd_opt(2026, 1, 2).unwrap())
    }

    #[test]
    fn new_draft_has_one_empty_row_and_default_dates() {
        let d = draft();
        assert_eq!(d.items().len(), 1);
        assert_eq!(d.issue_date, "2026-01-02");
        assert_eq!(d.due_date, "2026-01-16");
        assert_eq!(d.sender.name, DEFAULT_SENDER_NAME);
        assert!(d.invoice_number.starts_with("INV-"));
        assert_eq!(d.invoice_number.len(), 7);
    }

    #[test]
    fn sender_is_prefilled_from_profile() {
        let profile = Profile {
            email: "owner@acme.test".into(),
            company_name: Some("Acme Ltd".into()),
            company_city: Some("Lisbon".into()),
            ..Default::default()
        };
        let d = InvoiceDraft::new(Some(&profile), "corporate");
        assert_eq!(d.sender.name, "Acme Ltd");
        assert_eq!(d.sender.email, "owner@acme.test");
        assert_eq!(d.sender.phone, DEFAULT_SENDER_PHONE);
        assert_eq!(d.sender.address, "Lisbon");
    }

    #[test]
    fn two_rows_produce_expected_subtotal() {
        let mut d = draft();
        let first = d.items()[0].id.clone();
        d.update_item(&first, ItemField::Quantity, "2").unwrap();
        d.update_item(&first, ItemField::Rate, "100").unwrap();

        let second = d.add_item();
        d.update_item(&second, ItemField::Quantity, "1").unwrap();
        d.update_item(&second, ItemField::Rate, "50").unwrap();

        assert_eq!(d.totals().subtotal, 250.0);

        d.set_tax_rate("10");
        d.set_discount_rate("5");
        let totals = d.totals();
        assert_eq!(totals.tax_amount, 25.0);
        assert_eq!(totals.discount_amount, 12.5);
        assert_eq!(totals.total, 262.5);
    }

    #[test]
    fn removing_the_last_row_is_rejected() {
        let mut d = draft();
        let only = d.items()[0].id.clone();
        assert!(!d.remove_item(&only));
        assert_eq!(d.items().len(), 1);

        let extra = d.add_item();
        assert!(d.remove_item(&only));
        assert_eq!(d.items().len(), 1);
        assert_eq!(d.items()[0].id, extra);
        assert!(!d.remove_item(&LineItemId::from("missing")));
    }

    #[test]
    fn empty_numeric_input_coerces_to_zero() {
        let mut d = draft();
        let id = d.items()[0].id.clone();
        d.update_item(&id, ItemField::Rate, "40").unwrap();

        let update = d.update_item(&id, ItemField::Rate, "").unwrap();
        assert!(update.was_coerced());
        assert_eq!(d.items()[0].rate, 0.0);

        let update = d.update_item(&id, ItemField::Quantity, "lots").unwrap();
        assert_eq!(update.numeric.unwrap().coercion, crate::models::Coercion::Invalid);
    }

    #[test]
    fn oversized_numbers_are_clamped_and_totals_stay_finite() {
        let mut d = draft();
        let id = d.items()[0].id.clone();
        let quantity = d.update_item(&id, ItemField::Quantity, "1e200").unwrap();
        let rate = d.update_item(&id, ItemField::Rate, "1e200").unwrap();
        assert_eq!(quantity.numeric.unwrap().coercion, crate::models::Coercion::Clamped);
        assert_eq!(rate.numeric.unwrap().coercion, crate::models::Coercion::Clamped);

        d.set_tax_rate("10");
        d.set_discount_rate("5");
        let totals = d.totals();
        assert_eq!(totals.subtotal, 1e18);
        assert!(totals.tax_amount.is_finite());
        assert!(totals.total.is_finite());
    }

    #[test]
    fn logo_can_be_set_and_cleared() {
        let mut d = draft();
        d.set_logo(Some("data:image/png;base64,iVBORw0KGgo=")).unwrap();
        assert!(d.sender.logo.is_some());

        d.apply_patch(DraftPatch { sender_logo: Some("".into()), ..Default::default() })
            .unwrap();
        assert!(d.sender.logo.is_none());
    }

    #[test]
    fn unknown_item_is_an_error() {
        let mut d = draft();
        let err = d
            .update_item(&LineItemId::from("nope"), ItemField::Description, "x")
            .unwrap_err();
        assert_eq!(err, InvoiceError::ItemNotFound("nope".into()));
    }

    #[test]
    fn selecting_a_client_fills_the_recipient() {
        let mut d = draft();
        let mut client = Client::new("c-9", "Globex", "ap@globex.test");
        client.city = Some("Springfield".into());
        d.select_client(&client);

        assert_eq!(d.recipient.client_id.as_deref(), Some("c-9"));
        assert_eq!(d.recipient.address, "Springfield");

        d.apply_patch(DraftPatch { client_name: Some("Someone else".into()), ..Default::default() })
            .unwrap();
        assert_eq!(d.recipient.client_id, None);
    }

    #[test]
    fn patch_with_bad_logo_changes_nothing() {
        let mut d = draft();
        let before = d.clone();
        let err = d
            .apply_patch(DraftPatch {
                notes: Some("changed".into()),
                sender_logo: Some("data:text/plain;base64,aGk=".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, InvoiceError::InvalidLogo(_)));
        assert_eq!(d, before);
    }

    #[test]
    fn patch_reports_rate_coercion() {
        let mut d = draft();
        let outcome = d
            .apply_patch(DraftPatch { tax_rate: Some("-3".into()), ..Default::default() })
            .unwrap();
        assert!(outcome.was_coerced());
        assert_eq!(d.tax_rate, 0.0);
    }

    #[test]
    fn save_validation_messages() {
        let mut d = draft();
        assert_eq!(
            d.validate_for_save().unwrap_err().user_message(),
            MISSING_CLIENT
        );

        d.recipient.name = "Walk-in".into();
        assert_eq!(d.validate_for_save().unwrap_err().user_message(), MISSING_ITEMS);

        let id = d.items()[0].id.clone();
        d.update_item(&id, ItemField::Description, "Audit").unwrap();
        assert!(d.validate_for_save().is_ok());
    }

    #[test]
    fn saved_rows_skip_blank_descriptions() {
        let mut d = draft();
        d.recipient.name = "Walk-in".into();
        d.push_item(LineItem::new("First", 1.0, 10.0));
        d.push_item(LineItem::new("  ", 3.0, 10.0));
        d.push_item(LineItem::new("Second", 2.0, 5.0));

        let (invoice, items) = d.to_new_invoice(InvoiceStatus::Sent, "USD").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].description, "Second");
        assert_eq!(items[1].sort_order, 1);
        assert!(invoice.sent_at.is_some());
        // el total incluye todas las líneas del borrador
        assert_eq!(invoice.subtotal, 50.0);
    }
}
