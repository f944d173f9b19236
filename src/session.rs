use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::core::{InvoiceError, InvoiceResult};
use crate::metrics;
use crate::models::{
    Client, DraftPatch, FieldUpdate, Invoice, InvoiceDraft, InvoiceStatus, InvoiceTotals,
    ItemField, LineItemId, PatchOutcome,
};
use crate::storage::InvoiceStore;
use crate::templates::{TemplateCatalog, TemplateDescriptor};

/// Sesión de edición: dueña exclusiva de un borrador.
///
/// Guarda además el último error visible para el usuario y la bandera de
/// exportación en curso. Las mutaciones son síncronas; sólo `save` espera.
pub struct InvoiceEditor {
    draft: InvoiceDraft,
    error: Option<String>,
    exporting: Arc<AtomicBool>,
    catalog: Arc<TemplateCatalog>,
}

/// Libera la bandera de exportación al soltarse, también si la tarea entra en pánico.
#[derive(Debug)]
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Permiso para una exportación: copia del borrador más la bandera tomada.
#[derive(Debug)]
pub struct ExportTicket {
    draft: InvoiceDraft,
    _guard: BusyGuard,
}

impl ExportTicket {
    pub fn draft(&self) -> &InvoiceDraft {
        &self.draft
    }
}

impl InvoiceEditor {
    pub fn new(draft: InvoiceDraft, catalog: Arc<TemplateCatalog>) -> Self {
        InvoiceEditor {
            draft,
            error: None,
            exporting: Arc::new(AtomicBool::new(false)),
            catalog,
        }
    }

    pub fn draft(&self) -> &InvoiceDraft {
        &self.draft
    }

    pub fn totals(&self) -> InvoiceTotals {
        self.draft.totals()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Deja en la ranura de error el mensaje para el usuario.
    pub fn record_failure(&mut self, error: &InvoiceError) {
        self.error = Some(error.user_message());
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting.load(Ordering::Acquire)
    }

    pub fn add_item(&mut self) -> LineItemId {
        self.draft.add_item()
    }

    pub fn remove_item(&mut self, id: &LineItemId) -> bool {
        self.draft.remove_item(id)
    }

    pub fn update_item(
        &mut self,
        id: &LineItemId,
        field: ItemField,
        value: &str,
    ) -> InvoiceResult<FieldUpdate> {
        self.draft.update_item(id, field, value)
    }

    pub fn apply_patch(&mut self, patch: DraftPatch) -> InvoiceResult<PatchOutcome> {
        let outcome = self.draft.apply_patch(patch);
        if let Err(e) = &outcome {
            self.record_failure(e);
        }
        outcome
    }

    pub fn select_client(&mut self, client: &Client) {
        self.draft.select_client(client);
    }

    /// Cambia de plantilla. Un id desconocido cae en la primera del catálogo.
    pub fn select_template(&mut self, template_id: &str) -> &'static TemplateDescriptor {
        let template = self.catalog.resolve(template_id);
        self.draft.template_id = template.id.to_string();
        template
    }

    /// Toma la bandera de exportación y congela una copia del borrador.
    pub fn begin_export(&self) -> InvoiceResult<ExportTicket> {
        self.exporting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| InvoiceError::ExportInProgress)?;

        Ok(ExportTicket {
            draft: self.draft.clone(),
            _guard: BusyGuard(Arc::clone(&self.exporting)),
        })
    }

    /// Valida en local y persiste. Cualquier fallo queda en la ranura de error
    /// y el borrador no cambia.
    pub async fn save(
        &mut self,
        store: &dyn InvoiceStore,
        status: InvoiceStatus,
        currency: &str,
    ) -> InvoiceResult<Invoice> {
        let result = match self.draft.to_new_invoice(status, currency) {
            Ok((invoice, items)) => store.create_invoice(invoice, items).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(invoice) => {
                self.error = None;
                metrics::INVOICES_SAVED
                    .with_label_values(&[invoice.status.as_str()])
                    .inc();
                info!("Saved invoice {} ({})", invoice.invoice_number, invoice.status);
            }
            Err(e) => {
                warn!("Could not save draft {}: {}", self.draft.invoice_number, e);
                self.record_failure(e);
            }
        }

        result
    }
}
