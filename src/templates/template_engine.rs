use std::sync::Arc;

use crate::core::InvoiceResult;
use crate::models::InvoiceDraft;
use crate::templates::catalog::{TemplateCatalog, TemplateDescriptor};
use crate::templates::html::HtmlRenderer;
use crate::templates::view::InvoiceView;

/// Fachada de presentación: resuelve la plantilla, arma la vista y la renderiza.
pub struct TemplateEngine {
    catalog: Arc<TemplateCatalog>,
    html: HtmlRenderer,
    currency_symbol: String,
}

pub struct Preview {
    pub template: &'static TemplateDescriptor,
    pub view: InvoiceView,
    pub html: String,
}

impl TemplateEngine {
    pub fn new(catalog: Arc<TemplateCatalog>, currency_symbol: impl Into<String>) -> InvoiceResult<Self> {
        Ok(Self {
            catalog,
            html: HtmlRenderer::new()?,
            currency_symbol: currency_symbol.into(),
        })
    }

    /// Vista formateada del borrador con su plantilla (o la primera si no existe).
    pub fn view(&self, draft: &InvoiceDraft) -> (&'static TemplateDescriptor, InvoiceView) {
        let template = self.catalog.resolve(&draft.template_id);
        let view = InvoiceView::with_currency(draft, template, &self.currency_symbol);
        (template, view)
    }

    pub fn preview(&self, draft: &InvoiceDraft) -> InvoiceResult<Preview> {
        let (template, view) = self.view(draft);
        let html = self.html.render(&view, &template.layout)?;
        Ok(Preview { template, view, html })
    }
}
