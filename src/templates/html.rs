use minijinja::{context, Environment, Value};
use tracing::debug;

use super::helpers;
use super::layout::Layout;
use super::view::InvoiceView;
use crate::core::InvoiceResult;

const INVOICE_TEMPLATE: &str = "invoice.html";

/// Intérprete HTML del layout: una sola plantilla minijinja para las quince variantes.
pub struct HtmlRenderer {
    env: Environment<'static>,
}

impl HtmlRenderer {
    pub fn new() -> InvoiceResult<Self> {
        let mut env = Environment::new();

        // Registrar filtros
        env.add_filter("tint", helpers::tint_filter);
        env.add_filter("initials", helpers::initials_filter);

        env.add_template(INVOICE_TEMPLATE, include_str!("invoice.html"))?;

        Ok(HtmlRenderer { env })
    }

    pub fn render(&self, view: &InvoiceView, layout: &Layout) -> InvoiceResult<String> {
        let template = self.env.get_template(INVOICE_TEMPLATE)?;
        let style = &layout.style;

        let rendered = template.render(context! {
            view => view,
            layout => layout,
            font_stack => Value::from_safe_string(style.typeface.css_stack().to_string()),
            background => style.page_background(),
            text_color => style.text_color(),
            muted_color => style.muted_color(),
        })?;

        debug!(
            "Rendered {} preview for {} ({} bytes)",
            view.template_id,
            view.invoice_number,
            rendered.len()
        );
        Ok(rendered)
    }
}
