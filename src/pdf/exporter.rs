use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info};

use super::printpdf_surface::PrintPdfSurface;
use super::surface::{DrawingSurface, FontSpec, FontWeight, PageDecoration, TableStyle, TextAlign};
use crate::core::{ColumnAlign, InvoiceError, InvoiceResult, PdfConfig, Rgb, TableData};
use crate::metrics;
use crate::session::ExportTicket;
use crate::templates::{
    HeaderStyle, ItemsStyle, Layout, PartyView, Section, StyleTokens, TemplateEngine, Theme,
    TotalsAlign, InvoiceView,
};

/// Resultado de una exportación.
#[derive(Debug, Clone, Serialize)]
pub struct ExportedPdf {
    pub filename: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Anchos relativos de Description / Qty / Rate / Amount.
const COLUMN_WEIGHTS: [f32; 4] = [80.0, 25.0, 35.0, 35.0];

/// Y de la línea divisoria bajo la cabecera.
const HEADER_RULE_Y: f32 = 48.0;

/// Ancho en mm de la franja de las plantillas con barra lateral.
const SIDEBAR_WIDTH: f32 = 6.0;

struct Palette {
    primary: Rgb,
    text: Rgb,
    muted: Rgb,
    on_primary: Rgb,
}

impl Palette {
    fn new(view: &InvoiceView, style: &StyleTokens) -> Self {
        Palette {
            primary: Rgb::from_hex(&view.color),
            text: Rgb::from_hex(style.text_color()),
            muted: Rgb::from_hex(style.muted_color()),
            on_primary: Rgb::WHITE,
        }
    }
}

/// Intérprete PDF del mismo layout que usa la vista HTML.
pub struct PdfExporter {
    engine: Arc<TemplateEngine>,
    config: PdfConfig,
}

impl PdfExporter {
    pub fn new(engine: Arc<TemplateEngine>, config: PdfConfig) -> Self {
        Self { engine, config }
    }

    /// Dibuja la vista sobre cualquier superficie siguiendo el orden de secciones del layout.
    pub fn draw<S: DrawingSurface + ?Sized>(
        &self,
        view: &InvoiceView,
        layout: &Layout,
        surface: &mut S,
    ) -> InvoiceResult<()> {
        let style = &layout.style;
        let palette = Palette::new(view, style);
        let base = FontSpec::new(style.typeface, self.config.font_size, FontWeight::Regular);

        let background = style.page_background();
        surface.set_page_decoration(PageDecoration {
            background: (background != "#FFFFFF").then(|| Rgb::from_hex(background)),
            side_stripe: (style.header == HeaderStyle::Sidebar)
                .then_some((palette.primary, SIDEBAR_WIDTH)),
        })?;

        let mut y = surface.content_top();
        for section in layout.sections {
            y = match section {
                Section::Header => self.draw_header(view, style, &palette, base, surface)?,
                Section::Parties => self.draw_parties(view, &palette, base, y, surface)?,
                Section::Items => self.draw_items(view, style, &palette, base, y, surface)?,
                Section::Totals => self.draw_totals(view, style, &palette, base, y, surface)?,
                Section::Notes => self.draw_notes(view, &palette, base, y, surface)?,
                Section::Footer => self.draw_footer(view, &palette, base, y, surface)?,
            };
        }
        Ok(())
    }

    /// Renderiza a bytes PDF de forma síncrona.
    pub fn render(&self, view: &InvoiceView, layout: &Layout) -> InvoiceResult<ExportedPdf> {
        let title = format!("{} {}", view.title, view.invoice_number);
        let mut surface = PrintPdfSurface::new(&title, self.config.clone())?;
        self.draw(view, layout, &mut surface)?;
        let bytes = surface.finish()?;

        Ok(ExportedPdf {
            filename: view.pdf_filename(),
            bytes,
        })
    }

    /// Exporta la instantánea del ticket en el pool bloqueante.
    ///
    /// El ticket viaja con la tarea bloqueante: la bandera de exportación se libera
    /// cuando termina el render, falle o no, aunque se abandone este futuro.
    pub async fn export(self: Arc<Self>, ticket: ExportTicket) -> InvoiceResult<ExportedPdf> {
        let started = Instant::now();
        let (template, view) = self.engine.view(ticket.draft());
        let layout = template.layout;
        let invoice_number = view.invoice_number.clone();

        let exporter = Arc::clone(&self);
        let outcome = tokio::task::spawn_blocking(move || {
            let result = exporter.render(&view, &layout);
            drop(ticket);
            result
        })
        .await
        .map_err(|e| InvoiceError::Export(format!("export task failed: {}", e)))
        .and_then(|result| result);

        match &outcome {
            Ok(pdf) => {
                metrics::EXPORTS_TOTAL.with_label_values(&["success"]).inc();
                metrics::EXPORT_DURATION.observe(started.elapsed().as_secs_f64());
                info!(
                    "Exported {} with template {} ({} bytes) in {:?}",
                    pdf.filename,
                    template.id,
                    pdf.bytes.len(),
                    started.elapsed()
                );
            }
            Err(e) => {
                metrics::EXPORTS_TOTAL.with_label_values(&["error"]).inc();
                error!("Error generating PDF for {}: {}", invoice_number, e);
            }
        }

        outcome
    }

    fn draw_header<S: DrawingSurface + ?Sized>(
        &self,
        view: &InvoiceView,
        style: &StyleTokens,
        palette: &Palette,
        base: FontSpec,
        surface: &mut S,
    ) -> InvoiceResult<f32> {
        let (width, _) = surface.page_size();
        let margin = surface.margin();
        let left = margin.left;
        let right = width - margin.right;
        let number = format!("#{}", view.invoice_number);

        match style.header {
            HeaderStyle::Banner => {
                surface.set_fill_color(palette.primary);
                surface.fill_rect(0.0, 0.0, width, 42.0)?;

                surface.set_text_color(palette.on_primary);
                surface.set_font(base.sized(28.0).bold());
                surface.text(&view.title, left, 22.0, TextAlign::Left)?;
                surface.set_font(base.sized(10.0));
                surface.text(&number, left, 30.0, TextAlign::Left)?;
                draw_party(surface, &view.sender, right, 14.0, TextAlign::Right, palette.on_primary, palette.on_primary, base)?;
                return Ok(HEADER_RULE_Y);
            }
            HeaderStyle::Centered => {
                let center = width / 2.0;
                surface.set_text_color(palette.primary);
                surface.set_font(base.sized(24.0).bold());
                surface.text(&view.title, center, 22.0, TextAlign::Center)?;
                surface.set_text_color(palette.muted);
                surface.set_font(base.sized(10.0));
                surface.text(&number, center, 29.0, TextAlign::Center)?;
                surface.set_text_color(palette.text);
                surface.set_font(base.sized(11.0).bold());
                surface.text(&view.sender.name, center, 36.0, TextAlign::Center)?;
                surface.set_font(base.sized(9.0));
                surface.set_text_color(palette.muted);
                surface.text(&view.sender.detail_lines().join("  |  "), center, 42.0, TextAlign::Center)?;
            }
            HeaderStyle::SenderLeft | HeaderStyle::Sidebar => {
                draw_party(surface, &view.sender, left, 20.0, TextAlign::Left, palette.text, palette.muted, base)?;
                surface.set_text_color(palette.primary);
                surface.set_font(base.sized(28.0).bold());
                surface.text(&view.title, right, 30.0, TextAlign::Right)?;
                surface.set_text_color(palette.muted);
                surface.set_font(base.sized(10.0));
                surface.text(&number, right, 37.0, TextAlign::Right)?;
            }
            HeaderStyle::TitleLeft => {
                surface.set_text_color(palette.primary);
                surface.set_font(base.sized(28.0).bold());
                surface.text(&view.title, left, 30.0, TextAlign::Left)?;
                surface.set_text_color(palette.muted);
                surface.set_font(base.sized(10.0));
                surface.text(&number, left, 37.0, TextAlign::Left)?;
                draw_party(surface, &view.sender, right, 20.0, TextAlign::Right, palette.text, palette.muted, base)?;
            }
        }

        surface.set_draw_color(Rgb::new(200, 200, 200));
        surface.set_line_width(0.3);
        surface.line(left, HEADER_RULE_Y, right, HEADER_RULE_Y)?;
        Ok(HEADER_RULE_Y)
    }

    fn draw_parties<S: DrawingSurface + ?Sized>(
        &self,
        view: &InvoiceView,
        palette: &Palette,
        base: FontSpec,
        y: f32,
        surface: &mut S,
    ) -> InvoiceResult<f32> {
        let (width, _) = surface.page_size();
        let left = surface.margin().left;
        let dates_x = width - 60.0;
        let y = surface.ensure_space(y, 35.0)? + 12.0;

        surface.set_text_color(palette.primary);
        surface.set_font(base.sized(10.0).bold());
        surface.text(&view.recipient.label.to_uppercase(), left, y, TextAlign::Left)?;
        let end = draw_party(
            surface,
            &view.recipient,
            left,
            y + 7.0,
            TextAlign::Left,
            palette.text,
            palette.muted,
            base,
        )?;

        let mut date_y = y;
        for (label, value) in [
            (&view.issue_date_label, &view.issue_date),
            (&view.due_date_label, &view.due_date),
        ] {
            surface.set_text_color(palette.muted);
            surface.set_font(base.sized(9.0));
            surface.text(&format!("{}:", label), dates_x, date_y, TextAlign::Left)?;
            surface.set_text_color(palette.text);
            surface.set_font(base.sized(10.0).bold());
            surface.text(value, dates_x, date_y + 5.0, TextAlign::Left)?;
            date_y += 12.0;
        }

        Ok(end.max(date_y))
    }

    fn draw_items<S: DrawingSurface + ?Sized>(
        &self,
        view: &InvoiceView,
        style: &StyleTokens,
        palette: &Palette,
        base: FontSpec,
        y: f32,
        surface: &mut S,
    ) -> InvoiceResult<f32> {
        let content_width = self.config.content_width();
        let weight_sum: f32 = COLUMN_WEIGHTS.iter().sum();
        let widths = COLUMN_WEIGHTS
            .iter()
            .map(|w| w / weight_sum * content_width)
            .collect();

        let mut table = TableData::new(view.column_labels.to_vec())
            .with_column_widths(widths)
            .with_alignment(vec![
                ColumnAlign::Left,
                ColumnAlign::Right,
                ColumnAlign::Right,
                ColumnAlign::Right,
            ]);

        if view.rows.is_empty() {
            table.add_row(vec![view.empty_items_text.clone(), String::new(), String::new(), String::new()]);
        }
        for row in &view.rows {
            table.add_row(vec![
                row.description.clone(),
                row.quantity.clone(),
                row.rate.clone(),
                row.amount.clone(),
            ]);
        }

        let dark = style.theme == Theme::Dark;
        let (header_fill, header_text) = match style.items {
            ItemsStyle::Plain | ItemsStyle::List if !dark => (None, palette.primary),
            _ => (Some(palette.primary), palette.on_primary),
        };

        let table_style = TableStyle {
            width: content_width,
            font_size: self.config.font_size,
            header_fill,
            header_text,
            body_text: palette.text,
            stripe: (style.items == ItemsStyle::Striped).then(|| tint(palette.primary, 0.08)),
            rule: Some(if dark { Rgb::new(60, 60, 64) } else { Rgb::new(225, 225, 225) }),
            ..TableStyle::default()
        };

        surface.set_font(base);
        let left = surface.margin().left;
        surface.table(&table, left, y + 10.0, &table_style)
    }

    fn draw_totals<S: DrawingSurface + ?Sized>(
        &self,
        view: &InvoiceView,
        style: &StyleTokens,
        palette: &Palette,
        base: FontSpec,
        y: f32,
        surface: &mut S,
    ) -> InvoiceResult<f32> {
        let (width, _) = surface.page_size();
        let margin = surface.margin();
        let right = width - margin.right;
        let label_x = match style.totals_align {
            TotalsAlign::Right => width - 70.0,
            TotalsAlign::Center => width / 2.0 - 35.0,
            TotalsAlign::Full => margin.left,
        };
        let value_x = match style.totals_align {
            TotalsAlign::Center => width / 2.0 + 35.0,
            _ => right,
        };

        let lines = view.summary_lines();
        let needed = lines.len() as f32 * self.config.line_height + 20.0;
        let mut y = surface.ensure_space(y + 10.0, needed)?;

        surface.set_font(base.sized(10.0));
        for (label, amount) in lines {
            surface.set_text_color(palette.muted);
            surface.text(label, label_x, y, TextAlign::Left)?;
            surface.set_text_color(palette.text);
            surface.text(amount, value_x, y, TextAlign::Right)?;
            y += self.config.line_height;
        }

        surface.set_draw_color(palette.primary);
        surface.set_line_width(0.5);
        surface.line(label_x, y - 3.0, value_x, y - 3.0)?;

        y += 4.0;
        surface.set_font(base.sized(12.0).bold());
        surface.set_text_color(palette.text);
        surface.text(&view.total_label, label_x, y, TextAlign::Left)?;
        surface.set_text_color(palette.primary);
        surface.text(&view.total, value_x, y, TextAlign::Right)?;

        Ok(y + 4.0)
    }

    fn draw_notes<S: DrawingSurface + ?Sized>(
        &self,
        view: &InvoiceView,
        palette: &Palette,
        base: FontSpec,
        y: f32,
        surface: &mut S,
    ) -> InvoiceResult<f32> {
        let notes = match &view.notes {
            Some(notes) => notes,
            None => return Ok(y),
        };

        let left = surface.margin().left;
        let mut y = surface.ensure_space(y + 12.0, 15.0)?;

        surface.set_text_color(palette.primary);
        surface.set_font(base.sized(10.0).bold());
        surface.text(&view.notes_label.to_uppercase(), left, y, TextAlign::Left)?;
        y += 6.0;

        surface.set_text_color(palette.muted);
        surface.set_font(base.sized(9.0));
        surface.paragraph(notes, left, y, self.config.content_width(), 5.0)
    }

    fn draw_footer<S: DrawingSurface + ?Sized>(
        &self,
        view: &InvoiceView,
        palette: &Palette,
        base: FontSpec,
        y: f32,
        surface: &mut S,
    ) -> InvoiceResult<f32> {
        let (width, height) = surface.page_size();
        let footer_y = height - 17.0;
        if y > footer_y - 5.0 {
            surface.new_page()?;
        }

        surface.set_text_color(palette.muted);
        surface.set_font(base.sized(9.0));
        surface.text(&view.footer, width / 2.0, footer_y, TextAlign::Center)?;
        Ok(footer_y)
    }
}

/// Bloque de contacto: nombre en negrita y líneas de detalle. Devuelve la y siguiente.
#[allow(clippy::too_many_arguments)]
fn draw_party<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    party: &PartyView,
    x: f32,
    y: f32,
    align: TextAlign,
    name_color: Rgb,
    detail_color: Rgb,
    base: FontSpec,
) -> InvoiceResult<f32> {
    surface.set_text_color(name_color);
    surface.set_font(base.sized(11.0).bold());
    surface.text(&party.name, x, y, align)?;

    let mut y = y + 5.0;
    surface.set_text_color(detail_color);
    surface.set_font(base.sized(9.0));
    for line in party.detail_lines() {
        surface.text(line, x, y, align)?;
        y += 4.5;
    }
    Ok(y)
}

/// Mezcla `color` con blanco.
fn tint(color: Rgb, amount: f32) -> Rgb {
    let mix = |c: u8| (255.0 - (255.0 - c as f32) * amount).round() as u8;
    Rgb::new(mix(color.r), mix(color.g), mix(color.b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InvoiceDraft, LineItem};
    use crate::pdf::surface::{DrawOp, RecordingSurface};
    use crate::templates::{TemplateCatalog, TemplateCategory};
    use chrono::NaiveDate;

    fn engine() -> Arc<TemplateEngine> {
        Arc::new(TemplateEngine::new(Arc::new(TemplateCatalog::new()), "$").unwrap())
    }

    fn draft() -> InvoiceDraft {
        let mut draft =
            InvoiceDraft::dated(None, "minimal", NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
        draft.recipient.name = "Contoso Ltd".into();
        draft.invoice_number = "INV-042".into();
        draft.push_item(LineItem::new("Consulting", 2.0, 100.0));
        draft.push_item(LineItem::new("Hosting", 1.0, 50.0));
        draft.set_tax_rate("10");
        draft.set_discount_rate("5");
        draft.notes = "Thanks for the quick turnaround".into();
        draft
    }

    #[test]
    fn pdf_total_matches_preview_for_each_category() {
        let engine = engine();
        let exporter = PdfExporter::new(engine.clone(), PdfConfig::default());
        let catalog = TemplateCatalog::new();

        for category in TemplateCategory::ALL {
            let template = catalog.by_category(category)[0];
            let mut draft = draft();
            draft.template_id = template.id.to_string();

            let preview = engine.preview(&draft).unwrap();
            let mut surface = RecordingSurface::new(PdfConfig::default());
            exporter.draw(&preview.view, &template.layout, &mut surface).unwrap();

            assert!(preview.html.contains(&preview.view.total));
            assert!(surface.contains_text(&preview.view.total), "{}", template.id);
            assert!(surface.contains_text(&preview.view.subtotal), "{}", template.id);
            assert!(surface.contains_text("-$12.50"), "{}", template.id);
            assert!(surface.contains_text("Tax (10%)"), "{}", template.id);
        }
    }

    #[test]
    fn every_template_draws_every_field() {
        let engine = engine();
        let exporter = PdfExporter::new(engine.clone(), PdfConfig::default());
        let mut draft = draft();

        for template in TemplateCatalog::new().list() {
            draft.template_id = template.id.to_string();
            let (_, view) = engine.view(&draft);
            let mut surface = RecordingSurface::new(PdfConfig::default());
            exporter.draw(&view, &template.layout, &mut surface).unwrap();

            for needle in ["Contoso Ltd", "Jan 2, 2026", "Jan 16, 2026", "Consulting", "$262.50"] {
                assert!(surface.contains_text(needle), "{} missing {}", template.id, needle);
            }
            assert!(surface.contains_text(template.layout.style.footer));
        }
    }

    #[test]
    fn large_ledger_paginates() {
        let engine = engine();
        let exporter = PdfExporter::new(engine.clone(), PdfConfig::default());
        let mut draft = draft();
        for i in 0..80 {
            draft.push_item(LineItem::new(format!("Line {}", i), 1.0, 10.0));
        }

        let (template, view) = engine.view(&draft);
        let mut surface = RecordingSurface::new(PdfConfig::default());
        exporter.draw(&view, &template.layout, &mut surface).unwrap();

        assert!(surface.page_count() > 1);
        assert!(surface.contains_text("Line 79"));
        assert!(surface.contains_text(&view.total));
    }

    #[test]
    fn dark_templates_paint_background() {
        let engine = engine();
        let exporter = PdfExporter::new(engine.clone(), PdfConfig::default());
        let mut draft = draft();
        draft.template_id = "neon".into();

        let (template, view) = engine.view(&draft);
        let mut surface = RecordingSurface::new(PdfConfig::default());
        exporter.draw(&view, &template.layout, &mut surface).unwrap();

        assert!(surface
            .ops()
            .iter()
            .any(|op| matches!(op, DrawOp::Background { color, .. } if color == "#0F0F10")));
    }

    #[test]
    fn drawing_failure_is_reported() {
        let engine = engine();
        let exporter = PdfExporter::new(engine.clone(), PdfConfig::default());
        let (template, view) = engine.view(&draft());

        let mut surface = RecordingSurface::failing_on(PdfConfig::default(), "Consulting");
        let err = exporter.draw(&view, &template.layout, &mut surface).unwrap_err();
        assert_eq!(err.user_message(), "Error generating PDF. Please try again.");
    }

    #[test]
    fn render_produces_named_pdf() {
        let engine = engine();
        let exporter = PdfExporter::new(engine.clone(), PdfConfig::default());
        let (template, view) = engine.view(&draft());

        let pdf = exporter.render(&view, &template.layout).unwrap();
        assert_eq!(pdf.filename, "INV-042.pdf");
        assert!(pdf.bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn sidebar_stripe_is_on_every_page() {
        let engine = engine();
        let exporter = PdfExporter::new(engine.clone(), PdfConfig::default());
        let mut draft = draft();
        draft.template_id = "creative".into();
        for i in 0..80 {
            draft.push_item(LineItem::new(format!("Line {}", i), 1.0, 10.0));
        }

        let (template, view) = engine.view(&draft);
        assert_eq!(template.layout.style.header, HeaderStyle::Sidebar);
        let mut surface = RecordingSurface::new(PdfConfig::default());
        exporter.draw(&view, &template.layout, &mut surface).unwrap();

        assert!(surface.page_count() > 1);
        for page in 1..=surface.page_count() {
            assert!(
                surface.ops().iter().any(|op| matches!(
                    op,
                    DrawOp::Rect { page: p, x, width, .. } if *p == page && *x == 0.0 && *width == SIDEBAR_WIDTH
                )),
                "no stripe on page {}",
                page
            );
        }
    }

    #[test]
    fn long_cells_wrap_instead_of_truncating() {
        let engine = engine();
        let exporter = PdfExporter::new(engine.clone(), PdfConfig::default());
        let mut draft = draft();
        let description = "Quarterly retainer covering design reviews, accessibility audits and the \
                           migration of every legacy marketing page to the new component library";
        draft.push_item(LineItem::new(description, 1e9, 1e9));

        let (template, view) = engine.view(&draft);
        let amount = view.rows.last().map(|row| row.amount.clone()).unwrap();
        assert_eq!(amount, "$1,000,000,000,000,000,000.00");

        let mut surface = RecordingSurface::new(PdfConfig::default());
        exporter.draw(&view, &template.layout, &mut surface).unwrap();

        let texts = surface.texts();
        assert!(texts.iter().all(|t| !t.ends_with("...")));
        assert!(texts.concat().contains(&amount));
        assert!(texts.iter().any(|t| t.ends_with("library")));
    }

    #[tokio::test]
    async fn abandoned_export_keeps_the_flag_until_render_ends() {
        use crate::session::InvoiceEditor;
        use std::time::Duration;

        let engine = engine();
        let exporter = Arc::new(PdfExporter::new(engine, PdfConfig::default()));
        let mut draft = draft();
        for i in 0..20_000 {
            draft.push_item(LineItem::new(format!("Line {}", i), 1.0, 10.0));
        }
        let editor = InvoiceEditor::new(draft, Arc::new(TemplateCatalog::new()));
        let ticket = editor.begin_export().unwrap();

        // el futuro se abandona tras su primer poll, con el render ya en marcha
        tokio::select! {
            biased;
            _ = exporter.clone().export(ticket) => {}
            _ = async {} => {}
        }
        assert!(editor.is_exporting());

        let waited = tokio::time::timeout(Duration::from_secs(60), async {
            while editor.is_exporting() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(waited.is_ok());
        assert!(editor.begin_export().is_ok());
    }

    #[test]
    fn tint_moves_towards_white() {
        assert_eq!(tint(Rgb::BLACK, 0.0), Rgb::WHITE);
        assert_eq!(tint(Rgb::new(100, 50, 0), 1.0), Rgb::new(100, 50, 0));
    }
}
