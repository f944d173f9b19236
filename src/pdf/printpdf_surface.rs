use std::collections::HashMap;
use std::io::BufWriter;

use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Rect, Rgb as PdfRgb,
};

use super::surface::{DrawingSurface, FontSpec, FontWeight, PageDecoration, PT_TO_MM};
use crate::core::{InvoiceError, InvoiceResult, Margin, PdfConfig, Rgb};
use crate::templates::Typeface;

const LAYER: &str = "Layer 1";

/// `DrawingSurface` sobre printpdf. Convierte coordenadas arriba-izquierda a espacio PDF.
pub struct PrintPdfSurface {
    doc: Option<PdfDocumentReference>,
    layer: PdfLayerReference,
    fonts: HashMap<(Typeface, FontWeight), IndirectFontRef>,
    config: PdfConfig,
    pages: usize,
    font: FontSpec,
    text_color: Rgb,
    draw_color: Rgb,
    fill_color: Rgb,
    line_width: f32,
    decoration: PageDecoration,
}

impl PrintPdfSurface {
    pub fn new(title: &str, config: PdfConfig) -> InvoiceResult<Self> {
        let (width, height) = config.page_dimensions();
        let (doc, page, layer) = PdfDocument::new(title, Mm(width), Mm(height), LAYER);
        let layer = doc.get_page(page).get_layer(layer);

        let mut fonts = HashMap::new();
        for (key, builtin) in [
            ((Typeface::Sans, FontWeight::Regular), BuiltinFont::Helvetica),
            ((Typeface::Sans, FontWeight::Bold), BuiltinFont::HelveticaBold),
            ((Typeface::Serif, FontWeight::Regular), BuiltinFont::TimesRoman),
            ((Typeface::Serif, FontWeight::Bold), BuiltinFont::TimesBold),
            ((Typeface::Mono, FontWeight::Regular), BuiltinFont::Courier),
            ((Typeface::Mono, FontWeight::Bold), BuiltinFont::CourierBold),
        ] {
            let font = doc
                .add_builtin_font(builtin)
                .map_err(|e| InvoiceError::drawing(e.to_string()))?;
            fonts.insert(key, font);
        }

        Ok(PrintPdfSurface {
            doc: Some(doc),
            layer,
            fonts,
            config,
            pages: 1,
            font: FontSpec::default(),
            text_color: Rgb::BLACK,
            draw_color: Rgb::BLACK,
            fill_color: Rgb::BLACK,
            line_width: 0.2,
            decoration: PageDecoration::default(),
        })
    }

    fn pdf_y(&self, y: f32) -> Mm {
        Mm(self.config.page_dimensions().1 - y)
    }

    fn paint_decoration(&self) {
        let (width, height) = self.config.page_dimensions();
        if let Some(color) = self.decoration.background {
            self.layer.set_fill_color(pdf_color(color));
            self.layer.add_rect(Rect::new(Mm(0.0), Mm(0.0), Mm(width), Mm(height)));
        }
        if let Some((color, stripe)) = self.decoration.side_stripe {
            self.layer.set_fill_color(pdf_color(color));
            self.layer.add_rect(Rect::new(Mm(0.0), Mm(0.0), Mm(stripe), Mm(height)));
        }
    }
}

fn pdf_color(color: Rgb) -> Color {
    let (r, g, b) = color.unit();
    Color::Rgb(PdfRgb::new(r, g, b, None))
}

impl DrawingSurface for PrintPdfSurface {
    fn page_size(&self) -> (f32, f32) {
        self.config.page_dimensions()
    }

    fn margin(&self) -> Margin {
        self.config.margin
    }

    fn page_count(&self) -> usize {
        self.pages
    }

    fn new_page(&mut self) -> InvoiceResult<()> {
        let (width, height) = self.config.page_dimensions();
        let doc = self
            .doc
            .as_ref()
            .ok_or_else(|| InvoiceError::drawing("document already finished"))?;
        let (page, layer) = doc.add_page(Mm(width), Mm(height), LAYER);
        self.layer = doc.get_page(page).get_layer(layer);
        self.pages += 1;
        self.paint_decoration();
        Ok(())
    }

    fn set_page_decoration(&mut self, decoration: PageDecoration) -> InvoiceResult<()> {
        self.decoration = decoration;
        self.paint_decoration();
        Ok(())
    }

    fn set_font(&mut self, font: FontSpec) {
        self.font = font;
    }

    fn font(&self) -> FontSpec {
        self.font
    }

    fn set_text_color(&mut self, color: Rgb) {
        self.text_color = color;
    }

    fn set_draw_color(&mut self, color: Rgb) {
        self.draw_color = color;
    }

    fn set_fill_color(&mut self, color: Rgb) {
        self.fill_color = color;
    }

    fn set_line_width(&mut self, width: f32) {
        self.line_width = width;
    }

    fn place_text(&mut self, text: &str, x: f32, y: f32) -> InvoiceResult<()> {
        if text.is_empty() {
            return Ok(());
        }
        let font = self
            .fonts
            .get(&(self.font.typeface, self.font.weight))
            .ok_or_else(|| InvoiceError::drawing("font not loaded"))?;

        // el texto se pinta con el color de relleno
        self.layer.set_fill_color(pdf_color(self.text_color));
        self.layer.use_text(text, self.font.size, Mm(x), self.pdf_y(y), font);
        Ok(())
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> InvoiceResult<()> {
        self.layer.set_outline_color(pdf_color(self.draw_color));
        self.layer.set_outline_thickness(self.line_width / PT_TO_MM);
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(x1), self.pdf_y(y1)), false),
                (Point::new(Mm(x2), self.pdf_y(y2)), false),
            ],
            is_closed: false,
        });
        Ok(())
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> InvoiceResult<()> {
        self.layer.set_fill_color(pdf_color(self.fill_color));
        self.layer.add_rect(Rect::new(
            Mm(x),
            self.pdf_y(y + height),
            Mm(x + width),
            self.pdf_y(y),
        ));
        Ok(())
    }

    fn finish(&mut self) -> InvoiceResult<Vec<u8>> {
        let doc = self
            .doc
            .take()
            .ok_or_else(|| InvoiceError::drawing("document already finished"))?;

        let mut writer = BufWriter::new(Vec::<u8>::new());
        doc.save(&mut writer)
            .map_err(|e| InvoiceError::drawing(e.to_string()))?;
        writer
            .into_inner()
            .map_err(|e| InvoiceError::drawing(e.to_string()))
    }
}
