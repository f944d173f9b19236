use serde::Serialize;

use crate::core::{ColumnAlign, InvoiceError, InvoiceResult, Margin, PdfConfig, Rgb, TableData};
use crate::templates::Typeface;

/// 1 pt en mm.
pub const PT_TO_MM: f32 = 0.352_778;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FontWeight {
    Regular,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

impl From<ColumnAlign> for TextAlign {
    fn from(align: ColumnAlign) -> Self {
        match align {
            ColumnAlign::Left => TextAlign::Left,
            ColumnAlign::Center => TextAlign::Center,
            ColumnAlign::Right => TextAlign::Right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FontSpec {
    pub typeface: Typeface,
    /// Tamaño en pt.
    pub size: f32,
    pub weight: FontWeight,
}

impl FontSpec {
    pub fn new(typeface: Typeface, size: f32, weight: FontWeight) -> Self {
        FontSpec { typeface, size, weight }
    }

    pub fn sized(self, size: f32) -> Self {
        FontSpec { size, ..self }
    }

    pub fn bold(self) -> Self {
        FontSpec { weight: FontWeight::Bold, ..self }
    }

    pub fn regular(self) -> Self {
        FontSpec { weight: FontWeight::Regular, ..self }
    }
}

impl Default for FontSpec {
    fn default() -> Self {
        FontSpec::new(Typeface::Sans, 10.0, FontWeight::Regular)
    }
}

/// Estilo de una tabla paginada.
#[derive(Debug, Clone, PartialEq)]
pub struct TableStyle {
    pub width: f32,
    pub font_size: f32,
    pub row_height: f32,
    pub padding: f32,
    pub header_fill: Option<Rgb>,
    pub header_text: Rgb,
    pub body_text: Rgb,
    pub stripe: Option<Rgb>,
    pub rule: Option<Rgb>,
}

impl Default for TableStyle {
    fn default() -> Self {
        TableStyle {
            width: 170.0,
            font_size: 9.0,
            row_height: 8.0,
            padding: 2.0,
            header_fill: None,
            header_text: Rgb::INK,
            body_text: Rgb::BODY,
            stripe: None,
            rule: Some(Rgb::new(220, 220, 220)),
        }
    }
}

/// Lo que se repinta al abrir cada página.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PageDecoration {
    pub background: Option<Rgb>,
    /// Color y ancho en mm de la franja del borde izquierdo.
    pub side_stripe: Option<(Rgb, f32)>,
}

/// Ancho aproximado de `text` en mm con las métricas de las fuentes base PDF.
pub fn measure(text: &str, font: FontSpec) -> f32 {
    let em: f32 = match font.typeface {
        Typeface::Mono => text.chars().count() as f32 * 0.6,
        Typeface::Sans | Typeface::Serif => text.chars().map(glyph_width).sum(),
    };
    let family = match font.typeface {
        Typeface::Serif => 0.92,
        _ => 1.0,
    };
    let weight = match (font.weight, font.typeface) {
        (_, Typeface::Mono) | (FontWeight::Regular, _) => 1.0,
        (FontWeight::Bold, _) => 1.06,
    };
    em * family * weight * font.size * PT_TO_MM
}

// Anchos de Helvetica en em
fn glyph_width(c: char) -> f32 {
    match c {
        ' ' | '.' | ',' | ':' | ';' | '!' | '\'' | '|' | 'i' | 'j' | 'l' => 0.278,
        'f' | 't' | 'I' | '/' | '(' | ')' | '[' | ']' => 0.3,
        '-' | 'r' => 0.333,
        '0'..='9' | '$' | '#' | '_' => 0.556,
        '%' => 0.889,
        'm' | 'M' => 0.833,
        'w' => 0.722,
        'W' => 0.944,
        '@' => 1.015,
        c if c.is_ascii_uppercase() => 0.667,
        c if c.is_ascii_lowercase() => 0.52,
        _ => 0.6,
    }
}

/// API de dibujo en mm con origen arriba a la izquierda; `y` es la línea base del texto.
pub trait DrawingSurface {
    /// (ancho, alto) en mm.
    fn page_size(&self) -> (f32, f32);

    fn margin(&self) -> Margin;

    fn page_count(&self) -> usize;

    fn new_page(&mut self) -> InvoiceResult<()>;

    /// Decoración para la página actual y las siguientes.
    fn set_page_decoration(&mut self, decoration: PageDecoration) -> InvoiceResult<()>;

    fn set_font(&mut self, font: FontSpec);

    fn font(&self) -> FontSpec;

    fn set_text_color(&mut self, color: Rgb);

    fn set_draw_color(&mut self, color: Rgb);

    fn set_fill_color(&mut self, color: Rgb);

    /// Grosor de línea en mm.
    fn set_line_width(&mut self, width: f32);

    /// Texto anclado por la izquierda.
    fn place_text(&mut self, text: &str, x: f32, y: f32) -> InvoiceResult<()>;

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> InvoiceResult<()>;

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> InvoiceResult<()>;

    /// Bytes del documento terminado.
    fn finish(&mut self) -> InvoiceResult<Vec<u8>>;

    fn text_width(&self, text: &str) -> f32 {
        measure(text, self.font())
    }

    fn text(&mut self, text: &str, x: f32, y: f32, align: TextAlign) -> InvoiceResult<()> {
        let left = match align {
            TextAlign::Left => x,
            TextAlign::Center => x - self.text_width(text) / 2.0,
            TextAlign::Right => x - self.text_width(text),
        };
        self.place_text(text, left, y)
    }

    /// Y desde la que una página nueva empieza a dibujar.
    fn content_top(&self) -> f32 {
        self.margin().top
    }

    /// Y máxima antes de saltar de página.
    fn content_bottom(&self) -> f32 {
        self.page_size().1 - self.margin().bottom
    }

    /// Salta de página si no caben `height` mm a partir de `y`. Devuelve la y efectiva.
    fn ensure_space(&mut self, y: f32, height: f32) -> InvoiceResult<f32> {
        if y + height > self.content_bottom() {
            self.new_page()?;
            Ok(self.content_top())
        } else {
            Ok(y)
        }
    }

    /// Párrafo con ajuste de línea por palabras. Devuelve la y tras la última línea.
    fn paragraph(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        max_width: f32,
        line_height: f32,
    ) -> InvoiceResult<f32> {
        let mut y = y;
        for line in wrap_lines(text, max_width, self.font()) {
            y = self.ensure_space(y, line_height)?;
            self.place_text(&line, x, y)?;
            y += line_height;
        }
        Ok(y)
    }

    /// Tabla con cabecera y filas; pagina y repite la cabecera. Devuelve la y final.
    fn table(&mut self, table: &TableData, x: f32, y: f32, style: &TableStyle) -> InvoiceResult<f32> {
        if table.headers.is_empty() {
            return Err(InvoiceError::drawing("table without columns"));
        }

        let widths = table.resolved_widths(style.width);
        let base = self.font();

        let body_font = base.sized(style.font_size).regular();
        let mut y = self.ensure_space(y, style.row_height * 2.0)?;
        y = draw_table_header(self, table, &widths, x, y, style, base)?;

        for (index, row) in table.rows.iter().enumerate() {
            let cells = wrap_cells(row, &widths, style, body_font);
            let height = row_height(style, &cells);

            if y + height > self.content_bottom() {
                self.new_page()?;
                let top = self.content_top();
                y = draw_table_header(self, table, &widths, x, top, style, base)?;
            }

            if let (Some(stripe), true) = (style.stripe, index % 2 == 1) {
                self.set_fill_color(stripe);
                self.fill_rect(x, y, style.width, height)?;
            }

            self.set_font(body_font);
            self.set_text_color(style.body_text);
            draw_table_cells(self, table, &cells, &widths, x, y, style)?;

            if let Some(rule) = style.rule {
                self.set_draw_color(rule);
                self.set_line_width(0.1);
                self.line(x, y + height, x + style.width, y + height)?;
            }

            y += height;
        }

        self.set_font(base);
        Ok(y)
    }
}

fn draw_table_header<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    table: &TableData,
    widths: &[f32],
    x: f32,
    y: f32,
    style: &TableStyle,
    base: FontSpec,
) -> InvoiceResult<f32> {
    let font = base.sized(style.font_size).bold();
    let cells = wrap_cells(&table.headers, widths, style, font);
    let height = row_height(style, &cells);

    if let Some(fill) = style.header_fill {
        surface.set_fill_color(fill);
        surface.fill_rect(x, y, style.width, height)?;
    }
    surface.set_font(font);
    surface.set_text_color(style.header_text);
    draw_table_cells(surface, table, &cells, widths, x, y, style)?;
    Ok(y + height)
}

fn wrap_cells(cells: &[String], widths: &[f32], style: &TableStyle, font: FontSpec) -> Vec<Vec<String>> {
    widths
        .iter()
        .enumerate()
        .map(|(col, width)| {
            let cell = cells.get(col).map(String::as_str).unwrap_or("");
            wrap_lines(cell, width - style.padding * 2.0, font)
        })
        .collect()
}

/// Distancia entre líneas de una misma celda.
fn cell_line_step(style: &TableStyle) -> f32 {
    style.font_size * PT_TO_MM * 1.25
}

/// Alto de una fila: la celda con más líneas manda.
fn row_height(style: &TableStyle, cells: &[Vec<String>]) -> f32 {
    let lines = cells.iter().map(|lines| lines.len().max(1)).max().unwrap_or(1);
    style.row_height + (lines - 1) as f32 * cell_line_step(style)
}

fn draw_table_cells<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    table: &TableData,
    cells: &[Vec<String>],
    widths: &[f32],
    x: f32,
    y: f32,
    style: &TableStyle,
) -> InvoiceResult<()> {
    let first_baseline = y + style.row_height * 0.65;
    let step = cell_line_step(style);
    let mut left = x;

    for (col, width) in widths.iter().enumerate() {
        let align = table.column_align(col);
        let anchor = match align {
            ColumnAlign::Left => left + style.padding,
            ColumnAlign::Center => left + width / 2.0,
            ColumnAlign::Right => left + width - style.padding,
        };
        let lines = cells.get(col).map(Vec::as_slice).unwrap_or(&[]);
        for (n, line) in lines.iter().enumerate() {
            surface.text(line, anchor, first_baseline + n as f32 * step, align.into())?;
        }
        left += width;
    }
    Ok(())
}

/// Parte `text` en líneas que caben en `max_width`. Respeta los saltos de línea
/// y corta por caracteres las palabras que no caben solas.
pub fn wrap_lines(text: &str, max_width: f32, font: FontSpec) -> Vec<String> {
    let mut lines = Vec::new();
    for raw in text.lines() {
        let mut current = String::new();
        for word in raw.split_whitespace() {
            for piece in break_word(word, max_width, font) {
                let candidate = if current.is_empty() {
                    piece.clone()
                } else {
                    format!("{} {}", current, piece)
                };
                if measure(&candidate, font) > max_width && !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                    current = piece;
                } else {
                    current = candidate;
                }
            }
        }
        lines.push(current);
    }
    lines
}

fn break_word(word: &str, max_width: f32, font: FontSpec) -> Vec<String> {
    if measure(word, font) <= max_width {
        return vec![word.to_string()];
    }
    let mut pieces = Vec::new();
    let mut current = String::new();
    for c in word.chars() {
        current.push(c);
        if measure(&current, font) > max_width && current.chars().count() > 1 {
            current.pop();
            pieces.push(std::mem::take(&mut current));
            current.push(c);
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Operación registrada por `RecordingSurface`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    Page { number: usize },
    Background { page: usize, color: String },
    Text { page: usize, text: String, x: f32, y: f32, font: FontSpec, color: String },
    Line { page: usize, x1: f32, y1: f32, x2: f32, y2: f32, color: String, width: f32 },
    Rect { page: usize, x: f32, y: f32, width: f32, height: f32, color: String },
}

/// Superficie en memoria: guarda cada operación en vez de producir un PDF.
#[derive(Debug)]
pub struct RecordingSurface {
    config: PdfConfig,
    ops: Vec<DrawOp>,
    page: usize,
    font: FontSpec,
    text_color: Rgb,
    draw_color: Rgb,
    fill_color: Rgb,
    line_width: f32,
    decoration: PageDecoration,
    fail_on: Option<String>,
}

impl RecordingSurface {
    pub fn new(config: PdfConfig) -> Self {
        RecordingSurface {
            config,
            ops: vec![DrawOp::Page { number: 1 }],
            page: 1,
            font: FontSpec::default(),
            text_color: Rgb::BLACK,
            draw_color: Rgb::BLACK,
            fill_color: Rgb::BLACK,
            line_width: 0.2,
            decoration: PageDecoration::default(),
            fail_on: None,
        }
    }

    /// Falla con un error de dibujo al colocar un texto que contenga `needle`.
    pub fn failing_on(config: PdfConfig, needle: impl Into<String>) -> Self {
        RecordingSurface { fail_on: Some(needle.into()), ..Self::new(config) }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.texts().iter().any(|t| *t == needle)
    }

    fn paint_decoration(&mut self) {
        if let Some(color) = self.decoration.background {
            self.ops.push(DrawOp::Background { page: self.page, color: color.to_hex() });
        }
        if let Some((color, width)) = self.decoration.side_stripe {
            let height = self.config.page_dimensions().1;
            self.ops.push(DrawOp::Rect {
                page: self.page,
                x: 0.0,
                y: 0.0,
                width,
                height,
                color: color.to_hex(),
            });
        }
    }
}

impl DrawingSurface for RecordingSurface {
    fn page_size(&self) -> (f32, f32) {
        self.config.page_dimensions()
    }

    fn margin(&self) -> Margin {
        self.config.margin
    }

    fn page_count(&self) -> usize {
        self.page
    }

    fn new_page(&mut self) -> InvoiceResult<()> {
        self.page += 1;
        self.ops.push(DrawOp::Page { number: self.page });
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
        if let Some(needle) = &self.fail_on {
            if text.contains(needle.as_str()) {
                return Err(InvoiceError::drawing(format!("cannot place {:?}", text)));
            }
        }
        self.ops.push(DrawOp::Text {
            page: self.page,
            text: text.to_string(),
            x,
            y,
            font: self.font,
            color: self.text_color.to_hex(),
        });
        Ok(())
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> InvoiceResult<()> {
        self.ops.push(DrawOp::Line {
            page: self.page,
            x1,
            y1,
            x2,
            y2,
            color: self.draw_color.to_hex(),
            width: self.line_width,
        });
        Ok(())
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> InvoiceResult<()> {
        self.ops.push(DrawOp::Rect {
            page: self.page,
            x,
            y,
            width,
            height,
            color: self.fill_color.to_hex(),
        });
        Ok(())
    }

    fn finish(&mut self) -> InvoiceResult<Vec<u8>> {
        serde_json::to_vec(&self.ops).map_err(|e| InvoiceError::drawing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> RecordingSurface {
        RecordingSurface::new(PdfConfig::default())
    }

    #[test]
    fn right_aligned_text_ends_at_anchor() {
        let mut s = surface();
        s.text("$262.50", 190.0, 50.0, TextAlign::Right).unwrap();
        match &s.ops()[1] {
            DrawOp::Text { x, .. } => {
                let width = measure("$262.50", FontSpec::default());
                assert!((x + width - 190.0).abs() < 1e-3);
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn wide_glyphs_measure_wider() {
        let font = FontSpec::default();
        assert!(measure("WWW", font) > measure("iii", font));
        assert!(measure("abc", font.bold()) > measure("abc", font));
        assert_eq!(measure("", font), 0.0);
    }

    #[test]
    fn wrap_respects_width_and_newlines() {
        let font = FontSpec::default();
        let lines = wrap_lines("one two three four five six seven eight\nnine", 30.0, font);
        assert!(lines.len() > 2);
        assert_eq!(lines.last().map(String::as_str), Some("nine"));
        for line in &lines {
            assert!(measure(line, font) <= 30.0 || !line.contains(' '));
        }
    }

    #[test]
    fn long_words_are_split_not_truncated() {
        let font = FontSpec::default();
        let word = "x".repeat(200);
        let lines = wrap_lines(&word, 40.0, font);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), word);
        for line in &lines {
            assert!(measure(line, font) <= 40.0);
        }
        assert_eq!(wrap_lines("short", 40.0, font), vec!["short".to_string()]);
    }

    #[test]
    fn wrapped_cells_grow_the_row() {
        let mut s = surface();
        let mut table = TableData::new(vec!["Description".into(), "Amount".into()])
            .with_alignment(vec![ColumnAlign::Left, ColumnAlign::Right]);
        table.add_row(vec!["word ".repeat(60), "$1.00".into()]);
        table.add_row(vec!["Next".into(), "$2.00".into()]);

        let style = TableStyle::default();
        let end = s.table(&table, 20.0, 60.0, &style).unwrap();
        assert!(end > 60.0 + style.row_height * 3.0);
        assert!(s.texts().iter().all(|t| !t.ends_with("...")));
        assert!(s.contains_text("Next"));
    }

    #[test]
    fn decoration_is_repainted_on_new_pages() {
        let mut s = surface();
        s.set_page_decoration(PageDecoration {
            background: Some(Rgb::BLACK),
            side_stripe: Some((Rgb::WHITE, 6.0)),
        })
        .unwrap();
        s.new_page().unwrap();

        for page in 1..=2 {
            assert!(s.ops().iter().any(|op| matches!(op, DrawOp::Background { page: p, .. } if *p == page)));
            assert!(s.ops().iter().any(
                |op| matches!(op, DrawOp::Rect { page: p, x, width, .. } if *p == page && *x == 0.0 && *width == 6.0)
            ));
        }
    }

    #[test]
    fn table_paginates_and_repeats_header() {
        let mut s = surface();
        let mut table = TableData::new(vec!["Description".into(), "Amount".into()])
            .with_alignment(vec![ColumnAlign::Left, ColumnAlign::Right]);
        for i in 0..60 {
            table.add_row(vec![format!("Row {}", i), "$1.00".into()]);
        }

        let end = s.table(&table, 20.0, 100.0, &TableStyle::default()).unwrap();
        assert!(s.page_count() > 1);
        assert!(end <= s.content_bottom());
        let headers = s.texts().iter().filter(|t| **t == "Description").count();
        assert_eq!(headers, s.page_count());
        assert!(s.contains_text("Row 59"));
    }

    #[test]
    fn failing_surface_reports_drawing_error() {
        let mut s = RecordingSurface::failing_on(PdfConfig::default(), "boom");
        assert!(s.place_text("fine", 0.0, 0.0).is_ok());
        let err = s.place_text("boom", 0.0, 0.0).unwrap_err();
        assert!(matches!(err, InvoiceError::Drawing(_)));
    }
}
