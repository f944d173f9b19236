use serde::{Deserialize, Serialize};

/// Tabla genérica para la API de dibujo: encabezados, filas, anchos (mm) y alineación.
#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub column_widths: Option<Vec<f32>>,
    pub alignment: Option<Vec<ColumnAlign>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnAlign {
    Left,
    Center,
    Right,
}

impl TableData {
    pub fn new(headers: Vec<String>) -> Self {
        TableData {
            headers,
            rows: Vec::new(),
            column_widths: None,
            alignment: None,
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn with_column_widths(mut self, widths: Vec<f32>) -> Self {
        self.column_widths = Some(widths);
        self
    }

    pub fn with_alignment(mut self, alignment: Vec<ColumnAlign>) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn column_align(&self, col: usize) -> ColumnAlign {
        self.alignment
            .as_ref()
            .and_then(|a| a.get(col).copied())
            .unwrap_or(ColumnAlign::Left)
    }

    /// Anchos por columna; sin anchos explícitos se reparte `total` en partes iguales.
    pub fn resolved_widths(&self, total: f32) -> Vec<f32> {
        match &self.column_widths {
            Some(widths) if widths.len() == self.headers.len() => widths.clone(),
            _ => {
                let n = self.headers.len().max(1) as f32;
                vec![total / n; self.headers.len()]
            }
        }
    }
}

/// Color RGB de 8 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const INK: Rgb = Rgb::new(30, 30, 30);
    pub const BODY: Rgb = Rgb::new(50, 50, 50);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// Convierte `#RRGGBB` (con o sin `#`). Cualquier otra cosa se vuelve negro.
    pub fn from_hex(hex: &str) -> Self {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return Rgb::BLACK;
        }

        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
        match (channel(0..2), channel(2..4), channel(4..6)) {
            (Some(r), Some(g), Some(b)) => Rgb::new(r, g, b),
            _ => Rgb::BLACK,
        }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Componentes normalizados 0.0..=1.0
    pub fn unit(&self) -> (f32, f32, f32) {
        (
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        )
    }
}
