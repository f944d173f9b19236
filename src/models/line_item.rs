use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Tope de cantidad y tarifa. Con él `quantity * rate` y los totales siguen siendo finitos.
pub const MAX_NUMERIC_INPUT: f64 = 1e9;

/// Identificador único de una línea del borrador.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineItemId(pub String);

impl LineItemId {
    pub fn generate() -> Self {
        LineItemId(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for LineItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LineItemId {
    fn from(value: &str) -> Self {
        LineItemId(value.to_string())
    }
}

/// Una línea facturable. El importe nunca se almacena: siempre `quantity * rate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: LineItemId,
    pub description: String,
    pub quantity: f64,
    pub rate: f64,
}

impl LineItem {
    pub fn empty() -> Self {
        LineItem {
            id: LineItemId::generate(),
            description: String::new(),
            quantity: 0.0,
            rate: 0.0,
        }
    }

    pub fn new(description: impl Into<String>, quantity: f64, rate: f64) -> Self {
        LineItem {
            id: LineItemId::generate(),
            description: description.into(),
            quantity: sanitize(quantity),
            rate: sanitize(rate),
        }
    }

    pub fn amount(&self) -> f64 {
        self.quantity * self.rate
    }

    pub fn has_description(&self) -> bool {
        !self.description.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemField {
    Description,
    Quantity,
    Rate,
}

/// Cómo se interpretó una entrada numérica de texto libre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coercion {
    /// El texto se leyó tal cual (o con un sufijo ignorado, como `"12abc"`).
    Exact,
    /// Campo vacío, se tomó 0.
    Empty,
    /// No había ningún número, se tomó 0.
    Invalid,
    /// Negativo (se tomó 0) o por encima de `MAX_NUMERIC_INPUT` (se tomó el tope).
    Clamped,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericInput {
    pub value: f64,
    pub coercion: Coercion,
}

impl NumericInput {
    /// Lee un número en `[0, MAX_NUMERIC_INPUT]` de texto libre. Nunca falla: lo ilegible vale 0.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return NumericInput { value: 0.0, coercion: Coercion::Empty };
        }

        match leading_number(trimmed) {
            None => NumericInput { value: 0.0, coercion: Coercion::Invalid },
            Some(v) if v < 0.0 => NumericInput { value: 0.0, coercion: Coercion::Clamped },
            Some(v) if v > MAX_NUMERIC_INPUT => {
                NumericInput { value: MAX_NUMERIC_INPUT, coercion: Coercion::Clamped }
            }
            // -0 se normaliza a 0
            Some(v) if v == 0.0 => NumericInput { value: 0.0, coercion: Coercion::Exact },
            Some(v) => NumericInput { value: v, coercion: Coercion::Exact },
        }
    }

    pub fn was_coerced(&self) -> bool {
        self.coercion != Coercion::Exact
    }
}

/// Resultado de `update_item`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub field: ItemField,
    /// `None` para la descripción.
    pub numeric: Option<NumericInput>,
}

impl FieldUpdate {
    pub fn was_coerced(&self) -> bool {
        self.numeric.map(|n| n.was_coerced()).unwrap_or(false)
    }
}

/// Prefijo numérico más largo: signo opcional, dígitos, fracción y exponente.
fn leading_number(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }

    if digits == 0 {
        return None;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

pub(crate) fn sanitize(value: f64) -> f64 {
    if value.is_nan() || value <= 0.0 {
        0.0
    } else {
        value.min(MAX_NUMERIC_INPUT)
    }
}
