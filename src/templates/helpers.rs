use chrono::{DateTime, NaiveDate};
use minijinja::Value;

use crate::core::Rgb;

/// Formato de fecha visible: `Jan 2, 2026`.
pub const DISPLAY_DATE_FORMAT: &str = "%b %-d, %Y";

// Funciones auxiliares

pub fn format_currency(amount: f64, symbol: &str) -> String {
    if !amount.is_finite() {
        return format!("{}0.00", symbol);
    }
    let formatted = format_number_with_separators(amount.abs(), 2);
    if amount < 0.0 && formatted != "0.00" {
        format!("-{}{}", symbol, formatted)
    } else {
        format!("{}{}", symbol, formatted)
    }
}

pub fn format_number_with_separators(num: f64, decimals: usize) -> String {
    let formatted = format!("{:.decimals$}", num, decimals = decimals);
    let (integer, decimal) = match formatted.split_once('.') {
        Some((i, d)) => (i, d),
        None => (formatted.as_str(), ""),
    };
    let (sign, digits) = match integer.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", integer),
    };

    let mut result = String::new();
    for (count, c) in digits.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    let integer_formatted: String = result.chars().rev().collect();

    if decimals > 0 {
        format!("{}{}.{}", sign, integer_formatted, decimal)
    } else {
        format!("{}{}", sign, integer_formatted)
    }
}

/// Número sin ceros finales: `2`, `1.5`, `0.25`.
pub fn format_decimal(value: f64) -> String {
    let fixed = format!("{:.4}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn format_date_string(date_str: &str, format: &str) -> String {
    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        return date.format(format).to_string();
    }

    if let Ok(datetime) = DateTime::parse_from_rfc3339(date_str) {
        return datetime.format(format).to_string();
    }

    // Si no se puede parsear, devolver como está
    date_str.to_string()
}

pub fn format_display_date(date_str: &str) -> String {
    format_date_string(date_str.trim(), DISPLAY_DATE_FORMAT)
}

// Filtros

/// `{{ color|tint(0.08) }}` → `rgba(r, g, b, 0.08)`
pub fn tint_filter(value: Value, alpha: Option<f64>) -> Result<Value, minijinja::Error> {
    let hex = value.as_str().ok_or_else(|| {
        minijinja::Error::new(
            minijinja::ErrorKind::InvalidOperation,
            "Color must be a hex string",
        )
    })?;

    let alpha = alpha.unwrap_or(0.1);

    let rgb = Rgb::from_hex(hex);
    Ok(Value::from(format!(
        "rgba({}, {}, {}, {})",
        rgb.r,
        rgb.g,
        rgb.b,
        alpha.clamp(0.0, 1.0)
    )))
}

/// Iniciales para el monograma cuando no hay logo.
pub fn initials_filter(value: Value) -> Result<Value, minijinja::Error> {
    let initials: String = value
        .as_str()
        .unwrap_or_default()
        .split_whitespace()
        .filter_map(|word| word.chars().find(|c| c.is_alphanumeric()))
        .take(2)
        .flat_map(char::to_uppercase)
        .collect();
    Ok(Value::from(initials))
}
