use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::core::{InvoiceError, InvoiceResult};

/// Une partes de dirección no vacías con `", "`.
pub fn join_address<'a>(parts: impl IntoIterator<Item = Option<&'a str>>) -> String {
    parts
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Logo de la empresa como data URL (`data:image/png;base64,...`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogoImage {
    mime: String,
    data_url: String,
    byte_len: usize,
}

impl LogoImage {
    pub fn from_data_url(data_url: &str) -> InvoiceResult<Self> {
        let rest = data_url
            .strip_prefix("data:")
            .ok_or_else(|| InvoiceError::InvalidLogo("expected a data: URL".to_string()))?;

        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| InvoiceError::InvalidLogo("missing payload".to_string()))?;

        let mime = meta
            .strip_suffix(";base64")
            .ok_or_else(|| InvoiceError::InvalidLogo("payload must be base64".to_string()))?;

        if !mime.starts_with("image/") {
            return Err(InvoiceError::InvalidLogo(format!("unsupported type {}", mime)));
        }

        let bytes = BASE64
            .decode(payload.trim())
            .map_err(|e| InvoiceError::InvalidLogo(e.to_string()))?;

        if bytes.is_empty() {
            return Err(InvoiceError::InvalidLogo("empty image".to_string()));
        }

        Ok(LogoImage {
            mime: mime.to_string(),
            data_url: data_url.to_string(),
            byte_len: bytes.len(),
        })
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }
}

impl TryFrom<String> for LogoImage {
    type Error = InvoiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        LogoImage::from_data_url(&value)
    }
}

impl From<LogoImage> for String {
    fn from(logo: LogoImage) -> Self {
        logo.data_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // PNG de 1x1
    const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn accepts_base64_image_urls() {
        let logo = LogoImage::from_data_url(PIXEL).unwrap();
        assert_eq!(logo.mime(), "image/png");
        assert!(logo.byte_len() > 0);
        assert_eq!(logo.data_url(), PIXEL);
    }

    #[test]
    fn rejects_non_images_and_bad_payloads() {
        assert!(LogoImage::from_data_url("https://example.com/logo.png").is_err());
        assert!(LogoImage::from_data_url("data:text/plain;base64,aGk=").is_err());
        assert!(LogoImage::from_data_url("data:image/png;base64,%%%").is_err());
        assert!(LogoImage::from_data_url("data:image/png,raw").is_err());
    }

    #[test]
    fn logo_round_trips_through_json_as_a_string() {
        let logo = LogoImage::from_data_url(PIXEL).unwrap();
        let json = serde_json::to_value(&logo).unwrap();
        assert_eq!(json, serde_json::Value::String(PIXEL.to_string()));
        let back: LogoImage = serde_json::from_value(json).unwrap();
        assert_eq!(back, logo);
    }

    #[test]
    fn address_parts_skip_blanks() {
        let joined = join_address([Some("1 Main St"), None, Some(" "), Some("Springfield")]);
        assert_eq!(joined, "1 Main St, Springfield");
    }
}
