use thiserror::Error;

/// Errores del dominio de facturación.
///
/// Ninguno es fatal: todos quedan acotados a la acción actual del usuario y
/// dejan el borrador intacto para reintentar.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvoiceError {
    /// Validación local antes de persistir (cliente, líneas).
    #[error("{0}")]
    Validation(String),

    #[error("line item not found: {0}")]
    ItemNotFound(String),

    #[error("client not found: {0}")]
    ClientNotFound(String),

    #[error("invalid logo image: {0}")]
    InvalidLogo(String),

    /// Ya hay una exportación en curso para esta sesión.
    #[error("an export is already in progress")]
    ExportInProgress,

    #[error("export failed: {0}")]
    Export(String),

    /// Fallo de la API de dibujo (printpdf o equivalente).
    #[error("drawing error: {0}")]
    Drawing(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}

impl InvoiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn drawing(msg: impl Into<String>) -> Self {
        Self::Drawing(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Mensaje apto para mostrar al usuario.
    pub fn user_message(&self) -> String {
        match self {
            InvoiceError::Validation(msg) => msg.clone(),
            InvoiceError::Persistence(msg) => msg.clone(),
            InvoiceError::ExportInProgress => "PDF is still being generated".to_string(),
            InvoiceError::Export(_) | InvoiceError::Drawing(_) => {
                "Error generating PDF. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<minijinja::Error> for InvoiceError {
    fn from(error: minijinja::Error) -> Self {
        InvoiceError::Render(error.to_string())
    }
}

impl From<sqlx::Error> for InvoiceError {
    fn from(error: sqlx::Error) -> Self {
        InvoiceError::Persistence(error.to_string())
    }
}

pub type InvoiceResult<T> = Result<T, InvoiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawing_failures_surface_a_generic_message() {
        let err = InvoiceError::drawing("font table missing");
        assert_eq!(err.user_message(), "Error generating PDF. Please try again.");
        assert!(err.to_string().contains("font table missing"));
    }

    #[test]
    fn validation_message_is_shown_verbatim() {
        let err = InvoiceError::validation("Please select or enter a client");
        assert_eq!(err.user_message(), "Please select or enter a client");
    }
}
