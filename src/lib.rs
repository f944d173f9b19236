pub mod api;
pub mod core;
pub mod metrics;
pub mod models;
pub mod pdf;
pub mod session;
pub mod storage;
pub mod templates;

// Re-export commonly used types
pub use crate::core::{InvoiceError, InvoiceResult, PdfConfig};
pub use models::{InvoiceDraft, InvoiceTotals, LineItem};
pub use pdf::{DrawingSurface, ExportedPdf, PdfExporter};
pub use session::{ExportTicket, InvoiceEditor};
pub use storage::{ClientDirectory, InvoiceStore};
pub use templates::{TemplateCatalog, TemplateEngine};
