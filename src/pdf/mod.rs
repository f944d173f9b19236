pub mod exporter;
pub mod printpdf_surface;
pub mod surface;

pub use exporter::{ExportedPdf, PdfExporter};
pub use printpdf_surface::PrintPdfSurface;
pub use surface::{
    DrawOp, DrawingSurface, FontSpec, FontWeight, PageDecoration, RecordingSurface, TableStyle,
    TextAlign,
};
