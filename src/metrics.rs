use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};

pub static EXPORTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "invoice_pdf_exports_total",
        "PDF exports by outcome",
        &["outcome"]
    )
    .expect("metric can be registered")
});

pub static EXPORT_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "invoice_pdf_export_duration_seconds",
        "Time spent rendering a PDF export"
    )
    .expect("metric can be registered")
});

pub static PREVIEWS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("invoice_previews_total", "HTML previews rendered")
        .expect("metric can be registered")
});

pub static INVOICES_SAVED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "invoices_saved_total",
        "Invoices persisted from a draft, by status",
        &["status"]
    )
    .expect("metric can be registered")
});

pub static DRAFTS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("invoice_drafts_created_total", "Draft sessions opened")
        .expect("metric can be registered")
});

/// Fuerza el registro de todas las métricas para que `/metrics` las exponga desde el arranque.
pub fn init() {
    Lazy::force(&EXPORTS_TOTAL);
    Lazy::force(&EXPORT_DURATION);
    Lazy::force(&PREVIEWS_TOTAL);
    Lazy::force(&INVOICES_SAVED);
    Lazy::force(&DRAFTS_CREATED);
}

/// Texto de exposición de Prometheus del registro global.
pub fn gather_text() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
