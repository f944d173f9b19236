use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use governor::{clock::DefaultClock, state::keyed::DashMapStateStore, Quota, RateLimiter};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use crate::core::{Margin, Orientation, PageSize, PdfConfig};
use crate::pdf::PdfExporter;
use crate::session::InvoiceEditor;
use crate::storage::{ClientDirectory, InvoiceStore, MemoryStore, SqliteStore};
use crate::templates::{TemplateCatalog, TemplateEngine};

pub type KeyedRateLimiter = Arc<RateLimiter<String, DashMapStateStore<String>, DefaultClock>>;
pub type SharedEditor = Arc<Mutex<InvoiceEditor>>;

/// Sesión abierta con la marca de su último acceso.
pub struct DraftSession {
    editor: SharedEditor,
    /// Milisegundos desde epoch.
    touched_at: AtomicI64,
}

impl DraftSession {
    fn new(editor: SharedEditor) -> Self {
        DraftSession {
            editor,
            touched_at: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    fn touch(&self) {
        self.touched_at.store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn is_expired(&self, ttl_seconds: i64) -> bool {
        let now = Utc::now().timestamp_millis();
        let expiry = self.touched_at.load(Ordering::Relaxed) + Duration::seconds(ttl_seconds).num_milliseconds();
        now > expiry
    }

    // candado tomado o exportación en curso
    fn is_busy(&self) -> bool {
        match self.editor.try_lock() {
            Ok(editor) => editor.is_exporting(),
            Err(_) => true,
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub sessions: Arc<RwLock<HashMap<Uuid, Arc<DraftSession>>>>,
    pub catalog: Arc<TemplateCatalog>,
    pub engine: Arc<TemplateEngine>,
    pub exporter: Arc<PdfExporter>,
    pub store: Arc<dyn InvoiceStore>,
    pub clients: Arc<dyn ClientDirectory>,
    pub rate_limiter: KeyedRateLimiter,
    pub config: Arc<AppConfig>,
}

/// Configuración del servicio. Se lee de `INVOICE_STUDIO_*` sobre los valores por defecto.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Vacío usa el almacén en memoria.
    pub database_url: String,
    pub database_max_connections: u32,
    pub currency: String,
    pub currency_symbol: String,
    pub export_rate_limit_per_minute: u32,
    pub export_rate_limit_burst: u32,
    /// Segundos sin uso tras los que se descarta un borrador abierto.
    pub draft_ttl_seconds: i64,
    pub session_sweep_interval_seconds: u64,
    /// a4, letter, legal o a3.
    pub pdf_page_size: String,
    pub pdf_orientation: String,
    pub pdf_margin_mm: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: String::new(),
            database_max_connections: 5,
            currency: "USD".to_string(),
            currency_symbol: "$".to_string(),
            export_rate_limit_per_minute: 30,
            export_rate_limit_burst: 5,
            draft_ttl_seconds: 3600,
            session_sweep_interval_seconds: 60,
            pdf_page_size: "a4".to_string(),
            pdf_orientation: "portrait".to_string(),
            pdf_margin_mm: 20.0,
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let defaults = AppConfig::default();
        let settings = config::Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", defaults.port as i64)?
            .set_default("database_url", defaults.database_url)?
            .set_default("database_max_connections", defaults.database_max_connections as i64)?
            .set_default("currency", defaults.currency)?
            .set_default("currency_symbol", defaults.currency_symbol)?
            .set_default("export_rate_limit_per_minute", defaults.export_rate_limit_per_minute as i64)?
            .set_default("export_rate_limit_burst", defaults.export_rate_limit_burst as i64)?
            .set_default("draft_ttl_seconds", defaults.draft_ttl_seconds)?
            .set_default("session_sweep_interval_seconds", defaults.session_sweep_interval_seconds as i64)?
            .set_default("pdf_page_size", defaults.pdf_page_size)?
            .set_default("pdf_orientation", defaults.pdf_orientation)?
            .set_default("pdf_margin_mm", defaults.pdf_margin_mm as f64)?
            .add_source(config::Environment::with_prefix("INVOICE_STUDIO").try_parsing(true))
            .build()?;

        settings
            .try_deserialize()
            .context("invalid INVOICE_STUDIO configuration")
    }

    /// Página del PDF exportado.
    pub fn pdf_config(&self) -> anyhow::Result<PdfConfig> {
        let page_size: PageSize = self.pdf_page_size.parse().map_err(anyhow::Error::msg)?;
        let orientation: Orientation = self.pdf_orientation.parse().map_err(anyhow::Error::msg)?;
        if !(0.0..=60.0).contains(&self.pdf_margin_mm) {
            anyhow::bail!("pdf_margin_mm must be between 0 and 60");
        }

        Ok(PdfConfig::builder()
            .page_size(page_size)
            .orientation(orientation)
            .margin(Margin::uniform(self.pdf_margin_mm))
            .build())
    }
}

impl ApiState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        if config.database_url.trim().is_empty() {
            tracing::warn!("No database configured, invoices are kept in memory");
            let store = Arc::new(MemoryStore::new());
            return Self::with_backends(config, store.clone(), store);
        }

        let store = Arc::new(
            SqliteStore::connect(&config.database_url, config.database_max_connections)
                .await
                .context("could not open the invoice database")?,
        );
        Self::with_backends(config, store.clone(), store)
    }

    pub fn with_backends(
        config: AppConfig,
        store: Arc<dyn InvoiceStore>,
        clients: Arc<dyn ClientDirectory>,
    ) -> anyhow::Result<Self> {
        let catalog = Arc::new(TemplateCatalog::new());
        let engine = Arc::new(TemplateEngine::new(catalog.clone(), config.currency_symbol.clone())?);
        let pdf_config = config.pdf_config().context("invalid PDF page settings")?;
        let exporter = Arc::new(PdfExporter::new(engine.clone(), pdf_config));

        let per_minute = NonZeroU32::new(config.export_rate_limit_per_minute)
            .context("export_rate_limit_per_minute must be greater than zero")?;
        let burst = NonZeroU32::new(config.export_rate_limit_burst)
            .context("export_rate_limit_burst must be greater than zero")?;
        let quota = Quota::per_minute(per_minute).allow_burst(burst);
        let rate_limiter = Arc::new(RateLimiter::dashmap_with_clock(quota, &DefaultClock::default()));

        Ok(ApiState {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            catalog,
            engine,
            exporter,
            store,
            clients,
            rate_limiter,
            config: Arc::new(config),
        })
    }

    pub async fn open_session(&self, editor: InvoiceEditor) -> (Uuid, SharedEditor) {
        let id = Uuid::new_v4();
        let editor = Arc::new(Mutex::new(editor));
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(DraftSession::new(editor.clone())));
        (id, editor)
    }

    /// Editor de la sesión; cada acceso renueva su plazo de vida.
    pub async fn session(&self, id: Uuid) -> ApiResult<SharedEditor> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(&id)
            .ok_or_else(|| ApiError::not_found(format!("Draft {} not found", id)))?;
        session.touch();
        Ok(session.editor.clone())
    }

    pub async fn close_session(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    /// Cierra los borradores sin uso más allá del TTL y poda el limitador.
    ///
    /// Una sesión ocupada (candado tomado o exportando) se conserva aunque haya vencido.
    pub async fn sweep_idle_sessions(&self) -> usize {
        let ttl = self.config.draft_ttl_seconds;
        let removed = {
            let mut sessions = self.sessions.write().await;
            let before = sessions.len();
            sessions.retain(|_, session| session.is_busy() || !session.is_expired(ttl));
            before - sessions.len()
        };
        self.rate_limiter.retain_recent();

        if removed > 0 {
            info!("Closed {} idle drafts", removed);
        }
        removed
    }

    /// Barrido periódico de sesiones en el runtime actual.
    pub fn spawn_session_sweeper(&self) {
        let state = self.clone();
        let period = std::time::Duration::from_secs(self.config.session_sweep_interval_seconds.max(1));
        actix_web::rt::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                state.sweep_idle_sessions().await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InvoiceDraft;

    fn state(ttl: i64) -> ApiState {
        let config = AppConfig { draft_ttl_seconds: ttl, ..AppConfig::default() };
        let store = Arc::new(MemoryStore::new());
        ApiState::with_backends(config, store.clone(), store).unwrap()
    }

    fn editor(state: &ApiState) -> InvoiceEditor {
        InvoiceEditor::new(InvoiceDraft::new(None, "minimal"), state.catalog.clone())
    }

    #[actix_rt::test]
    async fn idle_sessions_are_swept() {
        let state = state(0);
        let (id, _) = state.open_session(editor(&state)).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(state.sweep_idle_sessions().await, 1);
        assert!(state.session(id).await.is_err());
    }

    #[actix_rt::test]
    async fn fresh_and_busy_sessions_survive_the_sweep() {
        let fresh = state(3600);
        let (fresh_id, _) = fresh.open_session(editor(&fresh)).await;
        assert_eq!(fresh.sweep_idle_sessions().await, 0);
        assert!(fresh.session(fresh_id).await.is_ok());

        let stale = state(0);
        let (busy_id, busy) = stale.open_session(editor(&stale)).await;
        let ticket = busy.lock().await.begin_export().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(stale.sweep_idle_sessions().await, 0);
        drop(ticket);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(stale.sweep_idle_sessions().await, 1);
        assert!(stale.session(busy_id).await.is_err());
    }

    #[test]
    fn pdf_page_settings_come_from_config() {
        let config = AppConfig {
            pdf_page_size: "Letter".into(),
            pdf_orientation: "landscape".into(),
            pdf_margin_mm: 10.0,
            ..AppConfig::default()
        };
        let pdf = config.pdf_config().unwrap();
        assert_eq!(pdf.page_size, PageSize::Letter);
        assert_eq!(pdf.orientation, Orientation::Landscape);
        assert_eq!(pdf.margin, Margin::uniform(10.0));

        let bad = AppConfig { pdf_page_size: "tabloid".into(), ..AppConfig::default() };
        assert!(bad.pdf_config().is_err());
        assert!(AppConfig::default().pdf_config().is_ok());
    }
}
