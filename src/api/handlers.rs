use actix_web::{http::header, web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use super::state::ApiState;
use crate::core::InvoiceError;
use crate::metrics;
use crate::models::{
    Client, ClientUpdate, DraftPatch, InvoiceDraft, InvoiceStats, InvoiceStatus, InvoiceTotals,
    InvoiceUpdate, ItemField, LineItemId, NewClient, Profile,
};
use crate::session::InvoiceEditor;
use crate::templates::TemplateCategory;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDraftRequest {
    pub template_id: Option<String>,
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TemplateQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ItemUpdateRequest {
    pub field: ItemField,
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaveRequest {
    pub status: Option<InvoiceStatus>,
    pub currency: Option<String>,
}

/// Estado de una sesión tal como lo ve el cliente.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftResponse {
    pub id: Uuid,
    pub draft: InvoiceDraft,
    pub totals: InvoiceTotals,
    pub error: Option<String>,
    pub exporting: bool,
}

impl DraftResponse {
    fn from_editor(id: Uuid, editor: &InvoiceEditor) -> Self {
        DraftResponse {
            id,
            draft: editor.draft().clone(),
            totals: editor.totals(),
            error: editor.error().map(str::to_string),
            exporting: editor.is_exporting(),
        }
    }
}

/// Respuesta de una mutación: el estado resultante más lo que devolvió la operación.
#[derive(Debug, Serialize)]
pub struct MutationResponse<T: Serialize> {
    #[serde(flatten)]
    pub session: DraftResponse,
    pub result: T,
}

// Catálogo

pub async fn list_templates(
    query: web::Query<TemplateQuery>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let templates = match query.category.as_deref() {
        Some(raw) => {
            let category = TemplateCategory::parse(raw)
                .ok_or_else(|| ApiError::bad_request(format!("Unknown category: {}", raw)))?;
            state.catalog.by_category(category)
        }
        None => state.catalog.list().iter().collect(),
    };

    Ok(HttpResponse::Ok().json(json!({ "templates": templates })))
}

pub async fn list_categories(state: web::Data<ApiState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "categories": state.catalog.categories() }))
}

// Clientes y perfil

pub async fn list_clients(state: web::Data<ApiState>) -> ApiResult<HttpResponse> {
    let clients = state.clients.list_clients().await?;
    Ok(HttpResponse::Ok().json(json!({ "clients": clients })))
}

pub async fn create_client(
    body: web::Json<NewClient>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let client = state.clients.create_client(body.into_inner()).await?;
    info!("Created client {}", client.id);
    Ok(HttpResponse::Created().json(client))
}

pub async fn get_client(
    path: web::Path<String>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let client = find_client(&state, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(client))
}

pub async fn update_client(
    path: web::Path<String>,
    body: web::Json<ClientUpdate>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let client = state
        .clients
        .update_client(&id, body.into_inner())
        .await?
        .ok_or_else(|| InvoiceError::ClientNotFound(id.clone()))?;
    Ok(HttpResponse::Ok().json(client))
}

pub async fn delete_client(
    path: web::Path<String>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    if state.clients.delete_client(&id).await? {
        info!("Deleted client {}", id);
        Ok(HttpResponse::NoContent().finish())
    } else {
        Err(InvoiceError::ClientNotFound(id).into())
    }
}

pub async fn get_profile(state: web::Data<ApiState>) -> ApiResult<HttpResponse> {
    match state.clients.profile().await? {
        Some(profile) => Ok(HttpResponse::Ok().json(profile)),
        None => Err(ApiError::not_found("No profile configured")),
    }
}

pub async fn save_profile(
    body: web::Json<Profile>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let profile = state.clients.save_profile(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

// Borradores

pub async fn create_draft(
    body: Option<web::Json<CreateDraftRequest>>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let request = body.map(web::Json::into_inner).unwrap_or_default();
    let profile = state.clients.profile().await?;
    let template = state
        .catalog
        .resolve(request.template_id.as_deref().unwrap_or_default());

    let mut editor = InvoiceEditor::new(
        InvoiceDraft::new(profile.as_ref(), template.id),
        state.catalog.clone(),
    );
    if let Some(client_id) = request.client_id.as_deref() {
        editor.select_client(&find_client(&state, client_id).await?);
    }

    let (id, session) = state.open_session(editor).await;
    metrics::DRAFTS_CREATED.inc();
    info!("Opened draft {} with template {}", id, template.id);

    let editor = session.lock().await;
    Ok(HttpResponse::Created().json(DraftResponse::from_editor(id, &editor)))
}

pub async fn get_draft(
    path: web::Path<Uuid>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let session = state.session(id).await?;
    let editor = session.lock().await;
    Ok(HttpResponse::Ok().json(DraftResponse::from_editor(id, &editor)))
}

pub async fn update_draft(
    path: web::Path<Uuid>,
    body: web::Json<DraftPatch>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let mut patch = body.into_inner();
    let session = state.session(id).await?;
    let mut editor = session.lock().await;

    // la plantilla pasa por el catálogo para no guardar ids desconocidos
    let template_id = patch.template_id.take();
    let outcome = editor.apply_patch(patch)?;
    if let Some(template_id) = template_id {
        editor.select_template(&template_id);
    }

    Ok(HttpResponse::Ok().json(MutationResponse {
        session: DraftResponse::from_editor(id, &editor),
        result: outcome,
    }))
}

pub async fn delete_draft(
    path: web::Path<Uuid>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    if state.close_session(id).await {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Err(ApiError::not_found(format!("Draft {} not found", id)))
    }
}

pub async fn add_item(
    path: web::Path<Uuid>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let session = state.session(id).await?;
    let mut editor = session.lock().await;
    let item_id = editor.add_item();

    Ok(HttpResponse::Created().json(MutationResponse {
        session: DraftResponse::from_editor(id, &editor),
        result: json!({ "itemId": item_id }),
    }))
}

pub async fn update_item(
    path: web::Path<(Uuid, String)>,
    body: web::Json<ItemUpdateRequest>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let (id, item_id) = path.into_inner();
    let session = state.session(id).await?;
    let mut editor = session.lock().await;
    let update = editor.update_item(&LineItemId(item_id), body.field, &body.value)?;

    Ok(HttpResponse::Ok().json(MutationResponse {
        session: DraftResponse::from_editor(id, &editor),
        result: update,
    }))
}

pub async fn remove_item(
    path: web::Path<(Uuid, String)>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let (id, item_id) = path.into_inner();
    let session = state.session(id).await?;
    let mut editor = session.lock().await;
    let removed = editor.remove_item(&LineItemId(item_id));

    Ok(HttpResponse::Ok().json(MutationResponse {
        session: DraftResponse::from_editor(id, &editor),
        result: json!({ "removed": removed }),
    }))
}

pub async fn select_client(
    path: web::Path<(Uuid, String)>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let (id, client_id) = path.into_inner();
    let client = find_client(&state, &client_id).await?;
    let session = state.session(id).await?;
    let mut editor = session.lock().await;
    editor.select_client(&client);

    Ok(HttpResponse::Ok().json(DraftResponse::from_editor(id, &editor)))
}

pub async fn preview_draft(
    path: web::Path<Uuid>,
    query: web::Query<PreviewQuery>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let session = state.session(path.into_inner()).await?;
    let editor = session.lock().await;
    let preview = state.engine.preview(editor.draft())?;
    metrics::PREVIEWS_TOTAL.inc();

    match query.format.as_deref() {
        Some("json") => Ok(HttpResponse::Ok().json(json!({
            "templateId": preview.template.id,
            "view": preview.view,
            "html": preview.html,
        }))),
        _ => Ok(HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(preview.html)),
    }
}

/// Exporta el borrador a PDF.
///
/// El ticket se toma con el candado y el render corre sin él, así la sesión
/// sigue editable mientras se genera el documento. Un rechazo por exportación
/// en curso no consume cupo del limitador.
pub async fn export_pdf(
    path: web::Path<Uuid>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let session = state.session(id).await?;

    let ticket = {
        let editor = session.lock().await;
        if editor.is_exporting() {
            return Err(InvoiceError::ExportInProgress.into());
        }
        if state.rate_limiter.check_key(&id.to_string()).is_err() {
            return Err(ApiError::too_many_requests("Too many exports, try again in a minute"));
        }
        editor.begin_export()?
    };

    match state.exporter.clone().export(ticket).await {
        Ok(pdf) => {
            session.lock().await.clear_error();
            Ok(HttpResponse::Ok()
                .content_type("application/pdf")
                .insert_header((
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", pdf.filename),
                ))
                .body(pdf.bytes))
        }
        Err(e) => {
            session.lock().await.record_failure(&e);
            Err(e.into())
        }
    }
}

pub async fn save_draft(
    path: web::Path<Uuid>,
    body: Option<web::Json<SaveRequest>>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let request = body.map(web::Json::into_inner).unwrap_or_default();
    let session = state.session(path.into_inner()).await?;
    let mut editor = session.lock().await;

    let currency = request.currency.unwrap_or_else(|| state.config.currency.clone());
    let invoice = editor
        .save(
            state.store.as_ref(),
            request.status.unwrap_or(InvoiceStatus::Draft),
            &currency,
        )
        .await?;

    Ok(HttpResponse::Created().json(invoice))
}

// Facturas guardadas

pub async fn list_invoices(state: web::Data<ApiState>) -> ApiResult<HttpResponse> {
    let invoices = state.store.list_invoices().await?;
    Ok(HttpResponse::Ok().json(json!({ "invoices": invoices })))
}

pub async fn invoice_stats(state: web::Data<ApiState>) -> ApiResult<HttpResponse> {
    let invoices = state.store.list_invoices().await?;
    Ok(HttpResponse::Ok().json(InvoiceStats::from_invoices(&invoices, Utc::now())))
}

pub async fn get_invoice(
    path: web::Path<String>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    match state.store.get_invoice(&id).await? {
        Some(invoice) => Ok(HttpResponse::Ok().json(invoice)),
        None => Err(invoice_not_found(&id)),
    }
}

/// Edición de una factura guardada. La plantilla pasa por el catálogo.
pub async fn update_invoice(
    path: web::Path<String>,
    body: web::Json<InvoiceUpdate>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let mut update = body.into_inner();
    update.template_id = update
        .template_id
        .map(|template_id| state.catalog.resolve(&template_id).id.to_string());

    let invoice = state
        .store
        .update_invoice(&id, update)
        .await?
        .ok_or_else(|| invoice_not_found(&id))?;
    info!("Updated invoice {}", invoice.invoice.invoice_number);
    Ok(HttpResponse::Ok().json(invoice))
}

pub async fn delete_invoice(
    path: web::Path<String>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    if state.store.delete_invoice(&id).await? {
        info!("Deleted invoice {}", id);
        Ok(HttpResponse::NoContent().finish())
    } else {
        Err(invoice_not_found(&id))
    }
}

pub async fn mark_paid(
    path: web::Path<String>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let invoice = state
        .store
        .mark_paid(&id)
        .await?
        .ok_or_else(|| invoice_not_found(&id))?;
    Ok(HttpResponse::Ok().json(invoice))
}

pub async fn mark_sent(
    path: web::Path<String>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let invoice = state
        .store
        .mark_sent(&id)
        .await?
        .ok_or_else(|| invoice_not_found(&id))?;
    Ok(HttpResponse::Ok().json(invoice))
}

// Funciones auxiliares

async fn find_client(state: &ApiState, client_id: &str) -> ApiResult<Client> {
    state
        .clients
        .get_client(client_id)
        .await?
        .ok_or_else(|| InvoiceError::ClientNotFound(client_id.to_string()).into())
}

fn invoice_not_found(id: &str) -> ApiError {
    ApiError::not_found(format!("Invoice {} not found", id))
}
