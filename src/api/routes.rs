use actix_cors::Cors;
use actix_web::{web, HttpResponse};
use serde_json::json;

use super::error::{ApiError, ApiResult};
use super::handlers;
use super::state::ApiState;
use crate::metrics;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health checks
        .route("/health", web::get().to(health_check))
        .route("/metrics", web::get().to(metrics_endpoint))

        // API v1
        .service(
            web::scope("/api/v1")
                .wrap(
                    Cors::default()
                        .allowed_origin_fn(|origin, _req_head| {
                            origin.as_bytes().starts_with(b"http://localhost") ||
                            origin.as_bytes().starts_with(b"https://")
                        })
                        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
                        .allowed_headers(vec!["Content-Type"])
                        .expose_headers(vec!["Content-Disposition"])
                        .max_age(3600)
                )

                .service(
                    web::scope("/templates")
                        .route("", web::get().to(handlers::list_templates))
                        .route("/categories", web::get().to(handlers::list_categories))
                )

                .service(
                    web::scope("/clients")
                        .route("", web::get().to(handlers::list_clients))
                        .route("", web::post().to(handlers::create_client))
                        .route("/{id}", web::get().to(handlers::get_client))
                        .route("/{id}", web::put().to(handlers::update_client))
                        .route("/{id}", web::delete().to(handlers::delete_client))
                )

                .route("/profile", web::get().to(handlers::get_profile))
                .route("/profile", web::put().to(handlers::save_profile))

                // Sesiones de edición
                .service(
                    web::scope("/drafts")
                        .route("", web::post().to(handlers::create_draft))
                        .route("/{id}", web::get().to(handlers::get_draft))
                        .route("/{id}", web::put().to(handlers::update_draft))
                        .route("/{id}", web::delete().to(handlers::delete_draft))
                        .route("/{id}/items", web::post().to(handlers::add_item))
                        .route("/{id}/items/{item_id}", web::put().to(handlers::update_item))
                        .route("/{id}/items/{item_id}", web::delete().to(handlers::remove_item))
                        .route("/{id}/client/{client_id}", web::post().to(handlers::select_client))
                        .route("/{id}/preview", web::get().to(handlers::preview_draft))
                        .route("/{id}/export", web::post().to(handlers::export_pdf))
                        .route("/{id}/save", web::post().to(handlers::save_draft))
                )

                // Facturas guardadas
                .service(
                    web::scope("/invoices")
                        .route("", web::get().to(handlers::list_invoices))
                        .route("/stats", web::get().to(handlers::invoice_stats))
                        .route("/{id}", web::get().to(handlers::get_invoice))
                        .route("/{id}", web::put().to(handlers::update_invoice))
                        .route("/{id}", web::delete().to(handlers::delete_invoice))
                        .route("/{id}/paid", web::post().to(handlers::mark_paid))
                        .route("/{id}/sent", web::post().to(handlers::mark_sent))
                )
        );
}

async fn health_check(state: web::Data<ApiState>) -> HttpResponse {
    let storage = state.store.ping().await;
    let body = json!({
        "status": if storage { "healthy" } else { "degraded" },
        "storage": if storage { "up" } else { "down" },
        "templates": state.catalog.list().len(),
        "open_drafts": state.sessions.read().await.len(),
    });

    if storage {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

async fn metrics_endpoint() -> ApiResult<HttpResponse> {
    let body = metrics::gather_text()
        .map_err(|e| ApiError::internal_server_error(format!("Failed to encode metrics: {}", e)))?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}
