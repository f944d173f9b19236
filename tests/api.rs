use std::sync::Arc;

use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};
use uuid::Uuid;

use invoice_studio::api::{configure_routes, ApiState, AppConfig};
use invoice_studio::models::Client;
use invoice_studio::storage::MemoryStore;

fn state() -> ApiState {
    let mut client = Client::new("client-1", "Contoso Ltd", "ap@contoso.com");
    client.address = Some("1 Main St".into());
    client.city = Some("Springfield".into());
    let store = Arc::new(MemoryStore::with_clients(vec![client]));
    ApiState::with_backends(AppConfig::default(), store.clone(), store).unwrap()
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(configure_routes),
        )
        .await
    };
}

#[actix_web::test]
async fn lists_the_catalog() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::get().uri("/api/v1/templates").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["templates"].as_array().unwrap().len(), 15);
    assert_eq!(body["templates"][0]["id"], "minimal");

    let req = test::TestRequest::get().uri("/api/v1/templates?category=modern").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["templates"].as_array().unwrap().len(), 3);

    let req = test::TestRequest::get().uri("/api/v1/templates?category=retro").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get().uri("/api/v1/templates/categories").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["categories"].as_array().unwrap().len(), 5);
}

#[actix_web::test]
async fn edit_preview_export_and_save() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/drafts")
        .set_json(json!({ "templateId": "nordic" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let draft: Value = test::read_body_json(resp).await;
    let id = draft["id"].as_str().unwrap().to_string();
    let first_item = draft["draft"]["items"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(draft["draft"]["templateId"], "nordic");

    for (field, value) in [("description", "Consulting"), ("quantity", "2"), ("rate", "100")] {
        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/drafts/{}/items/{}", id, first_item))
            .set_json(json!({ "field": field, "value": value }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/drafts/{}/items", id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let second_item = body["result"]["itemId"].as_str().unwrap().to_string();

    for (field, value) in [("description", "Hosting"), ("quantity", "1"), ("rate", "50")] {
        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/drafts/{}/items/{}", id, second_item))
            .set_json(json!({ "field": field, "value": value }))
            .to_request();
        test::call_service(&app, req).await;
    }

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/drafts/{}/client/client-1", id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["draft"]["recipient"]["address"], "1 Main St, Springfield");

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/drafts/{}", id))
        .set_json(json!({ "taxRate": "10", "discountRate": "5" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["totals"]["subtotal"], 250.0);
    assert_eq!(body["totals"]["total"], 262.5);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/drafts/{}/preview", id))
        .to_request();
    let html = test::call_and_read_body(&app, req).await;
    let html = String::from_utf8(html.to_vec()).unwrap();
    assert!(html.contains("$262.50"));
    assert!(html.contains("Contoso Ltd"));

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/drafts/{}/export", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("content-type").unwrap(), "application/pdf");
    let disposition = resp.headers().get("content-disposition").unwrap().to_str().unwrap().to_string();
    assert!(disposition.contains(".pdf"));
    let pdf = test::read_body(resp).await;
    assert!(pdf.starts_with(b"%PDF"));

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/drafts/{}/save", id))
        .set_json(json!({ "status": "sent" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let invoice: Value = test::read_body_json(resp).await;
    assert_eq!(invoice["total"], 262.5);
    assert_eq!(invoice["status"], "sent");
    assert_eq!(invoice["client_id"], "client-1");

    let req = test::TestRequest::get().uri("/api/v1/invoices/stats").to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats["total_invoices"], 1);
    assert_eq!(stats["pending_amount"], 262.5);

    let invoice_id = invoice["id"].as_str().unwrap();
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/invoices/{}/paid", invoice_id))
        .to_request();
    let paid: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(paid["status"], "paid");
    assert_eq!(paid["amount_due"], 0.0);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/invoices/{}", invoice_id))
        .to_request();
    let stored: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stored["items"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn free_text_numbers_are_coerced() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::post().uri("/api/v1/drafts").to_request();
    let draft: Value = test::call_and_read_body_json(&app, req).await;
    let id = draft["id"].as_str().unwrap();
    let item = draft["draft"]["items"][0]["id"].as_str().unwrap();
    assert_eq!(draft["draft"]["templateId"], "minimal");

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/drafts/{}/items/{}", id, item))
        .set_json(json!({ "field": "quantity", "value": "abc" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["result"]["numeric"]["coercion"], "invalid");
    assert_eq!(body["draft"]["items"][0]["quantity"], 0.0);

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/drafts/{}/items/does-not-exist", id))
        .set_json(json!({ "field": "rate", "value": "5" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/drafts/{}/items/{}", id, item))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["result"]["removed"], false);
    assert_eq!(body["draft"]["items"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn second_export_conflicts_while_first_runs() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::post().uri("/api/v1/drafts").to_request();
    let draft: Value = test::call_and_read_body_json(&app, req).await;
    let id: Uuid = draft["id"].as_str().unwrap().parse().unwrap();

    let session = state.session(id).await.unwrap();
    let ticket = session.lock().await.begin_export().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/drafts/{}/export", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "PDF is still being generated");

    drop(ticket);
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/drafts/{}/export", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn save_validation_fills_the_error_slot() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::post().uri("/api/v1/drafts").to_request();
    let draft: Value = test::call_and_read_body_json(&app, req).await;
    let id = draft["id"].as_str().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/drafts/{}/save", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Please select or enter a client");

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/drafts/{}", id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["error"], "Please select or enter a client");

    let req = test::TestRequest::get().uri("/api/v1/invoices").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["invoices"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn unknown_draft_is_not_found() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/drafts/{}", Uuid::new_v4()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "healthy");
}

#[actix_web::test]
async fn conflicts_do_not_spend_export_quota() {
    let config = AppConfig {
        export_rate_limit_per_minute: 1,
        export_rate_limit_burst: 1,
        ..AppConfig::default()
    };
    let store = Arc::new(MemoryStore::new());
    let state = ApiState::with_backends(config, store.clone(), store).unwrap();
    let app = app!(state);

    let req = test::TestRequest::post().uri("/api/v1/drafts").to_request();
    let draft: Value = test::call_and_read_body_json(&app, req).await;
    let id: Uuid = draft["id"].as_str().unwrap().parse().unwrap();
    let export = || {
        test::TestRequest::post()
            .uri(&format!("/api/v1/drafts/{}/export", id))
            .to_request()
    };

    let session = state.session(id).await.unwrap();
    let ticket = session.lock().await.begin_export().unwrap();
    for _ in 0..3 {
        let resp = test::call_service(&app, export()).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    drop(ticket);
    let resp = test::call_service(&app, export()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(&app, export()).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[actix_web::test]
async fn clients_can_be_managed() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/clients")
        .set_json(json!({ "name": "Initech" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Email is required");

    let req = test::TestRequest::post()
        .uri("/api/v1/clients")
        .set_json(json!({ "name": " Initech ", "email": "ap@initech.com", "city": "Austin", "phone": "" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["name"], "Initech");
    assert!(created["phone"].is_null());

    let req = test::TestRequest::get().uri("/api/v1/clients").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["clients"].as_array().unwrap().len(), 2);

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/clients/{}", id))
        .set_json(json!({ "city": "Dallas", "country": "USA" }))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(updated["city"], "Dallas");
    assert_eq!(updated["email"], "ap@initech.com");

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/clients/{}", id))
        .to_request();
    let fetched: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(fetched["country"], "USA");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/clients/{}", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    for req in [
        test::TestRequest::get().uri(&format!("/api/v1/clients/{}", id)).to_request(),
        test::TestRequest::delete().uri(&format!("/api/v1/clients/{}", id)).to_request(),
        test::TestRequest::put()
            .uri(&format!("/api/v1/clients/{}", id))
            .set_json(json!({ "city": "Houston" }))
            .to_request(),
    ] {
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}

#[actix_web::test]
async fn saved_invoice_can_be_edited() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/drafts")
        .set_json(json!({ "clientId": "client-1" }))
        .to_request();
    let draft: Value = test::call_and_read_body_json(&app, req).await;
    let id = draft["id"].as_str().unwrap().to_string();
    let item = draft["draft"]["items"][0]["id"].as_str().unwrap().to_string();
    for (field, value) in [("description", "Consulting"), ("quantity", "1"), ("rate", "100")] {
        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/drafts/{}/items/{}", id, item))
            .set_json(json!({ "field": field, "value": value }))
            .to_request();
        test::call_service(&app, req).await;
    }
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/drafts/{}/save", id))
        .to_request();
    let invoice: Value = test::call_and_read_body_json(&app, req).await;
    let invoice_id = invoice["id"].as_str().unwrap().to_string();
    assert_eq!(invoice["total"], 100.0);

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/invoices/{}", invoice_id))
        .set_json(json!({
            "template_id": "not-a-template",
            "tax_rate": 10.0,
            "items": [
                { "description": "Consulting", "quantity": 2.0, "rate": 100.0 },
                { "description": "", "quantity": 9.0, "rate": 9.0 },
                { "description": "Hosting", "quantity": 1.0, "rate": 50.0 }
            ]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = test::read_body_json(resp).await;
    assert_eq!(updated["template_id"], "minimal");
    assert_eq!(updated["subtotal"], 250.0);
    assert_eq!(updated["total"], 275.0);
    assert_eq!(updated["items"].as_array().unwrap().len(), 2);

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/invoices/{}", invoice_id))
        .set_json(json!({ "client_name": "  " }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/invoices/{}", invoice_id))
        .to_request();
    let stored: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stored["client_name"], "Contoso Ltd");
    assert_eq!(stored["total"], 275.0);

    let req = test::TestRequest::put()
        .uri("/api/v1/invoices/missing")
        .set_json(json!({ "notes": "x" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn profile_is_saved_and_validated() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::get().uri("/api/v1/profile").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::put()
        .uri("/api/v1/profile")
        .set_json(json!({ "email": "me@studio.dev", "company_logo": "https://example.com/logo.png" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::put()
        .uri("/api/v1/profile")
        .set_json(json!({ "email": "me@studio.dev", "company_name": "Studio Dev" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/api/v1/profile").to_request();
    let profile: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(profile["company_name"], "Studio Dev");

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["storage"], "up");
}
