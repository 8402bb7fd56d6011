//! HTTP server assembly and route handlers

use std::sync::Arc;

use actix_web::{get, post, web, App, HttpRequest, HttpResponse, HttpServer, Responder};
use actix_web_actors::ws;
use serde_json::json;
use tracing::{error, info, warn};

use template_gateway_core::config::{ServiceConfig, WebhookConfig};
use template_gateway_core::shutdown::{ShutdownConfig, ShutdownCoordinator};
use template_gateway_core::store::{ComplianceStore, MemoryStore};

use crate::webhooks::processor::WebhookProcessor;
use crate::webhooks::verification::{self, VerifyParams};
use crate::ws::{BroadcastHub, ConnectionRegistry, WsSession};

const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Shared application state
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub hub: Arc<BroadcastHub>,
    pub store: Arc<dyn ComplianceStore>,
    pub processor: Arc<WebhookProcessor>,
    pub webhook_config: WebhookConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn ComplianceStore>, webhook_config: WebhookConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let hub = Arc::new(BroadcastHub::new(Arc::clone(&registry)));
        let processor = Arc::new(WebhookProcessor::new(Arc::clone(&store), Arc::clone(&hub)));
        Self {
            registry,
            hub,
            store,
            processor,
            webhook_config,
        }
    }
}

#[get("/health")]
async fn health(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "template-gateway",
        "connections": state.registry.connection_count(),
    }))
}

/// Subscription handshake: echo the challenge when the token matches.
#[get("/webhooks")]
async fn verify_webhook(
    query: web::Query<VerifyParams>,
    state: web::Data<AppState>,
) -> impl Responder {
    if verification::verify_subscription(&query, &state.webhook_config.verify_token) {
        info!("Webhook subscription verified");
        HttpResponse::Ok()
            .content_type("text/plain")
            .body(query.into_inner().challenge)
    } else {
        warn!("Webhook subscription verification failed");
        HttpResponse::Forbidden().json(json!({ "error": "verification failed" }))
    }
}

/// Webhook ingestion. Signature mismatches are rejected at the edge. Once the
/// payload is on record the response is always 200, whatever happens
/// downstream, so the provider does not retry what we already logged. A
/// failed log write is the one exception: nothing is on record yet, so a 5xx
/// lets provider redelivery recover the notification.
#[post("/webhooks")]
async fn receive_webhook(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> impl Responder {
    if let Some(secret) = &state.webhook_config.app_secret {
        let signature = req
            .headers()
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());
        let Some(signature) = signature else {
            warn!("Webhook rejected: missing {} header", SIGNATURE_HEADER);
            return HttpResponse::Unauthorized().json(json!({ "error": "missing signature" }));
        };
        if let Err(e) = verification::verify_hmac_signature(&body, signature, secret) {
            warn!(error = %e, "Webhook rejected: signature verification failed");
            return HttpResponse::Unauthorized().json(json!({ "error": "invalid signature" }));
        }
    }

    match state.processor.ingest(&body).await {
        Ok(outcome) => HttpResponse::Ok().json(json!({
            "status": "received",
            "events": outcome.events.len(),
        })),
        Err(e) => {
            // The payload was never logged; make the provider redeliver
            error!(error = %e, "Webhook ingestion failed before logging");
            HttpResponse::InternalServerError().json(json!({ "error": "ingestion failed" }))
        }
    }
}

/// Upgrade to a WebSocket session.
#[get("/ws")]
async fn ws_connect(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let session = WsSession::new(
        Arc::clone(&state.registry),
        Arc::clone(&state.hub),
        Arc::clone(&state.store),
    );
    ws::start(session, &req, stream)
}

/// Register all routes. Split out so HTTP tests can mount the same surface.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(verify_webhook)
        .service(receive_webhook)
        .service(ws_connect);
}

/// Run the gateway until a shutdown signal arrives.
pub async fn run(service: ServiceConfig, webhook: WebhookConfig) -> std::io::Result<()> {
    let store: Arc<dyn ComplianceStore> = MemoryStore::shared();
    let state = web::Data::new(AppState::new(store, webhook));

    let coordinator = ShutdownCoordinator::new(ShutdownConfig {
        grace_period: service.shutdown_grace,
    });
    let hub = Arc::clone(&state.hub);
    coordinator.on_shutdown(move || hub.shutdown());
    actix_web::rt::spawn(coordinator.wait_for_signal());

    info!(
        host = %service.host,
        port = service.port,
        workers = service.workers,
        "Starting template gateway"
    );

    let app_state = state.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(configure_routes)
    })
    .workers(service.workers)
    .bind((service.host.as_str(), service.port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};
    use chrono::Utc;
    use template_gateway_core::error::StoreError;
    use template_gateway_core::models::{Template, TemplateStatus};

    fn test_state(app_secret: Option<&str>) -> (Arc<MemoryStore>, web::Data<AppState>) {
        let store = MemoryStore::shared();
        store.insert_template(Template {
            id: "tpl-1".to_string(),
            account_id: "acct-1".to_string(),
            name: "order_update".to_string(),
            language: None,
            status: TemplateStatus::Pending,
            category: None,
            updated_at: Utc::now(),
        });
        let config = WebhookConfig {
            verify_token: "hunter22".to_string(),
            app_secret: app_secret.map(str::to_string),
        };
        let state = web::Data::new(AppState::new(
            Arc::clone(&store) as Arc<dyn ComplianceStore>,
            config,
        ));
        (store, state)
    }

    #[actix_web::test]
    async fn handshake_echoes_challenge() {
        let (_store, state) = test_state(None);
        let app =
            test::init_service(App::new().app_data(state).configure(configure_routes)).await;

        let req = test::TestRequest::get()
            .uri("/webhooks?mode=subscribe&verify_token=hunter22&challenge=1158201444")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert_eq!(body, "1158201444");
    }

    #[actix_web::test]
    async fn handshake_mismatch_is_forbidden() {
        let (store, state) = test_state(None);
        let app =
            test::init_service(App::new().app_data(state).configure(configure_routes)).await;

        let req = test::TestRequest::get()
            .uri("/webhooks?mode=subscribe&verify_token=wrong&challenge=x")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        // A failed handshake creates no state
        assert_eq!(store.event_count(), 0);
        assert_eq!(store.webhook_log_count(), 0);
    }

    #[actix_web::test]
    async fn post_always_answers_200() {
        let (store, state) = test_state(None);
        let app =
            test::init_service(App::new().app_data(state).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/webhooks")
            .set_payload("definitely not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(store.event_count(), 0);
    }

    #[actix_web::test]
    async fn post_with_valid_change_stores_event() {
        let (store, state) = test_state(None);
        let app =
            test::init_service(App::new().app_data(state).configure(configure_routes)).await;

        let body = json!({
            "entry": [{
                "id": "acct-1",
                "changes": [{
                    "field": "message_template_status_update",
                    "value": {
                        "event": "REJECTED",
                        "message_template_name": "order_update"
                    }
                }]
            }]
        });
        let req = test::TestRequest::post()
            .uri("/webhooks")
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(store.event_count(), 1);
    }

    #[actix_web::test]
    async fn post_with_bad_signature_is_unauthorized() {
        let (store, state) = test_state(Some("super-secret"));
        let app =
            test::init_service(App::new().app_data(state).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/webhooks")
            .insert_header((SIGNATURE_HEADER, "sha256=deadbeef"))
            .set_payload(r#"{"entry":[]}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(store.event_count(), 0);
        assert_eq!(store.webhook_log_count(), 0);
    }

    #[actix_web::test]
    async fn post_with_valid_signature_is_accepted() {
        let (_store, state) = test_state(Some("super-secret"));
        let app =
            test::init_service(App::new().app_data(state).configure(configure_routes)).await;

        let payload = r#"{"entry":[]}"#;
        let signature =
            verification::generate_hmac_signature(payload.as_bytes(), "super-secret").unwrap();
        let req = test::TestRequest::post()
            .uri("/webhooks")
            .insert_header((SIGNATURE_HEADER, signature))
            .set_payload(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    struct UnavailableStore;

    #[async_trait::async_trait]
    impl ComplianceStore for UnavailableStore {
        async fn create_compliance_event(
            &self,
            _event: template_gateway_core::models::ComplianceEvent,
        ) -> Result<template_gateway_core::models::ComplianceEvent, StoreError> {
            Err(StoreError::Backend("store offline".to_string()))
        }

        async fn resolve_compliance_event(
            &self,
            _id: uuid::Uuid,
        ) -> Result<template_gateway_core::models::ComplianceEvent, StoreError> {
            Err(StoreError::Backend("store offline".to_string()))
        }

        async fn find_template_by_account_and_name(
            &self,
            _account_id: &str,
            _name: &str,
        ) -> Result<Option<Template>, StoreError> {
            Err(StoreError::Backend("store offline".to_string()))
        }

        async fn update_template_by_account_and_name(
            &self,
            _account_id: &str,
            _name: &str,
            _update: template_gateway_core::models::TemplateUpdate,
        ) -> Result<Option<Template>, StoreError> {
            Err(StoreError::Backend("store offline".to_string()))
        }

        async fn create_webhook_log(
            &self,
            _log: template_gateway_core::models::NewWebhookLog,
        ) -> Result<template_gateway_core::models::WebhookLog, StoreError> {
            Err(StoreError::Backend("store offline".to_string()))
        }

        async fn mark_webhook_processed(
            &self,
            _id: uuid::Uuid,
            _error: Option<String>,
            _response_time_ms: u64,
        ) -> Result<(), StoreError> {
            Err(StoreError::Backend("store offline".to_string()))
        }

        async fn create_team_activity(
            &self,
            _activity: template_gateway_core::models::TeamActivity,
        ) -> Result<(), StoreError> {
            Err(StoreError::Backend("store offline".to_string()))
        }
    }

    #[actix_web::test]
    async fn post_with_failed_log_write_is_server_error() {
        let state = web::Data::new(AppState::new(
            Arc::new(UnavailableStore),
            WebhookConfig {
                verify_token: "hunter22".to_string(),
                app_secret: None,
            },
        ));
        let app =
            test::init_service(App::new().app_data(state).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/webhooks")
            .set_json(json!({ "entry": [] }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        // Nothing was logged, so the provider must redeliver
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn health_reports_connections() {
        let (_store, state) = test_state(None);
        let app =
            test::init_service(App::new().app_data(state).configure(configure_routes)).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["connections"], 0);
    }
}
