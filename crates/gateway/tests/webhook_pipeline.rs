//! End-to-end pipeline test: webhook POST in, compliance event stored, alert
//! delivered to a room subscriber.

use std::sync::Arc;
use std::time::Duration;

use actix::{Actor, Context, Handler};
use actix_web::{test, web, App};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;

use template_gateway::server::{configure_routes, AppState};
use template_gateway::ws::OutboundFrame;
use template_gateway_core::config::WebhookConfig;
use template_gateway_core::models::{Template, TemplateStatus};
use template_gateway_core::store::{ComplianceStore, MemoryStore};

struct Subscriber {
    frames: Arc<Mutex<Vec<String>>>,
}

impl Actor for Subscriber {
    type Context = Context<Self>;
}

impl Handler<OutboundFrame> for Subscriber {
    type Result = ();
    fn handle(&mut self, msg: OutboundFrame, _ctx: &mut Context<Self>) {
        if let OutboundFrame::Text(frame) = msg {
            self.frames.lock().push(frame);
        }
    }
}

#[actix_web::test]
async fn webhook_post_reaches_room_subscriber() {
    let store = MemoryStore::shared();
    store.insert_template(Template {
        id: "tpl-1".to_string(),
        account_id: "acct-1".to_string(),
        name: "order_update".to_string(),
        language: Some("en_US".to_string()),
        status: TemplateStatus::Pending,
        category: None,
        updated_at: Utc::now(),
    });

    let state = web::Data::new(AppState::new(
        Arc::clone(&store) as Arc<dyn ComplianceStore>,
        WebhookConfig {
            verify_token: "hunter22".to_string(),
            app_secret: None,
        },
    ));

    // Subscribe a connection to the template's room
    let frames = Arc::new(Mutex::new(Vec::new()));
    let addr = Subscriber {
        frames: Arc::clone(&frames),
    }
    .start();
    let conn = state.registry.register(addr.recipient());
    state.registry.join(conn, "template:tpl-1");

    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(configure_routes),
    )
    .await;

    let body = json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "acct-1",
            "changes": [{
                "field": "message_template_status_update",
                "value": {
                    "event": "REJECTED",
                    "message_template_name": "order_update",
                    "reason": "POLICY_VIOLATION"
                }
            }]
        }]
    });
    let req = test::TestRequest::post()
        .uri("/webhooks")
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    actix_rt::time::sleep(Duration::from_millis(30)).await;

    // Stored and classified
    let events = store.events_for_account("acct-1");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].template_id.as_deref(), Some("tpl-1"));

    // Delivered to the room (room broadcast plus the global feed)
    let frames = frames.lock();
    assert_eq!(frames.len(), 2);
    let alert: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
    assert_eq!(alert["type"], "compliance_alert");
    assert_eq!(alert["data"]["event"]["status"], "danger");
    assert_eq!(alert["data"]["event"]["severity"], "medium");
}
