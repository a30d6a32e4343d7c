use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, NaiveDate};
use labflow::auth::{Role, StaticSession};
use labflow::client::{AllocationApi, AllocationStatusClient};
use labflow::errors::ClientError;
use labflow::models::ItemKind;
use labflow::services::DateWindowEvaluator;
use labflow::view::{DialogScope, ExperimentGate, RequestAllocationView};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn day(offset: i64) -> String {
    format!("{}T09:00:00.000Z", today() + Duration::days(offset))
}

fn request_body() -> Value {
    json!({
        "_id": "r1",
        "status": "approved",
        "experiments": [
            {
                "experimentId": "e-open",
                "experimentName": "Titration",
                "date": day(1),
                "chemicals": [
                    { "_id": "c1", "name": "NaOH", "quantity": 5, "allocatedQuantity": 2 },
                    { "_id": "c2", "name": "HCl", "quantity": 1, "isDisabled": true, "disabledReason": "Out of stock" }
                ],
                "glassware": [],
                "equipment": []
            },
            {
                "experimentId": "e-late",
                "experimentName": "Distillation",
                "date": day(-7),
                "chemicals": [
                    { "_id": "c3", "name": "Ethanol", "quantity": 2 }
                ]
            }
        ]
    })
}

async fn mount_request(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/requests/r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(request_body()))
        .mount(server)
        .await;
}

async fn load_view(server: &MockServer, role: Role) -> RequestAllocationView {
    let base = Url::parse(&format!("{}/api/", server.uri())).unwrap();
    let client = AllocationStatusClient::from_parts(
        base,
        std::time::Duration::from_secs(5),
        Arc::new(StaticSession::new("token")),
    )
    .unwrap();
    let api: Arc<dyn AllocationApi> = Arc::new(client);
    RequestAllocationView::load(api, DateWindowEvaluator::fixed(today()), role, "r1")
        .await
        .unwrap()
}

#[tokio::test]
async fn late_experiment_is_left_out_of_allocate_remaining() {
    let server = MockServer::start().await;
    mount_request(&server).await;
    Mock::given(method("PUT"))
        .and(path("/api/requests/r1/allocate-unified"))
        .and(body_json(json!({
            "chemicals": [
                { "experimentId": "e-open", "itemId": "c1", "name": "NaOH", "quantity": 3.0 }
            ],
            "glassware": [],
            "equipment": []
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Allocated" })))
        .expect(1)
        .mount(&server)
        .await;

    let view = load_view(&server, Role::LabAssistant).await;
    assert_eq!(view.gate("e-open").unwrap(), ExperimentGate::Valid { days_remaining: 1 });
    assert_eq!(view.gate("e-late").unwrap(), ExperimentGate::Blocked { days_overdue: 7 });

    let result = view.allocate_remaining().await.unwrap();
    assert_eq!(result.message, "Allocated");
}

#[tokio::test]
async fn override_opens_late_experiment_until_disabled() {
    let server = MockServer::start().await;
    mount_request(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/requests/r1/experiments/e-late/admin-override"))
        .and(body_json(json!({ "enable": true, "reason": "Rescheduled lab" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Admin override enabled",
            "adminOverride": { "enabled": true, "reason": "Rescheduled lab", "createdBy": "admin-1" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/requests/r1/experiments/e-late/admin-override"))
        .and(body_json(json!({ "enable": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Admin override disabled" })))
        .expect(1)
        .mount(&server)
        .await;

    let view = load_view(&server, Role::Admin).await;
    let gate = view.enable_override("e-late", "Rescheduled lab").await.unwrap();
    assert_matches!(gate, ExperimentGate::OverrideActive { ref reason, .. } if reason == "Rescheduled lab");

    let payload = view.remaining_payload().unwrap();
    assert!(payload.iter().any(|(_, line)| line.item_id == "c3"));

    let gate = view.disable_override("e-late", None).await.unwrap();
    assert_eq!(gate, ExperimentGate::Blocked { days_overdue: 7 });
    assert!(view.remaining_payload().unwrap().iter().all(|(_, line)| line.item_id != "c3"));
}

#[tokio::test]
async fn server_rejection_keeps_local_state() {
    let server = MockServer::start().await;
    mount_request(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/requests/r1/experiments/e-late/admin-override"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "message": "Only admins can override dates"
        })))
        .mount(&server)
        .await;

    let view = load_view(&server, Role::Admin).await;
    let err = view.enable_override("e-late", "Rescheduled lab").await.unwrap_err();
    assert_eq!(err.response_message(), "Only admins can override dates");
    assert_eq!(view.gate("e-late").unwrap(), ExperimentGate::Blocked { days_overdue: 7 });
    assert!(view.in_flight().is_empty());
}

#[tokio::test]
async fn closed_dialog_drops_late_result() {
    let server = MockServer::start().await;
    mount_request(&server).await;
    Mock::given(method("PUT"))
        .and(path("/api/requests/r1/allocate-unified"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "message": "Allocated" }))
                .set_delay(std::time::Duration::from_millis(100)),
        )
        .mount(&server)
        .await;

    let view = load_view(&server, Role::LabAssistant).await;
    let dialog = DialogScope::open("allocate-remaining");
    let closer = dialog.clone();

    let (outcome, _) = tokio::join!(dialog.settle(view.allocate_remaining()), async move {
        closer.close();
    });
    assert!(outcome.is_none());

    // The allocation itself went through; only the dialog's copy of the result is gone.
    let snapshot = view.request();
    let c1 = snapshot.experiments[0]
        .find_item(ItemKind::Chemical, "c1")
        .unwrap();
    assert_eq!(c1.allocated_quantity, dec!(5));
    assert!(c1.is_allocated);
}

#[tokio::test]
async fn unparseable_date_surfaces_for_that_experiment_only() {
    let server = MockServer::start().await;
    let mut body = request_body();
    body["experiments"][1]["date"] = json!("Invalid Date");
    Mock::given(method("GET"))
        .and(path("/api/requests/r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let view = load_view(&server, Role::Admin).await;
    assert!(view.gate("e-open").is_ok());
    assert_matches!(view.gate("e-late"), Err(ClientError::InvalidDate(_)));

    let views = view.gate_views();
    assert!(views[0].is_ok());
    assert_matches!(&views[1], Err(ClientError::InvalidDate(_)));

    let payload = view.remaining_payload().unwrap();
    let ids: Vec<&str> = payload.iter().map(|(_, line)| line.item_id.as_str()).collect();
    assert_eq!(ids, vec!["c1"]);
}

#[tokio::test]
async fn allocation_proceeds_around_unparseable_date() {
    let server = MockServer::start().await;
    let mut body = request_body();
    body["experiments"][1]["date"] = json!("Invalid Date");
    Mock::given(method("GET"))
        .and(path("/api/requests/r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/requests/r1/allocate-unified"))
        .and(body_json(json!({
            "chemicals": [
                { "experimentId": "e-open", "itemId": "c1", "name": "NaOH", "quantity": 3.0 }
            ],
            "glassware": [],
            "equipment": []
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Allocated" })))
        .expect(1)
        .mount(&server)
        .await;

    let view = load_view(&server, Role::LabAssistant).await;
    let result = view.allocate_remaining().await.unwrap();
    assert_eq!(result.message, "Allocated");
}
