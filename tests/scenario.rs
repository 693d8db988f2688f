//! End-to-end booking scenario over the HTTP router, with notifications
//! delivered by the real background task.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use vetcare_lib::api::api_router;
use vetcare_lib::core_state::CoreState;
use vetcare_lib::db;
use vetcare_lib::identity;
use vetcare_lib::models::enums::{RiskLevel, Role};
use vetcare_lib::models::{Pet, User};
use vetcare_lib::notify::{self, NotificationDispatcher};
use vetcare_lib::scheduler::ConflictPolicy;
use vetcare_lib::triage::{Classifier, KeywordClassifier};

fn seed(conn: &rusqlite::Connection) {
    for (id, name, role) in [
        ("T", "Tutora T", Role::Tutor),
        ("T2", "Outro Tutor", Role::Tutor),
        ("V", "Dr. V", Role::Veterinarian),
    ] {
        db::insert_user(
            conn,
            &User {
                id: id.into(),
                name: name.into(),
                role,
            },
        )
        .unwrap();
    }
    db::insert_pet(
        conn,
        &Pet {
            id: "P".into(),
            name: "Pipoca".into(),
            species: None,
            owner_id: "T".into(),
        },
    )
    .unwrap();
    db::insert_pet(
        conn,
        &Pet {
            id: "P2".into(),
            name: "Bolt".into(),
            species: None,
            owner_id: "T2".into(),
        },
    )
    .unwrap();
}

fn request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"));
    match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::http::Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 65536).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn book_conflict_confirm_notify() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("scenario.db");

    let (tutor, other_tutor, vet) = {
        let conn = db::open_database(&path).unwrap();
        seed(&conn);
        (
            identity::issue_token(&conn, "T").unwrap(),
            identity::issue_token(&conn, "T2").unwrap(),
            identity::issue_token(&conn, "V").unwrap(),
        )
    };

    let (dispatcher, rx) = NotificationDispatcher::channel();
    let delivery = notify::spawn_delivery(rx, path.clone());
    let core = Arc::new(CoreState::new(
        path.clone(),
        ConflictPolicy::default(),
        Arc::new(dispatcher),
    ));
    let app = api_router(core.clone());

    // T books V for 10:00.
    let booking = json!({"pet_id": "P", "vet_id": "V", "scheduled_at": "2025-03-01T10:00:00"});
    let response = app
        .clone()
        .oneshot(request("POST", "/api/appointments", &tutor, Some(booking)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    assert_eq!(created["status"], "PENDING");
    assert_eq!(created["tutor_id"], "T");
    let id = created["id"].as_str().unwrap().to_string();

    // Same vet, same instant, different tutor.
    let clash = json!({"pet_id": "P2", "vet_id": "V", "scheduled_at": "2025-03-01T10:00:00"});
    let response = app
        .clone()
        .oneshot(request("POST", "/api/appointments", &other_tutor, Some(clash)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["code"], "SLOT_CONFLICT");

    // The booking notices are written before we take the baseline count.
    let conn = db::open_database(&path).unwrap();
    let mut before = 0;
    for _ in 0..100 {
        before = db::list_notifications_for(&conn, "T").unwrap().len();
        if before == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(before, 1);

    // V confirms.
    let response = app
        .clone()
        .oneshot(request("PATCH", &format!("/api/appointments/{id}/confirm"), &vet, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "CONFIRMED");

    // Close the queue and wait for delivery to drain.
    drop(app);
    drop(core);
    delivery.finish().await;

    let after = db::list_notifications_for(&conn, "T").unwrap();
    assert_eq!(after.len(), before + 1);
    assert!(after.iter().any(|n| n.title == "Consulta confirmada"));
}

#[test]
fn triage_examples_are_deterministic() {
    let classifier = KeywordClassifier::new();
    for (text, expected) in [
        ("animal teve convulsão", RiskLevel::High),
        ("não está comendo bem", RiskLevel::Medium),
        ("brincando normalmente", RiskLevel::Low),
    ] {
        let first = classifier.classify(text);
        assert_eq!(first.risk_level, expected, "{text}");
        assert_eq!(classifier.classify(text), first);
    }
}
