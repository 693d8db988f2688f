//! HTTP API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Rate limiter → 2. Auth validator → 3. Audit logger

use std::sync::Arc;

use axum::routing::{get, patch};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router with the default rate limit.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

/// Build router from pre-constructed `ApiContext`.
pub fn api_router_with_ctx(ctx: ApiContext) -> Router {
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    // Protected routes: require auth + full middleware stack
    //
    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension (outermost) → Rate limit → Auth → Audit (innermost) → Handler
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route(
            "/appointments",
            get(endpoints::appointments::list).post(endpoints::appointments::create),
        )
        .route("/appointments/:id", get(endpoints::appointments::get))
        .route(
            "/appointments/:id/confirm",
            patch(endpoints::appointments::confirm),
        )
        .route(
            "/appointments/:id/cancel",
            patch(endpoints::appointments::cancel),
        )
        .route(
            "/appointments/:id/complete",
            patch(endpoints::appointments::complete),
        )
        .route(
            "/triage",
            get(endpoints::triage::list).post(endpoints::triage::create),
        )
        .route("/notifications", get(endpoints::notifications::list))
        .route(
            "/notifications/read-all",
            patch(endpoints::notifications::mark_all_read),
        )
        .route(
            "/notifications/:id/read",
            patch(endpoints::notifications::mark_read),
        )
        .with_state(ctx.clone())
        // Middleware stack (innermost first, outermost last):
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    // Unprotected routes (audited, no auth required)
    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use crate::db::repository::fixtures::*;
    use crate::identity;
    use crate::models::Notice;
    use crate::notify::{self, NotificationDispatcher};
    use crate::scheduler::ConflictPolicy;

    struct Harness {
        core: Arc<CoreState>,
        rx: mpsc::UnboundedReceiver<Notice>,
        tutor: String,
        other_tutor: String,
        vet: String,
        other_vet: String,
        _tmp: tempfile::TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let path = tmp.path().join("api.db");
            let (dispatcher, rx) = NotificationDispatcher::channel();
            let core = Arc::new(CoreState::new(
                path,
                ConflictPolicy::default(),
                Arc::new(dispatcher),
            ));
            let conn = core.open_db().unwrap();
            seed_directory(&conn);
            let issue = |user: &str| identity::issue_token(&conn, user).unwrap();
            Self {
                tutor: issue(TUTOR),
                other_tutor: issue(OTHER_TUTOR),
                vet: issue(VET),
                other_vet: issue(OTHER_VET),
                core,
                rx,
                _tmp: tmp,
            }
        }

        fn app(&self) -> Router {
            api_router(self.core.clone())
        }

        /// Persist queued notices the way the delivery task would.
        fn flush_notices(&mut self) -> usize {
            let conn = self.core.open_db().unwrap();
            let mut n = 0;
            while let Ok(notice) = self.rx.try_recv() {
                notify::deliver(&conn, &notice).unwrap();
                n += 1;
            }
            n
        }
    }

    fn make_request(method: &str, uri: &str, token: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn response_json(response: axum::http::Response<Body>) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 65536)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn book(h: &Harness, token: &str, pet: &str, vet: &str, at: &str) -> axum::http::Response<Body> {
        h.app()
            .oneshot(make_request(
                "POST",
                "/api/appointments",
                Some(token),
                Some(serde_json::json!({
                    "pet_id": pet,
                    "vet_id": vet,
                    "scheduled_at": at,
                    "reason": "check-up",
                })),
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let h = Harness::new();
        let response = h
            .app()
            .oneshot(make_request("GET", "/api/health", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["conflict_policy"], "overlap(30m)");
        assert!(json["version"].is_string());
    }

    #[tokio::test]
    async fn protected_routes_require_auth() {
        let h = Harness::new();
        for (method, uri) in [
            ("GET", "/api/appointments"),
            ("GET", "/api/notifications"),
            ("POST", "/api/triage"),
        ] {
            let response = h.app().oneshot(make_request(method, uri, None, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
        let response = h
            .app()
            .oneshot(make_request("GET", "/api/appointments", Some("bogus"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn repeated_bad_credentials_lock_out_the_source() {
        use std::net::SocketAddr;

        use axum::extract::ConnectInfo;

        use crate::api::middleware::auth::UNKNOWN_SOURCE;

        let h = Harness::new();
        let ctx = ApiContext::new(h.core.clone());
        let app = api_router_with_ctx(ctx.clone());
        let from = |addr: &str, token: &str| {
            let mut req = make_request("GET", "/api/appointments", Some(token), None);
            let addr: SocketAddr = addr.parse().unwrap();
            req.extensions_mut().insert(ConnectInfo(addr));
            req
        };

        // Every guess is a different token; the peer stays the same.
        for i in 0..5 {
            let response = app
                .clone()
                .oneshot(from("10.0.0.7:5000", &format!("guess-{i:02}-abcdefghijklmnop")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
        assert!(ctx.auth_lockout.lock().unwrap().is_locked("peer:10.0.0.7"));

        // A valid credential from the locked peer is refused too, even on a new port.
        let response = app.clone().oneshot(from("10.0.0.7:5001", &h.tutor)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Other peers are unaffected.
        let response = app.clone().oneshot(from("10.0.0.8:5000", &h.tutor)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Without connection info all requests share one bucket.
        assert!(!ctx.auth_lockout.lock().unwrap().is_locked(UNKNOWN_SOURCE));
    }

    #[tokio::test]
    async fn booking_returns_201_with_names() {
        let mut h = Harness::new();
        let response = book(&h, &h.tutor, PET, VET, "2025-03-01T10:00:00").await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");

        let json = response_json(response).await;
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["pet_name"], "Thor");
        assert_eq!(json["tutor_name"], "Ana Souza");
        assert_eq!(json["vet_name"], "Dra. Carla Mendes");
        assert_eq!(json["tutor_id"], TUTOR);
        assert_eq!(h.flush_notices(), 2);
    }

    #[tokio::test]
    async fn booking_error_mapping() {
        let h = Harness::new();

        let response = book(&h, &h.tutor, PET, VET, "soon").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_json(response).await["error"]["code"], "VALIDATION_ERROR");

        let response = book(&h, &h.tutor, "ghost", VET, "2025-03-01T10:00:00").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = book(&h, &h.tutor, OTHER_PET, VET, "2025-03-01T10:00:00").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response_json(response).await["error"]["code"], "ACCESS_DENIED");

        let response = h
            .app()
            .oneshot(make_request(
                "POST",
                "/api/appointments",
                Some(&h.tutor),
                Some(serde_json::json!({"pet_id": 7})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        book(&h, &h.tutor, PET, VET, "2025-03-01T10:00:00").await;
        let response = book(&h, &h.vet, OTHER_PET, VET, "2025-03-01T10:15:00").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_json(response).await["error"]["code"], "SLOT_CONFLICT");
    }

    #[tokio::test]
    async fn confirm_cancel_flow() {
        let mut h = Harness::new();
        let created = response_json(book(&h, &h.tutor, PET, VET, "2025-03-01T10:00:00").await).await;
        let id = created["id"].as_str().unwrap().to_string();
        h.flush_notices();

        let uri = format!("/api/appointments/{id}/confirm");
        let response = h
            .app()
            .oneshot(make_request("PATCH", &uri, Some(&h.other_vet), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = h
            .app()
            .oneshot(make_request("PATCH", &uri, Some(&h.vet), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["status"], "CONFIRMED");

        let cancel = format!("/api/appointments/{id}/cancel");
        let response = h
            .app()
            .oneshot(make_request("PATCH", &cancel, Some(&h.tutor), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["status"], "CANCELLED");

        let response = h
            .app()
            .oneshot(make_request("PATCH", &uri, Some(&h.vet), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_json(response).await["error"]["code"], "INVALID_TRANSITION");

        // Confirmation notice to tutor, cancellation notice to vet.
        assert_eq!(h.flush_notices(), 2);
    }

    #[tokio::test]
    async fn complete_records_consultation() {
        let h = Harness::new();
        let created = response_json(book(&h, &h.tutor, PET, VET, "2025-03-01T10:00:00").await).await;
        let id = created["id"].as_str().unwrap();

        let response = h
            .app()
            .oneshot(make_request(
                "PATCH",
                &format!("/api/appointments/{id}/complete"),
                Some(&h.vet),
                Some(serde_json::json!({"diagnosis": "otite", "treatment": "gotas"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["appointment_id"], id);
        assert_eq!(json["diagnosis"], "otite");

        let response = h
            .app()
            .oneshot(make_request("GET", &format!("/api/appointments/{id}"), Some(&h.tutor), None))
            .await
            .unwrap();
        assert_eq!(response_json(response).await["status"], "COMPLETED");
    }

    #[tokio::test]
    async fn listing_is_scoped_and_sorted() {
        let h = Harness::new();
        book(&h, &h.tutor, PET, VET, "2025-03-01T10:00:00").await;
        book(&h, &h.tutor, PET, VET, "2025-03-05T10:00:00").await;

        let response = h
            .app()
            .oneshot(make_request("GET", "/api/appointments", Some(&h.tutor), None))
            .await
            .unwrap();
        let json = response_json(response).await;
        let list = json["appointments"].as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["scheduled_at"], "2025-03-05T10:00:00");

        let response = h
            .app()
            .oneshot(make_request("GET", "/api/appointments", Some(&h.other_tutor), None))
            .await
            .unwrap();
        let json = response_json(response).await;
        assert!(json["appointments"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn triage_create_and_history() {
        let mut h = Harness::new();
        let response = h
            .app()
            .oneshot(make_request(
                "POST",
                "/api/triage",
                Some(&h.tutor),
                Some(serde_json::json!({"pet_id": PET, "symptoms": "vômito, diarreia e febre"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = response_json(response).await;
        assert_eq!(json["risk_level"], "HIGH");
        assert_eq!(json["risk_label"], "Alto");
        assert_eq!(json["risk_notice_label"], "Urgente");
        assert_eq!(json["risk_code"], "urgent");
        assert_eq!(json["tutor_id"], TUTOR);
        assert!(json["ai_summary"].is_string());
        assert!(json["recommendations"].is_string());
        assert_eq!(h.flush_notices(), 1);

        let response = h
            .app()
            .oneshot(make_request(
                "POST",
                "/api/triage",
                Some(&h.other_tutor),
                Some(serde_json::json!({"pet_id": PET, "symptoms": "febre"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = h
            .app()
            .oneshot(make_request(
                "POST",
                "/api/triage",
                Some(&h.tutor),
                Some(serde_json::json!({"pet_id": PET, "symptoms": "   "})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = h
            .app()
            .oneshot(make_request(
                "GET",
                &format!("/api/triage?pet_id={PET}"),
                Some(&h.vet),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["results"].as_array().unwrap().len(), 1);
        assert_eq!(json["results"][0]["risk_code"], "urgent");

        // The tier filter accepts labels and legacy codes alike.
        for (risk, expected) in [("urgente", 1), ("ALTO", 1), ("monitor", 0), ("leve", 0)] {
            let response = h
                .app()
                .oneshot(make_request(
                    "GET",
                    &format!("/api/triage?pet_id={PET}&risk={risk}"),
                    Some(&h.tutor),
                    None,
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{risk}");
            let json = response_json(response).await;
            assert_eq!(json["results"].as_array().unwrap().len(), expected, "{risk}");
        }

        let response = h
            .app()
            .oneshot(make_request(
                "GET",
                &format!("/api/triage?pet_id={PET}&risk=critical"),
                Some(&h.tutor),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn notifications_inbox_and_marking() {
        let mut h = Harness::new();
        book(&h, &h.tutor, PET, VET, "2025-03-01T10:00:00").await;
        h.flush_notices();

        let response = h
            .app()
            .oneshot(make_request("GET", "/api/notifications", Some(&h.vet), None))
            .await
            .unwrap();
        let json = response_json(response).await;
        assert_eq!(json["unread"], 1);
        let notice = &json["notifications"][0];
        assert_eq!(notice["type"], "APPOINTMENT");
        assert_eq!(notice["read"], false);
        let id = notice["id"].as_str().unwrap().to_string();

        // The tutor cannot mark the vet's notification.
        let response = h
            .app()
            .oneshot(make_request(
                "PATCH",
                &format!("/api/notifications/{id}/read"),
                Some(&h.tutor),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = h
            .app()
            .oneshot(make_request(
                "PATCH",
                &format!("/api/notifications/{id}/read"),
                Some(&h.vet),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = h
            .app()
            .oneshot(make_request("PATCH", "/api/notifications/read-all", Some(&h.tutor), None))
            .await
            .unwrap();
        assert_eq!(response_json(response).await["updated"], 1);
    }

    #[tokio::test]
    async fn rate_limit_returns_429() {
        let h = Harness::new();
        let app = api_router_with_ctx(ApiContext::with_rate_limit(h.core.clone(), 2));
        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(make_request("GET", "/api/appointments", Some(&h.tutor), None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = app
            .oneshot(make_request("GET", "/api/appointments", Some(&h.tutor), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("Retry-After"));
    }

    #[tokio::test]
    async fn requests_are_audited() {
        let h = Harness::new();
        h.app()
            .oneshot(make_request("GET", "/api/appointments", Some(&h.tutor), None))
            .await
            .unwrap();
        let entries = h.core.audit_entries();
        let last = entries.last().unwrap();
        assert_eq!(last.user_id.as_deref(), Some(TUTOR));
        assert_eq!(last.action, "GET /api/appointments");
        assert_eq!(last.status, 200);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let h = Harness::new();
        let response = h
            .app()
            .oneshot(make_request("GET", "/api/nonexistent", Some(&h.tutor), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
