use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use tower::ServiceExt;

use slotbook::config::AppConfig;
use slotbook::db::{self, queries};
use slotbook::handlers::webhook::sign_payload;
use slotbook::models::{
    AvailabilityWindow, BookableType, Business, Money, Package, Resource, ScheduleScope,
    TimeWindow,
};
use slotbook::services::payments::{PaymentGateway, PaymentSession, SessionRequest};
use slotbook::state::AppState;

// ── Mock Gateway ──

struct MockGateway {
    fail: bool,
    sessions: Arc<Mutex<Vec<SessionRequest>>>,
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_session(&self, request: &SessionRequest) -> anyhow::Result<PaymentSession> {
        if self.fail {
            anyhow::bail!("provider timed out");
        }
        self.sessions.lock().unwrap().push(request.clone());
        let session_id = format!("cs_test_{}", self.sessions.lock().unwrap().len());
        Ok(PaymentSession {
            checkout_url: format!("https://pay.test/{session_id}"),
            session_id,
        })
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        admin_token: "test-token".to_string(),
        payment_provider: "mock".to_string(),
        stripe_secret_key: "".to_string(),
        stripe_webhook_secret: "".to_string(), // empty = skip signature validation
        stripe_api_base: "http://127.0.0.1:9".to_string(),
        currency: "usd".to_string(),
        public_base_url: "http://localhost:3000".to_string(),
        hold_ttl_minutes: 15,
        hold_sweep_interval_secs: 30,
        pending_grace_minutes: 10,
        max_query_days: 62,
        business_utc_offset_minutes: 0,
        booking_number_prefix: "BK".to_string(),
    }
}

/// One spa with a treatment room open Mon-Fri 09:00-17:00, a 60 minute
/// massage (150.00, 33% deposit) and a free 60 minute consultation.
fn seed(conn: &rusqlite::Connection) {
    queries::insert_business(conn, &Business { id: "spa".into(), name: "Spa".into() }).unwrap();
    queries::insert_resource(
        conn,
        &Resource {
            id: "room-a".into(),
            business_id: "spa".into(),
            name: "Room A".into(),
            kind: "room".into(),
            is_active: true,
        },
    )
    .unwrap();
    queries::insert_bookable_type(
        conn,
        &BookableType {
            id: "massage".into(),
            business_id: "spa".into(),
            name: "Massage".into(),
            deposit_percentage: Some(33.0),
            deposit_fixed: Some(Money::from_cents(2000)),
            hourly_rate: Some(Money::from_cents(12000)),
        },
    )
    .unwrap();
    queries::link_resource_type(conn, "room-a", "massage").unwrap();
    for (id, name, price) in [("swedish-60", "Swedish 60", 15000), ("consult-60", "Consultation", 0)] {
        queries::insert_package(
            conn,
            &Package {
                id: id.into(),
                bookable_type_id: "massage".into(),
                name: name.into(),
                duration_minutes: 60,
                price: Money::from_cents(price),
                member_price: None,
                is_active: true,
            },
        )
        .unwrap();
    }
    for (i, weekday) in [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
        .into_iter()
        .enumerate()
    {
        queries::insert_window(
            conn,
            &AvailabilityWindow {
                id: format!("win-{i}"),
                scope: ScheduleScope::Resource,
                scope_id: "room-a".into(),
                weekday,
                window: TimeWindow::parse("09:00", "17:00").unwrap(),
            },
        )
        .unwrap();
    }
}

fn build_state(config: AppConfig, fail: bool) -> (Arc<AppState>, Arc<Mutex<Vec<SessionRequest>>>) {
    let conn = db::init_db(":memory:").unwrap();
    seed(&conn);
    let sessions = Arc::new(Mutex::new(vec![]));
    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config,
        payments: Box::new(MockGateway {
            fail,
            sessions: Arc::clone(&sessions),
        }),
    });
    (state, sessions)
}

fn test_state() -> Arc<AppState> {
    build_state(test_config(), false).0
}

fn test_app(state: Arc<AppState>) -> Router {
    slotbook::app(state)
}

fn next_monday() -> NaiveDate {
    let mut date = Utc::now().date_naive() + Duration::days(1);
    while date.weekday() != Weekday::Mon {
        date += Duration::days(1);
    }
    date
}

fn at(date: NaiveDate, time: &str) -> String {
    format!("{}T{time}:00", date.format("%Y-%m-%d"))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn admin_get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("Authorization", "Bearer test-token")
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn admin_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("Authorization", "Bearer test-token")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let res = test_app(state.clone()).oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn checkout_body(package_id: &str, start: &str, end: &str, email: &str) -> serde_json::Value {
    serde_json::json!({
        "resource_id": "room-a",
        "start": start,
        "end": end,
        "offering": {"kind": "package", "package_id": package_id},
        "customer": {"name": "Dana Reyes", "email": email, "phone": "+1 (555) 010-2000"}
    })
}

fn completed_event(session_id: &str) -> String {
    serde_json::json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": session_id,
            "payment_status": "paid",
            "metadata": {"booking_id": serde_json::Value::Null}
        }}
    })
    .to_string()
}

fn webhook(body: String, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook/payments")
        .header("Content-Type", "application/json");
    if let Some(sig) = signature {
        builder = builder.header("Stripe-Signature", sig);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn slot_starts(state: &Arc<AppState>, date: NaiveDate) -> Vec<String> {
    let (status, json) = send(
        state,
        get(&format!(
            "/api/slots?resource_id=room-a&from={date}&to={date}&duration_minutes=60"
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json["slots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["start"].as_str().unwrap().to_string())
        .collect()
}

// ── Health Check ──

#[tokio::test]
async fn test_health() {
    let state = test_state();
    let (status, json) = send(&state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

// ── Slot Query Tests ──

#[tokio::test]
async fn test_slots_follow_weekly_template() {
    let state = test_state();
    let monday = next_monday();

    let starts = slot_starts(&state, monday).await;
    assert_eq!(starts.len(), 8);
    assert_eq!(starts[0], at(monday, "09:00"));
    assert_eq!(starts[7], at(monday, "16:00"));
}

#[tokio::test]
async fn test_slots_by_bookable_type_report_days() {
    let state = test_state();
    let monday = next_monday();
    let sunday = monday + Duration::days(6);

    let (status, json) = send(
        &state,
        get(&format!(
            "/api/slots?bookable_type_id=massage&from={monday}&to={sunday}&duration_minutes=90&step_minutes=30"
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["days"][monday.to_string()], true);
    assert_eq!(json["days"][sunday.to_string()], false);
    assert!(json["slots"]
        .as_array()
        .unwrap()
        .iter()
        .all(|s| s["resource_id"] == "room-a"));
}

#[tokio::test]
async fn test_slots_reject_bad_queries() {
    let state = test_state();
    let monday = next_monday();

    let (status, _) = send(
        &state,
        get(&format!("/api/slots?from={monday}&to={monday}&duration_minutes=60")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let far = monday + Duration::days(120);
    let (status, _) = send(
        &state,
        get(&format!(
            "/api/slots?resource_id=room-a&from={monday}&to={far}&duration_minutes=60"
        )),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &state,
        get(&format!(
            "/api/slots?resource_id=missing&from={monday}&to={monday}&duration_minutes=60"
        )),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Hold Tests ──

#[tokio::test]
async fn test_hold_blocks_overlapping_hold_until_released() {
    let state = test_state();
    let monday = next_monday();

    let (status, hold) = send(
        &state,
        post_json(
            "/api/holds",
            serde_json::json!({"resource_id": "room-a", "start": at(monday, "10:00"), "end": at(monday, "11:00")}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(hold["status"], "active");
    assert!(!slot_starts(&state, monday).await.contains(&at(monday, "10:00")));

    let (status, _) = send(
        &state,
        post_json(
            "/api/holds",
            serde_json::json!({"resource_id": "room-a", "start": at(monday, "10:30"), "end": at(monday, "11:30")}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let id = hold["id"].as_str().unwrap();
    let release = || {
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/holds/{id}"))
            .body(Body::empty())
            .unwrap()
    };
    let (status, json) = send(&state, release()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["resolution"], "applied");

    let (_, json) = send(&state, release()).await;
    assert_eq!(json["resolution"], "already_resolved");
    assert!(slot_starts(&state, monday).await.contains(&at(monday, "10:00")));
}

#[tokio::test]
async fn test_hold_must_cover_a_bookable_slot() {
    let state = test_state();
    let monday = next_monday();
    let year_later = monday + Duration::days(365);

    let (status, _) = send(
        &state,
        post_json(
            "/api/holds",
            serde_json::json!({"resource_id": "room-a", "start": at(monday, "00:00"), "end": at(year_later, "00:00")}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &state,
        post_json(
            "/api/holds",
            serde_json::json!({"resource_id": "room-a", "start": at(monday, "18:00"), "end": at(monday, "19:00")}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &state,
        post_json(
            "/api/holds",
            serde_json::json!({"resource_id": "room-a", "start": at(monday, "10:00"), "end": at(monday, "11:00")}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

// ── Checkout Tests ──

#[tokio::test]
async fn test_free_checkout_confirms_immediately() {
    let state = test_state();
    let monday = next_monday();

    let (status, json) = send(
        &state,
        post_json(
            "/api/checkout",
            checkout_body("consult-60", &at(monday, "09:00"), &at(monday, "10:00"), "dana@example.com"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "confirmed");
    assert!(json["booking_number"].as_str().unwrap().starts_with("BK-"));

    let id = json["booking_id"].as_str().unwrap();
    let (status, booking) = send(&state, get(&format!("/api/bookings/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["status"], "confirmed");
    assert_eq!(booking["deposit"], 0);
    assert!(booking["payment_status"].is_null());
}

#[tokio::test]
async fn test_paid_checkout_redirects_then_webhook_confirms() {
    let (state, sessions) = build_state(test_config(), false);
    let monday = next_monday();

    let (status, json) = send(
        &state,
        post_json(
            "/api/checkout",
            checkout_body("swedish-60", &at(monday, "14:00"), &at(monday, "15:00"), "dana@example.com"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "redirect");
    let booking_id = json["booking_id"].as_str().unwrap().to_string();
    let session_id = json["redirect_url"]
        .as_str()
        .unwrap()
        .strip_prefix("https://pay.test/")
        .unwrap()
        .to_string();

    {
        let requests = sessions.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].amount, Money::from_cents(4950));
        assert_eq!(requests[0].booking_id, booking_id);
    }

    let (status, booking) = send(&state, get(&format!("/api/bookings/{booking_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["status"], "pending");
    assert_eq!(booking["balance_due"], 10050);
    assert_eq!(booking["payment_status"], "pending");

    let (status, json) = send(&state, webhook(completed_event(&session_id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "confirmed");

    let (status, json) = send(&state, webhook(completed_event(&session_id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "already_resolved");

    let (_, booking) = send(&state, get(&format!("/api/bookings/{booking_id}"))).await;
    assert_eq!(booking["status"], "confirmed");
    assert_eq!(booking["payment_status"], "succeeded");
    assert!(!slot_starts(&state, monday).await.contains(&at(monday, "14:00")));
}

#[tokio::test]
async fn test_second_customer_gets_conflict() {
    let state = test_state();
    let monday = next_monday();

    let (status, _) = send(
        &state,
        post_json(
            "/api/checkout",
            checkout_body("swedish-60", &at(monday, "11:00"), &at(monday, "12:00"), "dana@example.com"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(
        &state,
        post_json(
            "/api/checkout",
            checkout_body("swedish-60", &at(monday, "11:00"), &at(monday, "12:00"), "lee@example.com"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("slot unavailable"));
}

#[tokio::test]
async fn test_gateway_failure_frees_slot() {
    let (state, _) = build_state(test_config(), true);
    let monday = next_monday();

    let (status, _) = send(
        &state,
        post_json(
            "/api/checkout",
            checkout_body("swedish-60", &at(monday, "10:00"), &at(monday, "11:00"), "dana@example.com"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    assert!(slot_starts(&state, monday).await.contains(&at(monday, "10:00")));

    let (_, bookings) = send(&state, admin_get("/api/admin/bookings?status=cancelled")).await;
    assert_eq!(bookings.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_abandon_releases_slot() {
    let state = test_state();
    let monday = next_monday();

    let (_, json) = send(
        &state,
        post_json(
            "/api/checkout",
            checkout_body("swedish-60", &at(monday, "13:00"), &at(monday, "14:00"), "dana@example.com"),
        ),
    )
    .await;
    let id = json["booking_id"].as_str().unwrap();

    let (status, json) = send(&state, post_json(&format!("/api/checkout/{id}/abandon"), serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["resolution"], "applied");
    assert!(slot_starts(&state, monday).await.contains(&at(monday, "13:00")));

    let (status, json) = send(&state, post_json(&format!("/api/checkout/{id}/abandon"), serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["resolution"], "already_resolved");
}

#[tokio::test]
async fn test_checkout_validation_errors() {
    let state = test_state();
    let monday = next_monday();

    let (status, json) = send(
        &state,
        post_json(
            "/api/checkout",
            checkout_body("swedish-60", &at(monday, "10:00"), &at(monday, "11:00"), "not-an-email"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("email"));

    let (status, _) = send(
        &state,
        post_json(
            "/api/checkout",
            checkout_body("swedish-60", &at(monday, "18:00"), &at(monday, "19:00"), "dana@example.com"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&state, get("/api/bookings/does-not-exist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Webhook Tests ──

#[tokio::test]
async fn test_webhook_signature_checked_when_secret_set() {
    let mut config = test_config();
    config.stripe_webhook_secret = "whsec_test".to_string();
    let (state, _) = build_state(config, false);
    let monday = next_monday();

    let (_, json) = send(
        &state,
        post_json(
            "/api/checkout",
            checkout_body("swedish-60", &at(monday, "15:00"), &at(monday, "16:00"), "dana@example.com"),
        ),
    )
    .await;
    let session_id = json["redirect_url"]
        .as_str()
        .unwrap()
        .strip_prefix("https://pay.test/")
        .unwrap()
        .to_string();
    let body = completed_event(&session_id);

    let (status, _) = send(&state, webhook(body.clone(), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&state, webhook(body.clone(), Some("t=1,v1=00".to_string()))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let t = Utc::now().timestamp();
    let sig = sign_payload("whsec_test", t, &body).unwrap();
    let (status, json) = send(&state, webhook(body, Some(format!("t={t},v1={sig}")))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "confirmed");
}

#[tokio::test]
async fn test_webhook_unknown_session_and_ignored_events() {
    let state = test_state();

    let (status, _) = send(&state, webhook(completed_event("cs_unknown"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let other = serde_json::json!({"id": "evt_2", "type": "customer.created", "data": {"object": {}}});
    let (status, json) = send(&state, webhook(other.to_string(), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["received"], true);
    assert!(json["outcome"].is_null());
}

// ── Admin API Tests ──

#[tokio::test]
async fn test_admin_requires_auth() {
    let state = test_state();

    let (status, _) = send(&state, get("/api/admin/bookings")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/api/admin/bookings")
        .header("Authorization", "Bearer wrong-token")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&state, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_force_book_reschedule_cancel() {
    let state = test_state();
    let monday = next_monday();

    let (status, booking) = send(
        &state,
        admin_post(
            "/api/admin/bookings",
            serde_json::json!({
                "resource_id": "room-a",
                "bookable_type_id": "massage",
                "start": at(monday, "08:00"),
                "end": at(monday, "09:00"),
                "customer": {"name": "Early Bird", "email": "early@example.com", "phone": "5550102000"},
                "notes": "before opening"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "confirmed");
    assert_eq!(booking["total"], 12000);
    let id = booking["id"].as_str().unwrap().to_string();

    let (_, bookings) = send(&state, admin_get("/api/admin/bookings")).await;
    assert_eq!(bookings.as_array().unwrap().len(), 1);

    let (status, moved) = send(
        &state,
        admin_post(
            &format!("/api/admin/bookings/{id}/reschedule"),
            serde_json::json!({"start": at(monday, "12:00"), "end": at(monday, "13:00")}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["status"], "rescheduled");
    assert!(!slot_starts(&state, monday).await.contains(&at(monday, "12:00")));

    let (status, json) = send(&state, admin_post(&format!("/api/admin/bookings/{id}/cancel"), serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["resolution"], "applied");
    assert!(slot_starts(&state, monday).await.contains(&at(monday, "12:00")));

    let (status, _) = send(
        &state,
        admin_post(
            &format!("/api/admin/bookings/{id}/reschedule"),
            serde_json::json!({"start": at(monday, "14:00"), "end": at(monday, "15:00")}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&state, admin_post(&format!("/api/admin/bookings/{id}/complete"), serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_admin_schedule_writes() {
    let state = test_state();
    let monday = next_monday();
    let saturday = monday + Duration::days(5);

    // Saturday has no template yet
    assert!(slot_starts(&state, saturday).await.is_empty());

    let (status, _) = send(
        &state,
        admin_post(
            "/api/admin/windows",
            serde_json::json!({"scope": "resource", "scope_id": "room-a", "weekday": "sat", "start": "10:00", "end": "12:00"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(slot_starts(&state, saturday).await.len(), 2);

    let (status, _) = send(
        &state,
        admin_post(
            "/api/admin/windows",
            serde_json::json!({"scope": "resource", "scope_id": "room-a", "weekday": "sat", "start": "11:00", "end": "13:00"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Full-day override closes Monday
    let (status, _) = send(
        &state,
        admin_post(
            "/api/admin/overrides",
            serde_json::json!({"scope": "resource", "scope_id": "room-a", "date": monday, "is_unavailable": true}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(slot_starts(&state, monday).await.is_empty());

    // Replacing it with a short window reopens part of the day
    let (status, _) = send(
        &state,
        admin_post(
            "/api/admin/overrides",
            serde_json::json!({"scope": "resource", "scope_id": "room-a", "date": monday, "windows": [{"start": "13:00", "end": "15:00"}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slot_starts(&state, monday).await, vec![at(monday, "13:00"), at(monday, "14:00")]);

    let (status, _) = send(
        &state,
        admin_post(
            "/api/admin/overrides",
            serde_json::json!({"scope": "resource", "scope_id": "room-a", "date": monday, "is_unavailable": true, "windows": [{"start": "13:00", "end": "15:00"}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let tuesday = monday + Duration::days(1);
    let (status, _) = send(
        &state,
        admin_post(
            "/api/admin/blackouts",
            serde_json::json!({
                "business_id": "spa",
                "starts_at": at(tuesday, "00:00"),
                "ends_at": at(tuesday, "12:00"),
                "kind": "hard",
                "reason": "staff training"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let starts = slot_starts(&state, tuesday).await;
    assert_eq!(starts.first(), Some(&at(tuesday, "12:00")));
}

#[tokio::test]
async fn test_request_only_blackout_needs_approval() {
    let (state, sessions) = build_state(test_config(), false);
    let monday = next_monday();

    let (status, _) = send(
        &state,
        admin_post(
            "/api/admin/blackouts",
            serde_json::json!({
                "business_id": "spa",
                "resource_id": "room-a",
                "starts_at": at(monday, "09:00"),
                "ends_at": at(monday, "17:00"),
                "kind": "request_only"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, slots) = send(
        &state,
        get(&format!("/api/slots?resource_id=room-a&from={monday}&to={monday}&duration_minutes=60")),
    )
    .await;
    assert!(slots["slots"].as_array().unwrap().iter().all(|s| s["requires_approval"] == true));

    let (status, json) = send(
        &state,
        post_json(
            "/api/checkout",
            checkout_body("swedish-60", &at(monday, "10:00"), &at(monday, "11:00"), "dana@example.com"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "awaiting_approval");
    assert!(sessions.lock().unwrap().is_empty());

    let id = json["booking_id"].as_str().unwrap();
    let (status, _) = send(&state, admin_post(&format!("/api/admin/bookings/{id}/approve"), serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, booking) = send(&state, get(&format!("/api/bookings/{id}"))).await;
    assert_eq!(booking["status"], "confirmed");
}
