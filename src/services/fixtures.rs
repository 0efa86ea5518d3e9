//! Shared seed data for service tests: one studio with a massage room open
//! 09:00-18:00 every day.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDateTime, Utc, Weekday};
use rusqlite::Connection;

use super::payments::{PaymentGateway, PaymentSession, SessionRequest};
use crate::config::AppConfig;
use crate::db::{self, queries};
use crate::models::{
    AvailabilityWindow, BlackoutDate, BlackoutKind, BookableType, Business, Money, Package,
    Resource, ScheduleScope, TimeWindow,
};
use crate::state::AppState;

pub const BUSINESS: &str = "studio";
pub const ROOM: &str = "room-1";
pub const MASSAGE: &str = "massage";
pub const PACKAGE_60: &str = "massage-60";
pub const PACKAGE_FREE: &str = "consult-60";

pub type Calls = Arc<Mutex<Vec<SessionRequest>>>;

#[derive(Default)]
pub struct MockGateway {
    calls: Calls,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_session(&self, request: &SessionRequest) -> anyhow::Result<PaymentSession> {
        let session_id = format!("cs_test_{}", uuid::Uuid::new_v4().simple());
        self.calls.lock().unwrap().push(request.clone());
        Ok(PaymentSession {
            checkout_url: format!("https://pay.test/{session_id}"),
            session_id,
        })
    }
}

pub struct FailingGateway;

#[async_trait]
impl PaymentGateway for FailingGateway {
    async fn create_session(&self, _request: &SessionRequest) -> anyhow::Result<PaymentSession> {
        anyhow::bail!("gateway unreachable")
    }
}

pub fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

/// `HH:MM` on the first Monday after today, as `YYYY-MM-DD HH:MM`.
pub fn next_monday_at(time: &str) -> String {
    let mut date = Utc::now().date_naive() + Duration::days(1);
    while date.weekday() != Weekday::Mon {
        date += Duration::days(1);
    }
    format!("{} {time}", date.format("%Y-%m-%d"))
}

pub fn test_config() -> AppConfig {
    AppConfig {
        port: 0,
        database_url: ":memory:".into(),
        admin_token: "test-token".into(),
        payment_provider: "mock".into(),
        stripe_secret_key: String::new(),
        stripe_webhook_secret: String::new(),
        stripe_api_base: "http://127.0.0.1:9".into(),
        currency: "usd".into(),
        public_base_url: "http://localhost:3000".into(),
        hold_ttl_minutes: 15,
        hold_sweep_interval_secs: 1,
        pending_grace_minutes: 10,
        max_query_days: 62,
        business_utc_offset_minutes: 0,
        booking_number_prefix: "BK".into(),
    }
}

pub fn seed_catalog(conn: &Connection) {
    queries::insert_business(conn, &Business { id: BUSINESS.into(), name: "Quiet Hands".into() }).unwrap();
    queries::insert_resource(
        conn,
        &Resource {
            id: ROOM.into(),
            business_id: BUSINESS.into(),
            name: "Room 1".into(),
            kind: "room".into(),
            is_active: true,
        },
    )
    .unwrap();
    queries::insert_bookable_type(
        conn,
        &BookableType {
            id: MASSAGE.into(),
            business_id: BUSINESS.into(),
            name: "Massage".into(),
            deposit_percentage: Some(33.0),
            deposit_fixed: None,
            hourly_rate: Some(Money::from_cents(6000)),
        },
    )
    .unwrap();
    queries::link_resource_type(conn, ROOM, MASSAGE).unwrap();
    for (id, name, price) in [(PACKAGE_60, "Massage 60", 15000), (PACKAGE_FREE, "Consultation", 0)] {
        queries::insert_package(
            conn,
            &Package {
                id: id.into(),
                bookable_type_id: MASSAGE.into(),
                name: name.into(),
                duration_minutes: 60,
                price: Money::from_cents(price),
                member_price: None,
                is_active: true,
            },
        )
        .unwrap();
    }
    for (i, weekday) in [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ]
    .into_iter()
    .enumerate()
    {
        queries::insert_window(
            conn,
            &AvailabilityWindow {
                id: format!("w{i}"),
                scope: ScheduleScope::Resource,
                scope_id: ROOM.into(),
                weekday,
                window: TimeWindow::parse("09:00", "18:00").unwrap(),
            },
        )
        .unwrap();
    }
}

pub fn request_only_blackout(conn: &Connection, start: &str, end: &str) {
    queries::insert_blackout(
        conn,
        &BlackoutDate {
            id: uuid::Uuid::new_v4().to_string(),
            business_id: BUSINESS.into(),
            resource_id: Some(ROOM.into()),
            starts_at: dt(start),
            ends_at: dt(end),
            kind: BlackoutKind::RequestOnly,
            reason: Some("owner away, call ahead".into()),
        },
    )
    .unwrap();
}

pub fn state(payments: Box<dyn PaymentGateway>) -> AppState {
    let conn = db::init_db(":memory:").unwrap();
    seed_catalog(&conn);
    AppState {
        db: Arc::new(Mutex::new(conn)),
        config: test_config(),
        payments,
    }
}

pub fn state_with(gateway: MockGateway) -> (AppState, Calls) {
    let calls = Arc::clone(&gateway.calls);
    (state(Box::new(gateway)), calls)
}
