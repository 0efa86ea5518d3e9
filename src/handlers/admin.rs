use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::schedule::{parse_weekday, validate_windows};
use crate::models::{
    AvailabilityOverride, AvailabilityWindow, BlackoutDate, BlackoutKind, Booking, BookingStatus,
    ScheduleScope, TimeWindow,
};
use crate::services::reservation::{self, ForceBookRequest};
use crate::services::Resolution;
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

fn resolution_body(resolution: Resolution) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "resolution": resolution }))
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(
            BookingStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("unknown booking status '{s}'")))?,
        ),
        None => None,
    };
    let limit = query.limit.unwrap_or(50).clamp(1, 500);

    let bookings = {
        let db = state.db();
        queries::list_bookings(&db, status, limit)?
    };
    Ok(Json(bookings))
}

// POST /api/admin/bookings
pub async fn force_book(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ForceBookRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let now = state.config.local_now();
    let booking = {
        let mut db = state.db();
        reservation::admin_force_book(&mut db, &state.config, &req, &now)?
    };
    Ok((StatusCode::CREATED, Json(booking)))
}

// POST /api/admin/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let now = state.config.local_now();
    let resolution = {
        let mut db = state.db();
        reservation::admin_cancel(&mut db, &id, &now)?
    };
    Ok(resolution_body(resolution))
}

// POST /api/admin/bookings/:id/complete
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let now = state.config.local_now();
    let resolution = {
        let mut db = state.db();
        reservation::admin_complete(&mut db, &id, &now)?
    };
    Ok(resolution_body(resolution))
}

// POST /api/admin/bookings/:id/approve
pub async fn approve_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let now = state.config.local_now();
    let resolution = {
        let mut db = state.db();
        reservation::admin_approve(&mut db, &id, &now)?
    };
    Ok(resolution_body(resolution))
}

// POST /api/admin/bookings/:id/reschedule
#[derive(Deserialize)]
pub struct RescheduleRequest {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub resource_id: Option<String>,
}

pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<RescheduleRequest>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let now = state.config.local_now();
    let booking = {
        let mut db = state.db();
        reservation::admin_reschedule(
            &mut db,
            &id,
            req.start,
            req.end,
            req.resource_id.as_deref(),
            &now,
        )?
    };
    Ok(Json(booking))
}

// ── Schedule store ──

fn ensure_scope_exists(
    conn: &rusqlite::Connection,
    scope: ScheduleScope,
    scope_id: &str,
) -> Result<(), AppError> {
    let exists = match scope {
        ScheduleScope::Resource => queries::get_resource(conn, scope_id)?.is_some(),
        ScheduleScope::BookableType => queries::get_bookable_type(conn, scope_id)?.is_some(),
    };
    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("{} {scope_id}", scope.as_str())))
    }
}

// POST /api/admin/windows
#[derive(Deserialize)]
pub struct WindowRequest {
    pub scope: ScheduleScope,
    pub scope_id: String,
    pub weekday: String,
    pub start: String,
    pub end: String,
}

pub async fn create_window(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<WindowRequest>,
) -> Result<(StatusCode, Json<AvailabilityWindow>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let weekday = parse_weekday(&req.weekday)?;
    let window = TimeWindow::parse(&req.start, &req.end)?;

    let created = {
        let db = state.db();
        ensure_scope_exists(&db, req.scope, &req.scope_id)?;

        let mut same_day: Vec<TimeWindow> = queries::windows_for(&db, req.scope, &req.scope_id)?
            .into_iter()
            .filter(|w| w.weekday == weekday)
            .map(|w| w.window)
            .collect();
        same_day.push(window);
        validate_windows(&same_day)?;

        let created = AvailabilityWindow {
            id: uuid::Uuid::new_v4().to_string(),
            scope: req.scope,
            scope_id: req.scope_id,
            weekday,
            window,
        };
        queries::insert_window(&db, &created)?;
        created
    };

    tracing::info!(
        scope = created.scope.as_str(),
        scope_id = %created.scope_id,
        weekday = %created.weekday,
        "availability window added"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

// POST /api/admin/overrides
#[derive(Deserialize)]
pub struct OverrideRequest {
    pub scope: ScheduleScope,
    pub scope_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub is_unavailable: bool,
    #[serde(default)]
    pub windows: Vec<TimeWindow>,
}

pub async fn put_override(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<OverrideRequest>,
) -> Result<Json<AvailabilityOverride>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let ov = AvailabilityOverride {
        id: uuid::Uuid::new_v4().to_string(),
        scope: req.scope,
        scope_id: req.scope_id,
        date: req.date,
        is_unavailable: req.is_unavailable,
        windows: req.windows,
    };
    ov.validate()?;

    {
        let db = state.db();
        ensure_scope_exists(&db, ov.scope, &ov.scope_id)?;
        queries::upsert_override(&db, &ov)?;
    }

    tracing::info!(scope_id = %ov.scope_id, date = %ov.date, windows = ov.windows.len(), "override saved");
    Ok(Json(ov))
}

// POST /api/admin/blackouts
#[derive(Deserialize)]
pub struct BlackoutRequest {
    pub business_id: String,
    pub resource_id: Option<String>,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub kind: BlackoutKind,
    pub reason: Option<String>,
}

pub async fn create_blackout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<BlackoutRequest>,
) -> Result<(StatusCode, Json<BlackoutDate>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let blackout = BlackoutDate {
        id: uuid::Uuid::new_v4().to_string(),
        business_id: req.business_id,
        resource_id: req.resource_id.filter(|s| !s.is_empty()),
        starts_at: req.starts_at,
        ends_at: req.ends_at,
        kind: req.kind,
        reason: req.reason,
    };
    blackout.validate()?;

    {
        let db = state.db();
        if !queries::business_exists(&db, &blackout.business_id)? {
            return Err(AppError::NotFound(format!("business {}", blackout.business_id)));
        }
        if let Some(resource_id) = &blackout.resource_id {
            let resource = queries::get_resource(&db, resource_id)?
                .ok_or_else(|| AppError::NotFound(format!("resource {resource_id}")))?;
            if resource.business_id != blackout.business_id {
                return Err(AppError::Validation(format!(
                    "resource {resource_id} belongs to another business"
                )));
            }
        }
        queries::insert_blackout(&db, &blackout)?;
    }

    tracing::info!(
        business_id = %blackout.business_id,
        kind = blackout.kind.as_str(),
        starts_at = %blackout.starts_at,
        "blackout added"
    );
    Ok((StatusCode::CREATED, Json(blackout)))
}
