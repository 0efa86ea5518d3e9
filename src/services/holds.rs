use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;

use super::slots::{self, MAX_DURATION_MINUTES};
use super::{ReservationError, Resolution};
use crate::db::{self, queries};
use crate::models::{HoldStatus, SlotHold, Span};

/// Check-and-insert for a hold. Must run inside a write transaction so the
/// overlap check and the insert see the same state. Holds named by
/// `exclude_hold` and the reservation of `exclude_booking` do not conflict.
pub fn insert_hold(
    conn: &Connection,
    resource_id: &str,
    span: &Span,
    now: &NaiveDateTime,
    ttl: Duration,
    exclude_hold: Option<&str>,
    exclude_booking: Option<&str>,
) -> Result<SlotHold, ReservationError> {
    if span.is_empty() {
        return Err(ReservationError::Validation("hold must end after it starts".to_string()));
    }

    queries::expire_holds(conn, now, Some(resource_id))?;

    if !queries::live_holds_overlapping(conn, resource_id, span, now, exclude_hold)?.is_empty() {
        return Err(ReservationError::SlotUnavailable(
            "held by another checkout".to_string(),
        ));
    }
    if !queries::live_reservations_overlapping(conn, resource_id, span, exclude_booking)?.is_empty() {
        return Err(ReservationError::SlotUnavailable("already booked".to_string()));
    }

    let hold = SlotHold {
        id: uuid::Uuid::new_v4().to_string(),
        resource_id: resource_id.to_string(),
        start_at: span.start,
        end_at: span.end,
        status: HoldStatus::Active,
        expires_at: *now + ttl,
        created_at: *now,
        resolved_at: None,
    };
    queries::insert_hold(conn, &hold)?;
    Ok(hold)
}

/// Places a hold on `span` that lives for `ttl`. The span must be a bookable
/// slot: within opening hours, clear of blackouts and no longer than
/// `MAX_DURATION_MINUTES`. Fails with `SlotUnavailable` if any live hold or
/// reservation overlaps.
pub fn create_hold(
    conn: &mut Connection,
    resource_id: &str,
    bookable_type_id: Option<&str>,
    span: &Span,
    now: &NaiveDateTime,
    ttl: Duration,
) -> Result<SlotHold, ReservationError> {
    if span.is_empty() {
        return Err(ReservationError::Validation("hold must end after it starts".to_string()));
    }
    if span.duration().num_minutes() > MAX_DURATION_MINUTES {
        return Err(ReservationError::Validation(format!(
            "hold may last at most {MAX_DURATION_MINUTES} minutes"
        )));
    }
    let resource = queries::get_resource(conn, resource_id)?
        .ok_or_else(|| ReservationError::NotFound(format!("resource {resource_id}")))?;
    if !resource.is_active {
        return Err(ReservationError::Validation(format!("resource {resource_id} is inactive")));
    }

    let tx = db::immediate(conn)?;
    slots::check_slot_open(&tx, &resource, bookable_type_id, span, now, None, None)?;
    let hold = insert_hold(&tx, resource_id, span, now, ttl, None, None)?;
    tx.commit()?;

    tracing::info!(
        hold_id = %hold.id,
        resource_id = %resource_id,
        expires_at = %hold.expires_at,
        "hold created"
    );
    Ok(hold)
}

fn settle(
    conn: &Connection,
    id: &str,
    to: HoldStatus,
    now: &NaiveDateTime,
) -> Result<Resolution, ReservationError> {
    let hold = queries::get_hold(conn, id)?
        .ok_or_else(|| ReservationError::NotFound(format!("hold {id}")))?;
    let changed = queries::resolve_hold(conn, id, to, now, true)?;
    if changed == 0 && hold.status == HoldStatus::Active {
        // Past expiry but not yet swept.
        queries::resolve_hold(conn, id, HoldStatus::Expired, now, false)?;
    }
    Ok(Resolution::from_rows(changed))
}

/// `active -> released`. Anything else is already resolved.
pub fn release_hold(
    conn: &Connection,
    id: &str,
    now: &NaiveDateTime,
) -> Result<Resolution, ReservationError> {
    let resolution = settle(conn, id, HoldStatus::Released, now)?;
    tracing::debug!(hold_id = %id, ?resolution, "hold release");
    Ok(resolution)
}

/// `active -> consumed`, at most once. A consumed, released or expired hold
/// reports `AlreadyResolved`.
pub fn consume_hold(
    conn: &Connection,
    id: &str,
    now: &NaiveDateTime,
) -> Result<Resolution, ReservationError> {
    let resolution = settle(conn, id, HoldStatus::Consumed, now)?;
    tracing::debug!(hold_id = %id, ?resolution, "hold consume");
    Ok(resolution)
}

/// Expires every active hold whose expiry is at or before `now`.
pub fn expire_holds(conn: &Connection, now: &NaiveDateTime) -> Result<usize, ReservationError> {
    Ok(queries::expire_holds(conn, now, None)?)
}
