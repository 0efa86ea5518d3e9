use chrono::{NaiveDate, NaiveDateTime, Weekday};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use super::{DATE_FORMAT, TS_FORMAT};
use crate::models::{
    AvailabilityOverride, AvailabilityWindow, BlackoutDate, BlackoutKind, BookableType, Booking,
    BookingStatus, Business, HoldStatus, Money, Package, Payment, PaymentStatus, Resource,
    ScheduleError, ScheduleScope, SlotHold, Span, TimeWindow,
};

pub fn ts(dt: &NaiveDateTime) -> String {
    dt.format(TS_FORMAT).to_string()
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn unknown_status(idx: usize, entity: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unknown {entity} status '{value}'").into(),
    )
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn parse_opt_ts(idx: usize, s: Option<String>) -> rusqlite::Result<Option<NaiveDateTime>> {
    s.map(|s| parse_ts(idx, &s)).transpose()
}

fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn get_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

fn money(cents: Option<i64>) -> Option<Money> {
    cents.map(Money::from_cents)
}

// ── Catalog ──

pub fn insert_business(conn: &Connection, business: &Business) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO businesses (id, name) VALUES (?1, ?2)",
        params![business.id, business.name],
    )?;
    Ok(())
}

pub fn business_exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM businesses WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )
}

pub fn insert_resource(conn: &Connection, resource: &Resource) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO resources (id, business_id, name, kind, is_active) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            resource.id,
            resource.business_id,
            resource.name,
            resource.kind,
            resource.is_active,
        ],
    )?;
    Ok(())
}

pub fn insert_bookable_type(conn: &Connection, bt: &BookableType) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO bookable_types (id, business_id, name, deposit_percentage, deposit_fixed_cents, hourly_rate_cents)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            bt.id,
            bt.business_id,
            bt.name,
            bt.deposit_percentage,
            bt.deposit_fixed.map(|m| m.cents()),
            bt.hourly_rate.map(|m| m.cents()),
        ],
    )?;
    Ok(())
}

pub fn link_resource_type(
    conn: &Connection,
    resource_id: &str,
    bookable_type_id: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO resource_bookable_types (resource_id, bookable_type_id) VALUES (?1, ?2)",
        params![resource_id, bookable_type_id],
    )?;
    Ok(())
}

pub fn insert_package(conn: &Connection, package: &Package) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO packages (id, bookable_type_id, name, duration_minutes, price_cents, member_price_cents, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            package.id,
            package.bookable_type_id,
            package.name,
            package.duration_minutes,
            package.price.cents(),
            package.member_price.map(|m| m.cents()),
            package.is_active,
        ],
    )?;
    Ok(())
}

pub fn get_resource(conn: &Connection, id: &str) -> rusqlite::Result<Option<Resource>> {
    conn.query_row(
        "SELECT id, business_id, name, kind, is_active FROM resources WHERE id = ?1",
        [id],
        parse_resource_row,
    )
    .optional()
}

pub fn resources_for_type(
    conn: &Connection,
    bookable_type_id: &str,
) -> rusqlite::Result<Vec<Resource>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.business_id, r.name, r.kind, r.is_active
         FROM resources r
         JOIN resource_bookable_types rbt ON rbt.resource_id = r.id
         WHERE rbt.bookable_type_id = ?1 AND r.is_active = 1
         ORDER BY r.id",
    )?;
    let rows = stmt.query_map([bookable_type_id], parse_resource_row)?;
    rows.collect()
}

fn parse_resource_row(row: &rusqlite::Row) -> rusqlite::Result<Resource> {
    Ok(Resource {
        id: row.get(0)?,
        business_id: row.get(1)?,
        name: row.get(2)?,
        kind: row.get(3)?,
        is_active: row.get(4)?,
    })
}

pub fn get_bookable_type(conn: &Connection, id: &str) -> rusqlite::Result<Option<BookableType>> {
    conn.query_row(
        "SELECT id, business_id, name, deposit_percentage, deposit_fixed_cents, hourly_rate_cents
         FROM bookable_types WHERE id = ?1",
        [id],
        |row| {
            Ok(BookableType {
                id: row.get(0)?,
                business_id: row.get(1)?,
                name: row.get(2)?,
                deposit_percentage: row.get(3)?,
                deposit_fixed: money(row.get(4)?),
                hourly_rate: money(row.get(5)?),
            })
        },
    )
    .optional()
}

pub fn get_package(conn: &Connection, id: &str) -> rusqlite::Result<Option<Package>> {
    conn.query_row(
        "SELECT id, bookable_type_id, name, duration_minutes, price_cents, member_price_cents, is_active
         FROM packages WHERE id = ?1",
        [id],
        |row| {
            Ok(Package {
                id: row.get(0)?,
                bookable_type_id: row.get(1)?,
                name: row.get(2)?,
                duration_minutes: row.get(3)?,
                price: Money::from_cents(row.get(4)?),
                member_price: money(row.get(5)?),
                is_active: row.get(6)?,
            })
        },
    )
    .optional()
}

// ── Schedule ──

pub fn insert_window(conn: &Connection, window: &AvailabilityWindow) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO availability_windows (id, scope, scope_id, weekday, start_time, end_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            window.id,
            window.scope.as_str(),
            window.scope_id,
            window.weekday.num_days_from_monday(),
            window.window.start.format("%H:%M").to_string(),
            window.window.end.format("%H:%M").to_string(),
        ],
    )?;
    Ok(())
}

pub fn windows_for(
    conn: &Connection,
    scope: ScheduleScope,
    scope_id: &str,
) -> rusqlite::Result<Vec<AvailabilityWindow>> {
    let mut stmt = conn.prepare(
        "SELECT id, weekday, start_time, end_time FROM availability_windows
         WHERE scope = ?1 AND scope_id = ?2
         ORDER BY weekday, start_time",
    )?;
    let rows = stmt.query_map(params![scope.as_str(), scope_id], |row| {
        let weekday: u8 = row.get(1)?;
        let start: String = row.get(2)?;
        let end: String = row.get(3)?;
        let window = TimeWindow::parse(&start, &end).map_err(|e| conversion_error(2, e))?;
        Ok(AvailabilityWindow {
            id: row.get(0)?,
            scope,
            scope_id: scope_id.to_string(),
            weekday: Weekday::try_from(weekday).map_err(|_| {
                conversion_error(1, ScheduleError::InvalidWeekday(weekday.to_string()))
            })?,
            window,
        })
    })?;
    rows.collect()
}

/// Inserts or replaces the override for its (scope, date).
pub fn upsert_override(conn: &Connection, ov: &AvailabilityOverride) -> rusqlite::Result<()> {
    let windows_json =
        serde_json::to_string(&ov.windows).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        "INSERT INTO availability_overrides (id, scope, scope_id, date, is_unavailable, windows)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(scope, scope_id, date) DO UPDATE SET
            is_unavailable = excluded.is_unavailable,
            windows = excluded.windows",
        params![
            ov.id,
            ov.scope.as_str(),
            ov.scope_id,
            ov.date.format(DATE_FORMAT).to_string(),
            ov.is_unavailable,
            windows_json,
        ],
    )?;
    Ok(())
}

pub fn overrides_in_range(
    conn: &Connection,
    scope: ScheduleScope,
    scope_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> rusqlite::Result<Vec<AvailabilityOverride>> {
    let mut stmt = conn.prepare(
        "SELECT id, date, is_unavailable, windows FROM availability_overrides
         WHERE scope = ?1 AND scope_id = ?2 AND date >= ?3 AND date <= ?4
         ORDER BY date",
    )?;
    let rows = stmt.query_map(
        params![
            scope.as_str(),
            scope_id,
            from.format(DATE_FORMAT).to_string(),
            to.format(DATE_FORMAT).to_string(),
        ],
        |row| {
            let date: String = row.get(1)?;
            let windows_json: String = row.get(3)?;
            let windows: Vec<TimeWindow> =
                serde_json::from_str(&windows_json).map_err(|e| conversion_error(3, e))?;
            Ok(AvailabilityOverride {
                id: row.get(0)?,
                scope,
                scope_id: scope_id.to_string(),
                date: parse_date(1, &date)?,
                is_unavailable: row.get(2)?,
                windows,
            })
        },
    )?;
    rows.collect()
}

pub fn insert_blackout(conn: &Connection, blackout: &BlackoutDate) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO blackout_dates (id, business_id, resource_id, starts_at, ends_at, kind, reason)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            blackout.id,
            blackout.business_id,
            blackout.resource_id,
            ts(&blackout.starts_at),
            ts(&blackout.ends_at),
            blackout.kind.as_str(),
            blackout.reason,
        ],
    )?;
    Ok(())
}

/// Blackouts that apply to the resource (directly or business-wide) and
/// overlap `span`.
pub fn blackouts_overlapping(
    conn: &Connection,
    business_id: &str,
    resource_id: &str,
    span: &Span,
) -> rusqlite::Result<Vec<BlackoutDate>> {
    let mut stmt = conn.prepare(
        "SELECT id, business_id, resource_id, starts_at, ends_at, kind, reason
         FROM blackout_dates
         WHERE (resource_id = ?2 OR (resource_id IS NULL AND business_id = ?1))
           AND starts_at < ?4 AND ends_at > ?3
         ORDER BY starts_at",
    )?;
    let rows = stmt.query_map(
        params![business_id, resource_id, ts(&span.start), ts(&span.end)],
        |row| {
            let kind: String = row.get(5)?;
            Ok(BlackoutDate {
                id: row.get(0)?,
                business_id: row.get(1)?,
                resource_id: row.get(2)?,
                starts_at: get_ts(row, 3)?,
                ends_at: get_ts(row, 4)?,
                kind: BlackoutKind::parse(&kind).map_err(|e| conversion_error(5, e))?,
                reason: row.get(6)?,
            })
        },
    )?;
    rows.collect()
}

// ── Holds ──

const HOLD_COLUMNS: &str =
    "id, resource_id, start_at, end_at, status, expires_at, created_at, resolved_at";

pub fn insert_hold(conn: &Connection, hold: &SlotHold) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO slot_holds (id, resource_id, start_at, end_at, status, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            hold.id,
            hold.resource_id,
            ts(&hold.start_at),
            ts(&hold.end_at),
            hold.status.as_str(),
            ts(&hold.expires_at),
            ts(&hold.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_hold(conn: &Connection, id: &str) -> rusqlite::Result<Option<SlotHold>> {
    conn.query_row(
        &format!("SELECT {HOLD_COLUMNS} FROM slot_holds WHERE id = ?1"),
        [id],
        parse_hold_row,
    )
    .optional()
}

/// Active, unexpired holds on the resource overlapping `span`.
pub fn live_holds_overlapping(
    conn: &Connection,
    resource_id: &str,
    span: &Span,
    now: &NaiveDateTime,
    exclude_hold: Option<&str>,
) -> rusqlite::Result<Vec<SlotHold>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {HOLD_COLUMNS} FROM slot_holds
         WHERE resource_id = ?1 AND status = 'active' AND expires_at > ?2
           AND start_at < ?4 AND end_at > ?3
           AND (?5 IS NULL OR id <> ?5)
         ORDER BY start_at"
    ))?;
    let rows = stmt.query_map(
        params![resource_id, ts(now), ts(&span.start), ts(&span.end), exclude_hold],
        parse_hold_row,
    )?;
    rows.collect()
}

/// Moves an active hold to `to`. Returns the number of rows changed, which
/// is zero when the hold was already resolved. With `require_unexpired` a hold
/// past its expiry is left alone.
pub fn resolve_hold(
    conn: &Connection,
    id: &str,
    to: HoldStatus,
    now: &NaiveDateTime,
    require_unexpired: bool,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE slot_holds SET status = ?2, resolved_at = ?3
         WHERE id = ?1 AND status = 'active' AND (?4 = 0 OR expires_at > ?3)",
        params![id, to.as_str(), ts(now), require_unexpired],
    )
}

/// Marks every active hold whose expiry has passed as expired. Restricted to
/// one resource when `resource_id` is given.
pub fn expire_holds(
    conn: &Connection,
    now: &NaiveDateTime,
    resource_id: Option<&str>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE slot_holds SET status = 'expired', resolved_at = ?1
         WHERE status = 'active' AND expires_at <= ?1
           AND (?2 IS NULL OR resource_id = ?2)",
        params![ts(now), resource_id],
    )
}

fn parse_hold_row(row: &rusqlite::Row) -> rusqlite::Result<SlotHold> {
    let status: String = row.get(4)?;
    Ok(SlotHold {
        id: row.get(0)?,
        resource_id: row.get(1)?,
        start_at: get_ts(row, 2)?,
        end_at: get_ts(row, 3)?,
        status: HoldStatus::parse(&status).ok_or_else(|| unknown_status(4, "hold", &status))?,
        expires_at: get_ts(row, 5)?,
        created_at: get_ts(row, 6)?,
        resolved_at: parse_opt_ts(7, row.get(7)?)?,
    })
}

// ── Resource reservations ──

pub fn insert_reservation(
    conn: &Connection,
    booking_id: &str,
    resource_id: &str,
    span: &Span,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO resource_reservations (booking_id, resource_id, start_at, end_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![booking_id, resource_id, ts(&span.start), ts(&span.end)],
    )?;
    Ok(())
}

/// Unreleased reservations on the resource overlapping `span`, as
/// `(booking_id, span)` pairs.
pub fn live_reservations_overlapping(
    conn: &Connection,
    resource_id: &str,
    span: &Span,
    exclude_booking: Option<&str>,
) -> rusqlite::Result<Vec<(String, Span)>> {
    let mut stmt = conn.prepare(
        "SELECT booking_id, start_at, end_at FROM resource_reservations
         WHERE resource_id = ?1 AND released_at IS NULL
           AND start_at < ?3 AND end_at > ?2
           AND (?4 IS NULL OR booking_id <> ?4)
         ORDER BY start_at",
    )?;
    let rows = stmt.query_map(
        params![resource_id, ts(&span.start), ts(&span.end), exclude_booking],
        |row| Ok((row.get(0)?, Span::new(get_ts(row, 1)?, get_ts(row, 2)?))),
    )?;
    rows.collect()
}

pub fn release_reservation(
    conn: &Connection,
    booking_id: &str,
    now: &NaiveDateTime,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE resource_reservations SET released_at = ?2
         WHERE booking_id = ?1 AND released_at IS NULL",
        params![booking_id, ts(now)],
    )
}

pub fn move_reservation(
    conn: &Connection,
    booking_id: &str,
    resource_id: &str,
    span: &Span,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE resource_reservations SET resource_id = ?2, start_at = ?3, end_at = ?4, released_at = NULL
         WHERE booking_id = ?1",
        params![booking_id, resource_id, ts(&span.start), ts(&span.end)],
    )
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, booking_number, business_id, resource_id, bookable_type_id, package_id, \
     start_at, end_at, status, requires_approval, subtotal_cents, total_cents, deposit_cents, \
     balance_due_cents, customer_name, customer_email, customer_phone, hold_id, notes, created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)"
        ),
        params![
            booking.id,
            booking.booking_number,
            booking.business_id,
            booking.resource_id,
            booking.bookable_type_id,
            booking.package_id,
            ts(&booking.start_at),
            ts(&booking.end_at),
            booking.status.as_str(),
            booking.requires_approval,
            booking.subtotal.cents(),
            booking.total.cents(),
            booking.deposit.cents(),
            booking.balance_due.cents(),
            booking.customer_name,
            booking.customer_email,
            booking.customer_phone,
            booking.hold_id,
            booking.notes,
            ts(&booking.created_at),
            ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> rusqlite::Result<Option<Booking>> {
    conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        [id],
        parse_booking_row,
    )
    .optional()
}

pub fn booking_number_exists(conn: &Connection, number: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM bookings WHERE booking_number = ?1",
        [number],
        |row| row.get(0),
    )
}

/// Conditional status change: only applies while the booking is still in
/// `from`. Returns the number of rows changed.
pub fn transition_booking(
    conn: &Connection,
    id: &str,
    from: BookingStatus,
    to: BookingStatus,
    now: &NaiveDateTime,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE bookings SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        params![id, from.as_str(), to.as_str(), ts(now)],
    )
}

pub fn reschedule_booking(
    conn: &Connection,
    id: &str,
    resource_id: &str,
    span: &Span,
    now: &NaiveDateTime,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE bookings SET resource_id = ?2, start_at = ?3, end_at = ?4, status = 'rescheduled', updated_at = ?5
         WHERE id = ?1",
        params![id, resource_id, ts(&span.start), ts(&span.end), ts(now)],
    )
}

pub fn list_bookings(
    conn: &Connection,
    status: Option<BookingStatus>,
    limit: i64,
) -> rusqlite::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE (?1 IS NULL OR status = ?1)
         ORDER BY start_at DESC LIMIT ?2"
    ))?;
    let rows = stmt.query_map(
        params![status.map(|s| s.as_str()), limit],
        parse_booking_row,
    )?;
    rows.collect()
}

/// Most recent booking by this customer for exactly this resource and span
/// whose status is one of `statuses`.
pub fn find_customer_booking(
    conn: &Connection,
    email: &str,
    resource_id: &str,
    span: &Span,
    statuses: &[BookingStatus],
) -> rusqlite::Result<Option<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE customer_email = ?1 AND resource_id = ?2 AND start_at = ?3 AND end_at = ?4
         ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(
        params![email, resource_id, ts(&span.start), ts(&span.end)],
        parse_booking_row,
    )?;
    for booking in rows {
        let booking = booking?;
        if statuses.contains(&booking.status) {
            return Ok(Some(booking));
        }
    }
    Ok(None)
}

/// Pending, non-approval bookings whose checkout hold ran out at or before
/// `cutoff` and that have no succeeded payment.
pub fn stale_pending_bookings(
    conn: &Connection,
    cutoff: &NaiveDateTime,
) -> rusqlite::Result<Vec<Booking>> {
    let columns = BOOKING_COLUMNS
        .split(", ")
        .map(|c| format!("b.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT {columns} FROM bookings b
         JOIN slot_holds h ON h.id = b.hold_id
         WHERE b.status = 'pending' AND b.requires_approval = 0
           AND h.status IN ('active', 'expired') AND h.expires_at <= ?1
           AND NOT EXISTS (
               SELECT 1 FROM payments p WHERE p.booking_id = b.id AND p.status = 'succeeded'
           )
         ORDER BY b.start_at"
    ))?;
    let rows = stmt.query_map([ts(cutoff)], parse_booking_row)?;
    rows.collect()
}

fn parse_booking_row(row: &rusqlite::Row) -> rusqlite::Result<Booking> {
    let status: String = row.get(8)?;
    Ok(Booking {
        id: row.get(0)?,
        booking_number: row.get(1)?,
        business_id: row.get(2)?,
        resource_id: row.get(3)?,
        bookable_type_id: row.get(4)?,
        package_id: row.get(5)?,
        start_at: get_ts(row, 6)?,
        end_at: get_ts(row, 7)?,
        status: BookingStatus::parse(&status)
            .ok_or_else(|| unknown_status(8, "booking", &status))?,
        requires_approval: row.get(9)?,
        subtotal: Money::from_cents(row.get(10)?),
        total: Money::from_cents(row.get(11)?),
        deposit: Money::from_cents(row.get(12)?),
        balance_due: Money::from_cents(row.get(13)?),
        customer_name: row.get(14)?,
        customer_email: row.get(15)?,
        customer_phone: row.get(16)?,
        hold_id: row.get(17)?,
        notes: row.get(18)?,
        created_at: get_ts(row, 19)?,
        updated_at: get_ts(row, 20)?,
    })
}

// ── Payments ──

const PAYMENT_COLUMNS: &str =
    "id, booking_id, session_id, checkout_url, amount_cents, status, created_at, updated_at";

pub fn insert_payment(conn: &Connection, payment: &Payment) -> rusqlite::Result<()> {
    conn.execute(
        &format!("INSERT INTO payments ({PAYMENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            payment.id,
            payment.booking_id,
            payment.session_id,
            payment.checkout_url,
            payment.amount.cents(),
            payment.status.as_str(),
            ts(&payment.created_at),
            ts(&payment.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_payment_by_session(
    conn: &Connection,
    session_id: &str,
) -> rusqlite::Result<Option<Payment>> {
    conn.query_row(
        &format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE session_id = ?1"),
        [session_id],
        parse_payment_row,
    )
    .optional()
}

pub fn latest_payment_for_booking(
    conn: &Connection,
    booking_id: &str,
) -> rusqlite::Result<Option<Payment>> {
    conn.query_row(
        &format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT 1"
        ),
        [booking_id],
        parse_payment_row,
    )
    .optional()
}

pub fn set_payment_status(
    conn: &Connection,
    id: &str,
    to: PaymentStatus,
    now: &NaiveDateTime,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE payments SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status <> ?2",
        params![id, to.as_str(), ts(now)],
    )
}

pub fn fail_pending_payments(
    conn: &Connection,
    booking_id: &str,
    now: &NaiveDateTime,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE payments SET status = 'failed', updated_at = ?2
         WHERE booking_id = ?1 AND status = 'pending'",
        params![booking_id, ts(now)],
    )
}

fn parse_payment_row(row: &rusqlite::Row) -> rusqlite::Result<Payment> {
    let status: String = row.get(5)?;
    Ok(Payment {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        session_id: row.get(2)?,
        checkout_url: row.get(3)?,
        amount: Money::from_cents(row.get(4)?),
        status: PaymentStatus::parse(&status)
            .ok_or_else(|| unknown_status(5, "payment", &status))?,
        created_at: get_ts(row, 6)?,
        updated_at: get_ts(row, 7)?,
    })
}
