use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::payments::{PaymentEvent, PaymentOutcome, PaymentSession, SessionRequest};
use super::pricing::{self, Offering};
use super::{holds, slots, ReservationError, Resolution};
use crate::config::AppConfig;
use crate::db::{self, queries};
use crate::models::{
    BookableType, Booking, BookingStatus, Customer, Money, Package, Payment, PaymentStatus,
    Resource, SlotHold, Span,
};
use crate::state::AppState;

const BOOKING_CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";
const BOOKING_CODE_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub resource_id: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub offering: Offering,
    pub customer: Customer,
    /// Hold placed earlier by the booking UI. Advisory only.
    #[serde(default)]
    pub hold_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    Redirect {
        booking_id: String,
        booking_number: String,
        redirect_url: String,
    },
    Confirmed {
        booking_id: String,
        booking_number: String,
    },
    AwaitingApproval {
        booking_id: String,
        booking_number: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Confirmed,
    PaymentFailed,
    AlreadyResolved,
    /// Money arrived for a booking that was already cancelled.
    RequiresRefund,
}

fn requested_span(start: NaiveDateTime, end: NaiveDateTime) -> Result<Span, ReservationError> {
    if end <= start {
        return Err(ReservationError::Validation("end must be after start".to_string()));
    }
    Ok(Span::new(start, end))
}

fn load_booking(conn: &Connection, id: &str) -> Result<Booking, ReservationError> {
    queries::get_booking(conn, id)?.ok_or_else(|| ReservationError::NotFound(format!("booking {id}")))
}

fn active_resource(conn: &Connection, id: &str) -> Result<Resource, ReservationError> {
    let resource = queries::get_resource(conn, id)?
        .ok_or_else(|| ReservationError::Validation(format!("unknown resource {id}")))?;
    if !resource.is_active {
        return Err(ReservationError::Validation(format!("resource {id} is not bookable")));
    }
    Ok(resource)
}

struct PricedOffering {
    bookable_type: BookableType,
    package: Option<Package>,
    subtotal: Money,
    description: String,
}

fn price_offering(
    conn: &Connection,
    resource: &Resource,
    offering: &Offering,
    span: &Span,
) -> Result<PricedOffering, ReservationError> {
    let minutes = span.duration().num_minutes();
    let (type_id, package) = match offering {
        Offering::Package { package_id, .. } => {
            let package = queries::get_package(conn, package_id)?
                .filter(|p| p.is_active)
                .ok_or_else(|| ReservationError::Validation(format!("unknown package {package_id}")))?;
            if package.duration_minutes != minutes {
                return Err(ReservationError::Validation(format!(
                    "package '{}' lasts {} minutes, requested {minutes}",
                    package.name, package.duration_minutes
                )));
            }
            (package.bookable_type_id.clone(), Some(package))
        }
        Offering::Hourly { bookable_type_id } => (bookable_type_id.clone(), None),
    };

    let bookable_type = queries::get_bookable_type(conn, &type_id)?
        .ok_or_else(|| ReservationError::Validation(format!("unknown bookable type {type_id}")))?;
    if bookable_type.business_id != resource.business_id {
        return Err(ReservationError::Validation(format!(
            "'{}' is not offered by this resource's business",
            bookable_type.name
        )));
    }

    let (subtotal, description) = match (offering, &package) {
        (Offering::Package { member_pricing, .. }, Some(package)) => {
            (pricing::package_price(package, *member_pricing), package.name.clone())
        }
        _ => {
            let rate = bookable_type.hourly_rate.ok_or_else(|| {
                ReservationError::Validation(format!("'{}' has no hourly rate", bookable_type.name))
            })?;
            (pricing::hourly_price(rate, minutes), bookable_type.name.clone())
        }
    };

    Ok(PricedOffering {
        bookable_type,
        package,
        subtotal,
        description,
    })
}

/// Human-readable, collision-checked booking reference such as
/// `BK-251222-7QX4MA`.
pub fn generate_booking_number(
    conn: &Connection,
    prefix: &str,
    now: &NaiveDateTime,
) -> rusqlite::Result<String> {
    let date = now.format("%y%m%d");
    for attempt in 0..BOOKING_CODE_ATTEMPTS {
        let len = if attempt + 1 < BOOKING_CODE_ATTEMPTS { 6 } else { 12 };
        let candidate = format!("{prefix}-{date}-{}", random_code(len));
        if !queries::booking_number_exists(conn, &candidate)? {
            return Ok(candidate);
        }
        tracing::debug!(candidate = %candidate, "booking number collision");
    }
    // The UNIQUE constraint rejects a final collision.
    Ok(format!("{prefix}-{date}-{}", random_code(16)))
}

fn random_code(len: usize) -> String {
    let mut out = String::with_capacity(len);
    while out.len() < len {
        for byte in uuid::Uuid::new_v4().as_bytes() {
            if out.len() == len {
                break;
            }
            let idx = *byte as usize % BOOKING_CODE_ALPHABET.len();
            out.push(BOOKING_CODE_ALPHABET[idx] as char);
        }
    }
    out
}

/// Releases everything a pending booking holds and cancels it. Returns
/// whether the booking was still pending.
fn cancel_pending(
    conn: &Connection,
    booking: &Booking,
    now: &NaiveDateTime,
) -> Result<Resolution, ReservationError> {
    let changed = queries::transition_booking(
        conn,
        &booking.id,
        BookingStatus::Pending,
        BookingStatus::Cancelled,
        now,
    )?;
    if changed == 0 {
        return Ok(Resolution::AlreadyResolved);
    }
    release_booking_resources(conn, booking, now)?;
    Ok(Resolution::Applied)
}

fn release_booking_resources(
    conn: &Connection,
    booking: &Booking,
    now: &NaiveDateTime,
) -> Result<(), ReservationError> {
    queries::release_reservation(conn, &booking.id, now)?;
    if let Some(hold_id) = &booking.hold_id {
        holds::release_hold(conn, hold_id, now)?;
    }
    queries::fail_pending_payments(conn, &booking.id, now)?;
    Ok(())
}

// ── Checkout ──

enum Prepared {
    Resumed(CheckoutOutcome),
    Created {
        booking: Booking,
        description: String,
        /// Client hold still active until the payment session is recorded.
        client_hold: Option<String>,
    },
}

/// Returns the outcome of an earlier checkout by the same customer for the
/// same slot, if it is still usable. A stale pending attempt, or an unpaid
/// one for a different offering, is cancelled so that the retry can take the
/// slot again.
fn resume_checkout(
    conn: &Connection,
    email: &str,
    resource_id: &str,
    span: &Span,
    priced: &PricedOffering,
    now: &NaiveDateTime,
) -> Result<Option<CheckoutOutcome>, ReservationError> {
    let Some(existing) = queries::find_customer_booking(
        conn,
        email,
        resource_id,
        span,
        &[BookingStatus::Pending, BookingStatus::Confirmed],
    )?
    else {
        return Ok(None);
    };

    let same_offering = existing.bookable_type_id == priced.bookable_type.id
        && existing.package_id.as_deref() == priced.package.as_ref().map(|p| p.id.as_str());
    if !same_offering {
        if existing.status == BookingStatus::Pending && !existing.requires_approval {
            tracing::info!(booking_id = %existing.id, "offering changed, superseding unpaid checkout");
            cancel_pending(conn, &existing, now)?;
        }
        // Otherwise the slot check rejects the retry.
        return Ok(None);
    }

    let ids = (existing.id.clone(), existing.booking_number.clone());
    match existing.status {
        BookingStatus::Confirmed => Ok(Some(CheckoutOutcome::Confirmed {
            booking_id: ids.0,
            booking_number: ids.1,
        })),
        _ if existing.requires_approval => Ok(Some(CheckoutOutcome::AwaitingApproval {
            booking_id: ids.0,
            booking_number: ids.1,
        })),
        _ => {
            let hold_live = match &existing.hold_id {
                Some(hold_id) => queries::get_hold(conn, hold_id)?.is_some_and(|h| h.is_live(*now)),
                None => false,
            };
            let payment = queries::latest_payment_for_booking(conn, &existing.id)?
                .filter(|p| p.status == PaymentStatus::Pending);

            match (hold_live, payment.and_then(|p| p.checkout_url)) {
                (true, Some(redirect_url)) => Ok(Some(CheckoutOutcome::Redirect {
                    booking_id: ids.0,
                    booking_number: ids.1,
                    redirect_url,
                })),
                (false, _) => {
                    tracing::info!(booking_id = %existing.id, "cancelling stale checkout before retry");
                    cancel_pending(conn, &existing, now)?;
                    Ok(None)
                }
                (true, None) => Ok(None),
            }
        }
    }
}

/// The client's earlier hold, if it is still live and covers this request.
fn usable_client_hold(
    conn: &Connection,
    hold_id: &str,
    resource_id: &str,
    span: &Span,
    now: &NaiveDateTime,
) -> Result<Option<SlotHold>, ReservationError> {
    let hold = queries::get_hold(conn, hold_id)?;
    match hold {
        Some(h) if h.is_live(*now) && h.resource_id == resource_id && h.span().overlaps(span) => {
            Ok(Some(h))
        }
        _ => {
            tracing::warn!(hold_id = %hold_id, "ignoring client hold that does not match the checkout");
            Ok(None)
        }
    }
}

fn prepare_checkout(
    conn: &mut Connection,
    config: &AppConfig,
    req: &CheckoutRequest,
    now: &NaiveDateTime,
) -> Result<Prepared, ReservationError> {
    req.customer.validate().map_err(ReservationError::Validation)?;
    let span = requested_span(req.start, req.end)?;
    let resource = active_resource(conn, &req.resource_id)?;
    let priced = price_offering(conn, &resource, &req.offering, &span)?;
    let email = req.customer.normalized_email();

    let tx = db::immediate(conn)?;

    if let Some(outcome) = resume_checkout(&tx, &email, &resource.id, &span, &priced, now)? {
        tx.commit()?;
        return Ok(Prepared::Resumed(outcome));
    }

    let client_hold = match &req.hold_id {
        Some(id) => usable_client_hold(&tx, id, &resource.id, &span, now)?,
        None => None,
    };
    let check = slots::check_slot_open(
        &tx,
        &resource,
        Some(priced.bookable_type.id.as_str()),
        &span,
        now,
        client_hold.as_ref().map(|h| h.id.as_str()),
        None,
    )?;

    let quote = pricing::quote(&priced.bookable_type, priced.subtotal);
    let payment_required = !check.requires_approval && quote.deposit.is_positive();
    let status = if payment_required || check.requires_approval {
        BookingStatus::Pending
    } else {
        BookingStatus::Confirmed
    };

    let client_hold_id = client_hold.as_ref().map(|h| h.id.as_str());
    let server_hold = if payment_required {
        Some(holds::insert_hold(
            &tx,
            &resource.id,
            &span,
            now,
            config.hold_ttl(),
            client_hold_id,
            None,
        )?)
    } else {
        if let Some(id) = client_hold_id {
            holds::consume_hold(&tx, id, now)?;
        }
        None
    };

    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        booking_number: generate_booking_number(&tx, &config.booking_number_prefix, now)?,
        business_id: resource.business_id.clone(),
        resource_id: resource.id.clone(),
        bookable_type_id: priced.bookable_type.id.clone(),
        package_id: priced.package.as_ref().map(|p| p.id.clone()),
        start_at: span.start,
        end_at: span.end,
        status,
        requires_approval: check.requires_approval,
        subtotal: quote.subtotal,
        total: quote.total,
        deposit: if payment_required { quote.deposit } else { Money::ZERO },
        balance_due: if payment_required { quote.balance_due } else { quote.total.max(Money::ZERO) },
        customer_name: req.customer.name.trim().to_string(),
        customer_email: email,
        customer_phone: req.customer.phone.trim().to_string(),
        hold_id: server_hold
            .as_ref()
            .or(client_hold.as_ref())
            .map(|h| h.id.clone()),
        notes: None,
        created_at: *now,
        updated_at: *now,
    };
    queries::insert_booking(&tx, &booking)?;
    queries::insert_reservation(&tx, &booking.id, &booking.resource_id, &span)?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        booking_number = %booking.booking_number,
        resource_id = %booking.resource_id,
        status = %booking.status,
        deposit = %booking.deposit,
        "booking created"
    );

    Ok(Prepared::Created {
        booking,
        description: priced.description,
        client_hold: client_hold.filter(|_| payment_required).map(|h| h.id),
    })
}

fn record_payment(
    conn: &mut Connection,
    booking: &Booking,
    session: &PaymentSession,
    now: &NaiveDateTime,
) -> Result<(), ReservationError> {
    let payment = Payment {
        id: uuid::Uuid::new_v4().to_string(),
        booking_id: booking.id.clone(),
        session_id: session.session_id.clone(),
        checkout_url: Some(session.checkout_url.clone()),
        amount: booking.deposit,
        status: PaymentStatus::Pending,
        created_at: *now,
        updated_at: *now,
    };
    queries::insert_payment(conn, &payment)?;
    Ok(())
}

/// Undoes a checkout whose booking was committed but whose payment step
/// failed: cancels the booking, frees the slot and releases the client hold.
fn compensate(
    conn: &mut Connection,
    booking: &Booking,
    client_hold: Option<&str>,
    now: &NaiveDateTime,
) {
    let result = db::immediate(conn)
        .map_err(ReservationError::from)
        .and_then(|tx| {
            let resolution = cancel_pending(&tx, booking, now)?;
            if let Some(hold_id) = client_hold {
                holds::release_hold(&tx, hold_id, now)?;
            }
            tx.commit()?;
            Ok(resolution)
        });
    match result {
        Ok(_) => tracing::info!(booking_id = %booking.id, "checkout rolled back"),
        Err(e) => tracing::error!(booking_id = %booking.id, error = %e, "checkout rollback failed"),
    }
}

/// Runs the checkout: validates and reserves the slot, then opens a payment
/// session for the deposit when one is owed.
pub async fn start_checkout(
    state: &AppState,
    req: CheckoutRequest,
) -> Result<CheckoutOutcome, ReservationError> {
    let now = state.config.local_now();

    let (booking, description, client_hold) = {
        let mut conn = state.db();
        match prepare_checkout(&mut conn, &state.config, &req, &now) {
            Ok(Prepared::Resumed(outcome)) => {
                tracing::info!(?outcome, "resumed existing checkout");
                return Ok(outcome);
            }
            Ok(Prepared::Created {
                booking,
                description,
                client_hold,
            }) => (booking, description, client_hold),
            Err(e) => {
                if let Some(hold_id) = &req.hold_id {
                    if let Err(release_err) = holds::release_hold(&conn, hold_id, &now) {
                        tracing::debug!(hold_id = %hold_id, error = %release_err, "client hold not released");
                    }
                }
                tracing::info!(resource_id = %req.resource_id, error = %e, "checkout rejected");
                return Err(e);
            }
        }
    };

    if booking.status == BookingStatus::Confirmed {
        return Ok(CheckoutOutcome::Confirmed {
            booking_id: booking.id,
            booking_number: booking.booking_number,
        });
    }
    if booking.requires_approval {
        return Ok(CheckoutOutcome::AwaitingApproval {
            booking_id: booking.id,
            booking_number: booking.booking_number,
        });
    }

    let base = state.config.public_base_url.trim_end_matches('/');
    let request = SessionRequest {
        booking_id: booking.id.clone(),
        booking_number: booking.booking_number.clone(),
        description,
        amount: booking.deposit,
        currency: state.config.currency.clone(),
        customer_email: booking.customer_email.clone(),
        success_url: format!("{base}/bookings/{}/success", booking.id),
        cancel_url: format!("{base}/bookings/{}/cancelled", booking.id),
    };

    let session = match state.payments.create_session(&request).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(booking_id = %booking.id, error = %e, "payment session failed");
            compensate(&mut state.db(), &booking, client_hold.as_deref(), &state.config.local_now());
            return Err(ReservationError::PaymentSession(format!("{e:#}")));
        }
    };

    let recorded = record_payment(&mut state.db(), &booking, &session, &now);
    if let Err(e) = recorded {
        tracing::error!(booking_id = %booking.id, error = %e, "failed to record payment session");
        compensate(&mut state.db(), &booking, client_hold.as_deref(), &state.config.local_now());
        return Err(e);
    }
    if let Some(hold_id) = &client_hold {
        let consumed = holds::consume_hold(&state.db(), hold_id, &state.config.local_now());
        if let Err(e) = consumed {
            tracing::warn!(hold_id = %hold_id, error = %e, "client hold not consumed");
        }
    }

    tracing::info!(
        booking_id = %booking.id,
        session_id = %session.session_id,
        "awaiting payment"
    );
    Ok(CheckoutOutcome::Redirect {
        booking_id: booking.id,
        booking_number: booking.booking_number,
        redirect_url: session.checkout_url,
    })
}

/// Customer backed out of the payment page. Frees the slot immediately.
pub fn abandon_checkout(
    conn: &mut Connection,
    booking_id: &str,
    now: &NaiveDateTime,
) -> Result<Resolution, ReservationError> {
    let tx = db::immediate(conn)?;
    let booking = load_booking(&tx, booking_id)?;
    let resolution = match booking.status {
        BookingStatus::Pending => cancel_pending(&tx, &booking, now)?,
        BookingStatus::Cancelled | BookingStatus::PaymentFailed => Resolution::AlreadyResolved,
        from => {
            return Err(ReservationError::InvalidTransition {
                from,
                to: BookingStatus::Cancelled,
            })
        }
    };
    tx.commit()?;
    tracing::info!(booking_id = %booking_id, ?resolution, "checkout abandoned");
    Ok(resolution)
}

// ── Payment reconciliation ──

/// Applies a gateway callback. Safe to call any number of times for the same
/// event.
pub fn reconcile_payment(
    conn: &mut Connection,
    event: &PaymentEvent,
    now: &NaiveDateTime,
) -> Result<ReconcileOutcome, ReservationError> {
    let tx = db::immediate(conn)?;

    let payment = queries::get_payment_by_session(&tx, &event.session_id)?
        .ok_or_else(|| ReservationError::NotFound(format!("payment session {}", event.session_id)))?;
    if let Some(booking_id) = &event.booking_id {
        if booking_id != &payment.booking_id {
            return Err(ReservationError::Validation(format!(
                "session {} belongs to another booking",
                event.session_id
            )));
        }
    }
    let booking = load_booking(&tx, &payment.booking_id)?;

    let outcome = match event.outcome {
        PaymentOutcome::Succeeded => {
            if payment.status == PaymentStatus::Succeeded {
                ReconcileOutcome::AlreadyResolved
            } else {
                queries::set_payment_status(&tx, &payment.id, PaymentStatus::Succeeded, now)?;
                match booking.status {
                    BookingStatus::Pending => {
                        queries::transition_booking(
                            &tx,
                            &booking.id,
                            BookingStatus::Pending,
                            BookingStatus::Confirmed,
                            now,
                        )?;
                        if let Some(hold_id) = &booking.hold_id {
                            holds::consume_hold(&tx, hold_id, now)?;
                        }
                        ReconcileOutcome::Confirmed
                    }
                    BookingStatus::Cancelled | BookingStatus::PaymentFailed => {
                        tracing::warn!(
                            booking_id = %booking.id,
                            session_id = %event.session_id,
                            status = %booking.status,
                            "payment received for a booking that is no longer reserved"
                        );
                        ReconcileOutcome::RequiresRefund
                    }
                    _ => ReconcileOutcome::AlreadyResolved,
                }
            }
        }
        PaymentOutcome::Failed => {
            if payment.status != PaymentStatus::Pending {
                ReconcileOutcome::AlreadyResolved
            } else {
                queries::set_payment_status(&tx, &payment.id, PaymentStatus::Failed, now)?;
                let changed = queries::transition_booking(
                    &tx,
                    &booking.id,
                    BookingStatus::Pending,
                    BookingStatus::PaymentFailed,
                    now,
                )?;
                if changed > 0 {
                    release_booking_resources(&tx, &booking, now)?;
                    ReconcileOutcome::PaymentFailed
                } else {
                    ReconcileOutcome::AlreadyResolved
                }
            }
        }
    };

    tx.commit()?;
    tracing::info!(
        booking_id = %booking.id,
        session_id = %event.session_id,
        ?outcome,
        "payment reconciled"
    );
    Ok(outcome)
}

// ── Admin overrides ──

fn admin_transition(
    conn: &mut Connection,
    booking_id: &str,
    to: BookingStatus,
    now: &NaiveDateTime,
) -> Result<Resolution, ReservationError> {
    let tx = db::immediate(conn)?;
    let booking = load_booking(&tx, booking_id)?;
    if booking.status == to {
        return Ok(Resolution::AlreadyResolved);
    }
    if !booking.status.can_transition_to(to) {
        return Err(ReservationError::InvalidTransition {
            from: booking.status,
            to,
        });
    }
    queries::transition_booking(&tx, &booking.id, booking.status, to, now)?;
    if !to.holds_resource() {
        release_booking_resources(&tx, &booking, now)?;
    }
    tx.commit()?;
    tracing::info!(booking_id = %booking_id, from = %booking.status, to = %to, "admin status change");
    Ok(Resolution::Applied)
}

pub fn admin_cancel(
    conn: &mut Connection,
    booking_id: &str,
    now: &NaiveDateTime,
) -> Result<Resolution, ReservationError> {
    admin_transition(conn, booking_id, BookingStatus::Cancelled, now)
}

pub fn admin_complete(
    conn: &mut Connection,
    booking_id: &str,
    now: &NaiveDateTime,
) -> Result<Resolution, ReservationError> {
    admin_transition(conn, booking_id, BookingStatus::Completed, now)
}

/// Confirms a booking made in a request-only period.
pub fn admin_approve(
    conn: &mut Connection,
    booking_id: &str,
    now: &NaiveDateTime,
) -> Result<Resolution, ReservationError> {
    let booking = load_booking(conn, booking_id)?;
    if booking.status == BookingStatus::Pending && !booking.requires_approval {
        return Err(ReservationError::Validation(
            "booking is waiting for payment, not approval".to_string(),
        ));
    }
    admin_transition(conn, booking_id, BookingStatus::Confirmed, now)
}

/// Rejects `span` on the resource if another live reservation or hold
/// overlaps it.
fn ensure_unoccupied(
    conn: &Connection,
    resource_id: &str,
    span: &Span,
    now: &NaiveDateTime,
    own_booking: Option<&Booking>,
) -> Result<(), ReservationError> {
    queries::expire_holds(conn, now, Some(resource_id))?;
    let own_id = own_booking.map(|b| b.id.as_str());
    let own_hold = own_booking.and_then(|b| b.hold_id.as_deref());
    if !queries::live_reservations_overlapping(conn, resource_id, span, own_id)?.is_empty() {
        return Err(ReservationError::SlotUnavailable(
            "overlaps another booking".to_string(),
        ));
    }
    if !queries::live_holds_overlapping(conn, resource_id, span, now, own_hold)?.is_empty() {
        return Err(ReservationError::SlotUnavailable(
            "held by a checkout in progress".to_string(),
        ));
    }
    Ok(())
}

/// Moves a booking to a new time (and optionally another resource of the
/// same business). Opening hours and blackouts are not enforced; overlap
/// with other bookings and holds is.
pub fn admin_reschedule(
    conn: &mut Connection,
    booking_id: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
    resource_id: Option<&str>,
    now: &NaiveDateTime,
) -> Result<Booking, ReservationError> {
    let span = requested_span(start, end)?;
    let tx = db::immediate(conn)?;
    let booking = load_booking(&tx, booking_id)?;
    if !booking.status.can_transition_to(BookingStatus::Rescheduled) {
        return Err(ReservationError::InvalidTransition {
            from: booking.status,
            to: BookingStatus::Rescheduled,
        });
    }

    let target = active_resource(&tx, resource_id.unwrap_or(&booking.resource_id))?;
    if target.business_id != booking.business_id {
        return Err(ReservationError::Validation(
            "cannot move a booking to another business".to_string(),
        ));
    }
    ensure_unoccupied(&tx, &target.id, &span, now, Some(&booking))?;

    queries::reschedule_booking(&tx, &booking.id, &target.id, &span, now)?;
    queries::move_reservation(&tx, &booking.id, &target.id, &span)?;
    if let Some(hold_id) = &booking.hold_id {
        holds::release_hold(&tx, hold_id, now)?;
    }
    let updated = load_booking(&tx, &booking.id)?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking_id,
        resource_id = %target.id,
        start = %span.start,
        "booking rescheduled"
    );
    Ok(updated)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForceBookRequest {
    pub resource_id: String,
    pub bookable_type_id: String,
    #[serde(default)]
    pub package_id: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub customer: Customer,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Creates a confirmed booking without payment, ignoring opening hours and
/// blackouts. The slot must still be free of other bookings and holds.
pub fn admin_force_book(
    conn: &mut Connection,
    config: &AppConfig,
    req: &ForceBookRequest,
    now: &NaiveDateTime,
) -> Result<Booking, ReservationError> {
    req.customer.validate().map_err(ReservationError::Validation)?;
    let span = requested_span(req.start, req.end)?;
    let resource = active_resource(conn, &req.resource_id)?;
    let offering = match &req.package_id {
        Some(package_id) => Offering::Package {
            package_id: package_id.clone(),
            member_pricing: false,
        },
        None => Offering::Hourly {
            bookable_type_id: req.bookable_type_id.clone(),
        },
    };
    let (bookable_type_id, package_id, total) = match price_offering(conn, &resource, &offering, &span) {
        Ok(priced) => (
            priced.bookable_type.id,
            priced.package.map(|p| p.id),
            priced.subtotal,
        ),
        // Unpriced admin bookings are allowed as long as the type is valid.
        Err(ReservationError::Validation(_)) if req.package_id.is_none() => {
            let bt = queries::get_bookable_type(conn, &req.bookable_type_id)?
                .filter(|bt| bt.business_id == resource.business_id)
                .ok_or_else(|| {
                    ReservationError::Validation(format!("unknown bookable type {}", req.bookable_type_id))
                })?;
            (bt.id, None, Money::ZERO)
        }
        Err(e) => return Err(e),
    };

    let tx = db::immediate(conn)?;
    ensure_unoccupied(&tx, &resource.id, &span, now, None)?;

    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        booking_number: generate_booking_number(&tx, &config.booking_number_prefix, now)?,
        business_id: resource.business_id.clone(),
        resource_id: resource.id.clone(),
        bookable_type_id,
        package_id,
        start_at: span.start,
        end_at: span.end,
        status: BookingStatus::Confirmed,
        requires_approval: false,
        subtotal: total,
        total,
        deposit: Money::ZERO,
        balance_due: total.max(Money::ZERO),
        customer_name: req.customer.name.trim().to_string(),
        customer_email: req.customer.normalized_email(),
        customer_phone: req.customer.phone.trim().to_string(),
        hold_id: None,
        notes: req.notes.clone(),
        created_at: *now,
        updated_at: *now,
    };
    queries::insert_booking(&tx, &booking)?;
    queries::insert_reservation(&tx, &booking.id, &booking.resource_id, &span)?;
    tx.commit()?;

    tracing::info!(booking_id = %booking.id, resource_id = %booking.resource_id, "admin booking created");
    Ok(booking)
}

// ── Sweep ──

/// Cancels pending checkouts whose hold ran out more than `grace` ago.
pub fn cancel_stale_pending(
    conn: &mut Connection,
    now: &NaiveDateTime,
    grace: chrono::Duration,
) -> Result<usize, ReservationError> {
    let cutoff = *now - grace;
    let tx = db::immediate(conn)?;
    let mut cancelled = 0;
    for booking in queries::stale_pending_bookings(&tx, &cutoff)? {
        if cancel_pending(&tx, &booking, now)? == Resolution::Applied {
            tracing::info!(booking_id = %booking.id, "cancelled unpaid checkout");
            cancelled += 1;
        }
    }
    tx.commit()?;
    Ok(cancelled)
}
