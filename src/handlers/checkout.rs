use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, Money, PaymentStatus};
use crate::services::reservation::{self, CheckoutOutcome, CheckoutRequest};
use crate::state::AppState;

// POST /api/checkout
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutOutcome>, AppError> {
    let outcome = reservation::start_checkout(&state, req).await?;
    Ok(Json(outcome))
}

// POST /api/checkout/:booking_id/abandon
pub async fn abandon(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let now = state.config.local_now();
    let resolution = {
        let mut db = state.db();
        reservation::abandon_checkout(&mut db, &booking_id, &now)?
    };
    Ok(Json(serde_json::json!({ "resolution": resolution })))
}

// GET /api/bookings/:id
#[derive(Serialize)]
pub struct BookingView {
    id: String,
    booking_number: String,
    resource_id: String,
    start_at: NaiveDateTime,
    end_at: NaiveDateTime,
    status: BookingStatus,
    requires_approval: bool,
    total: Money,
    deposit: Money,
    balance_due: Money,
    payment_status: Option<PaymentStatus>,
}

impl BookingView {
    fn new(booking: Booking, payment_status: Option<PaymentStatus>) -> Self {
        Self {
            id: booking.id,
            booking_number: booking.booking_number,
            resource_id: booking.resource_id,
            start_at: booking.start_at,
            end_at: booking.end_at,
            status: booking.status,
            requires_approval: booking.requires_approval,
            total: booking.total,
            deposit: booking.deposit,
            balance_due: booking.balance_due,
            payment_status,
        }
    }
}

pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BookingView>, AppError> {
    let (booking, payment) = {
        let db = state.db();
        let booking = queries::get_booking(&db, &id)?
            .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;
        let payment = queries::latest_payment_for_booking(&db, &id)?;
        (booking, payment)
    };
    Ok(Json(BookingView::new(booking, payment.map(|p| p.status))))
}
