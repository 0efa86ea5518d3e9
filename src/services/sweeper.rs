use std::sync::Arc;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use super::{holds, reservation, ReservationError};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub holds_expired: usize,
    pub bookings_cancelled: usize,
}

/// One pass: expires holds past their TTL, then cancels pending checkouts
/// that stayed unpaid for `grace` after their hold ran out.
pub fn sweep_once(
    conn: &mut Connection,
    now: &NaiveDateTime,
    grace: chrono::Duration,
) -> Result<SweepReport, ReservationError> {
    let holds_expired = holds::expire_holds(conn, now)?;
    let bookings_cancelled = reservation::cancel_stale_pending(conn, now, grace)?;
    Ok(SweepReport {
        holds_expired,
        bookings_cancelled,
    })
}

/// Background task that periodically expires holds and abandoned checkouts.
pub async fn run_sweeper(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(state.config.sweep_interval());
    loop {
        interval.tick().await;
        let now = state.config.local_now();
        let result = sweep_once(&mut state.db(), &now, state.config.pending_grace());
        match result {
            Ok(report) if report != SweepReport::default() => info!(
                holds_expired = report.holds_expired,
                bookings_cancelled = report.bookings_cancelled,
                "sweep"
            ),
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "sweep failed"),
        }
    }
}
