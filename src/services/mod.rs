#[cfg(test)]
pub(crate) mod fixtures;
pub mod holds;
pub mod payments;
pub mod pricing;
pub mod reservation;
pub mod slots;
pub mod sweeper;

use crate::models::{BookingStatus, ScheduleError};

#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("{0}")]
    Validation(String),

    #[error("slot unavailable: {0}")]
    SlotUnavailable(String),

    #[error("payment session error: {0}")]
    PaymentSession(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("cannot move booking from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl From<ScheduleError> for ReservationError {
    fn from(e: ScheduleError) -> Self {
        ReservationError::Validation(e.to_string())
    }
}

/// Outcome of an operation that may find its target already settled.
/// Repeating a settled operation is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Applied,
    AlreadyResolved,
}

impl Resolution {
    pub fn from_rows(changed: usize) -> Self {
        if changed > 0 {
            Resolution::Applied
        } else {
            Resolution::AlreadyResolved
        }
    }
}
