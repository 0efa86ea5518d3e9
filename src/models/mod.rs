pub mod booking;
pub mod catalog;
pub mod hold;
pub mod money;
pub mod payment;
pub mod schedule;
pub mod span;

pub use booking::{Booking, BookingStatus, Customer};
pub use catalog::{BookableType, Business, Package, Resource};
pub use hold::{HoldStatus, SlotHold};
pub use money::Money;
pub use payment::{Payment, PaymentStatus};
pub use schedule::{
    AvailabilityOverride, AvailabilityWindow, BlackoutDate, BlackoutKind, ScheduleError,
    ScheduleScope, TimeWindow,
};
pub use span::Span;
