pub mod admin;
pub mod checkout;
pub mod health;
pub mod holds;
pub mod slots;
pub mod webhook;
