use std::env;
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub payment_provider: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_api_base: String,
    pub currency: String,
    pub public_base_url: String,
    pub hold_ttl_minutes: i64,
    pub hold_sweep_interval_secs: u64,
    pub pending_grace_minutes: i64,
    pub max_query_days: i64,
    pub business_utc_offset_minutes: i32,
    pub booking_number_prefix: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "slotbook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            payment_provider: env::var("PAYMENT_PROVIDER").unwrap_or_else(|_| "sandbox".to_string()),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            stripe_api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            currency: env::var("CURRENCY").unwrap_or_else(|_| "usd".to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            hold_ttl_minutes: env_number("HOLD_TTL_MINUTES", 15),
            hold_sweep_interval_secs: env_number("HOLD_SWEEP_INTERVAL_SECS", 30u64).clamp(1, 60),
            pending_grace_minutes: env_number("PENDING_GRACE_MINUTES", 10),
            max_query_days: env_number("MAX_QUERY_DAYS", 62),
            business_utc_offset_minutes: env_number("BUSINESS_UTC_OFFSET_MINUTES", 0),
            booking_number_prefix: env::var("BOOKING_NUMBER_PREFIX")
                .unwrap_or_else(|_| "BK".to_string()),
        }
    }

    pub fn hold_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.hold_ttl_minutes)
    }

    pub fn pending_grace(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.pending_grace_minutes)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.hold_sweep_interval_secs)
    }

    /// Current wall-clock time on the business clock. Every stored timestamp
    /// (slots, holds, bookings) is expressed in this clock.
    pub fn local_now(&self) -> NaiveDateTime {
        Utc::now().naive_utc() + chrono::Duration::minutes(i64::from(self.business_utc_offset_minutes))
    }
}

fn env_number<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
