pub mod sandbox;
pub mod stripe;

use async_trait::async_trait;

use crate::models::Money;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    pub booking_id: String,
    pub booking_number: String,
    pub description: String,
    pub amount: Money,
    pub currency: String,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSession {
    pub session_id: String,
    pub checkout_url: String,
}

/// Hosted checkout provider. Only the deposit is charged through it.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, request: &SessionRequest) -> anyhow::Result<PaymentSession>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
}

/// A gateway callback reduced to what reconciliation needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentEvent {
    pub event_id: Option<String>,
    pub session_id: String,
    pub booking_id: Option<String>,
    pub outcome: PaymentOutcome,
}
