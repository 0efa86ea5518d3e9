use async_trait::async_trait;

use super::{PaymentGateway, PaymentSession, SessionRequest};

/// Local gateway for development. Issues session ids without contacting any
/// provider; payments are settled by posting events to the webhook by hand.
pub struct SandboxGateway {
    public_base_url: String,
}

impl SandboxGateway {
    pub fn new(public_base_url: String) -> Self {
        Self {
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn create_session(&self, request: &SessionRequest) -> anyhow::Result<PaymentSession> {
        let session_id = format!("sandbox_{}", uuid::Uuid::new_v4().simple());
        tracing::info!(
            session_id = %session_id,
            booking_id = %request.booking_id,
            amount = %request.amount,
            "sandbox payment session created"
        );
        Ok(PaymentSession {
            checkout_url: format!("{}/sandbox/checkout/{session_id}", self.public_base_url),
            session_id,
        })
    }
}
