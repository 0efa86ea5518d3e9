use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::{PaymentEvent, PaymentGateway, PaymentOutcome, PaymentSession, SessionRequest};

pub struct StripeGateway {
    api_base: String,
    secret_key: String,
    client: reqwest::Client,
}

impl StripeGateway {
    pub fn new(api_base: String, secret_key: String) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct CheckoutSessionResponse {
    id: String,
    url: Option<String>,
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_session(&self, request: &SessionRequest) -> anyhow::Result<PaymentSession> {
        let url = format!("{}/v1/checkout/sessions", self.api_base);
        let amount = request.amount.cents().to_string();
        let product_name = format!("Deposit {} ({})", request.booking_number, request.description);

        let form = [
            ("mode", "payment"),
            ("success_url", request.success_url.as_str()),
            ("cancel_url", request.cancel_url.as_str()),
            ("customer_email", request.customer_email.as_str()),
            ("client_reference_id", request.booking_id.as_str()),
            ("metadata[booking_id]", request.booking_id.as_str()),
            ("metadata[booking_number]", request.booking_number.as_str()),
            ("line_items[0][quantity]", "1"),
            ("line_items[0][price_data][currency]", request.currency.as_str()),
            ("line_items[0][price_data][unit_amount]", amount.as_str()),
            ("line_items[0][price_data][product_data][name]", product_name.as_str()),
        ];

        let session: CheckoutSessionResponse = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", format!("checkout-{}", request.booking_id))
            .form(&form)
            .send()
            .await
            .context("failed to create Stripe checkout session")?
            .error_for_status()
            .context("Stripe API returned error")?
            .json()
            .await
            .context("failed to parse Stripe checkout session")?;

        let checkout_url = session
            .url
            .context("Stripe checkout session has no redirect url")?;

        Ok(PaymentSession {
            session_id: session.id,
            checkout_url,
        })
    }
}

/// Maps a Stripe event payload to a payment outcome. Event types that do not
/// settle a checkout return `None`.
pub fn parse_event(body: &str) -> anyhow::Result<Option<PaymentEvent>> {
    let event: serde_json::Value = serde_json::from_str(body).context("invalid event JSON")?;

    let event_type = event["type"].as_str().unwrap_or_default();
    let object = &event["data"]["object"];

    let outcome = match event_type {
        "checkout.session.completed" => {
            if object["payment_status"].as_str() == Some("paid") {
                PaymentOutcome::Succeeded
            } else {
                // Delayed payment methods settle later with an async_payment event.
                return Ok(None);
            }
        }
        "checkout.session.async_payment_succeeded" => PaymentOutcome::Succeeded,
        "checkout.session.async_payment_failed" | "checkout.session.expired" => {
            PaymentOutcome::Failed
        }
        _ => return Ok(None),
    };

    let session_id = object["id"]
        .as_str()
        .context("event has no checkout session id")?
        .to_string();
    let booking_id = object["metadata"]["booking_id"]
        .as_str()
        .or_else(|| object["client_reference_id"].as_str())
        .map(str::to_string);

    Ok(Some(PaymentEvent {
        event_id: event["id"].as_str().map(str::to_string),
        session_id,
        booking_id,
        outcome,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Money;

    use axum::routing::post;
    use axum::{Form, Json, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn event(kind: &str, payment_status: &str) -> String {
        serde_json::json!({
            "id": "evt_1",
            "type": kind,
            "data": {"object": {
                "id": "cs_test_1",
                "payment_status": payment_status,
                "metadata": {"booking_id": "bk-1"}
            }}
        })
        .to_string()
    }

    #[test]
    fn paid_completion_is_success() {
        let parsed = parse_event(&event("checkout.session.completed", "paid")).unwrap().unwrap();
        assert_eq!(parsed.outcome, PaymentOutcome::Succeeded);
        assert_eq!(parsed.session_id, "cs_test_1");
        assert_eq!(parsed.booking_id.as_deref(), Some("bk-1"));
        assert_eq!(parsed.event_id.as_deref(), Some("evt_1"));
    }

    #[test]
    fn unpaid_completion_waits() {
        assert_eq!(parse_event(&event("checkout.session.completed", "unpaid")).unwrap(), None);
    }

    #[test]
    fn expiry_is_failure() {
        let parsed = parse_event(&event("checkout.session.expired", "unpaid")).unwrap().unwrap();
        assert_eq!(parsed.outcome, PaymentOutcome::Failed);
    }

    #[test]
    fn unrelated_events_ignored() {
        assert_eq!(parse_event(&event("customer.created", "")).unwrap(), None);
        assert!(parse_event("not json").is_err());
    }

    #[tokio::test]
    async fn creates_session_against_api() {
        let seen: Arc<Mutex<Vec<HashMap<String, String>>>> = Arc::new(Mutex::new(vec![]));
        let captured = Arc::clone(&seen);
        let app = Router::new().route(
            "/v1/checkout/sessions",
            post(move |Form(form): Form<HashMap<String, String>>| {
                let captured = Arc::clone(&captured);
                async move {
                    captured.lock().unwrap().push(form);
                    Json(serde_json::json!({
                        "id": "cs_test_42",
                        "url": "https://checkout.stripe.test/c/cs_test_42"
                    }))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let gateway = StripeGateway::new(format!("http://{addr}/"), "sk_test".into());
        let session = gateway
            .create_session(&SessionRequest {
                booking_id: "bk-1".into(),
                booking_number: "BK-250616-ABC123".into(),
                description: "Massage".into(),
                amount: Money::from_cents(4950),
                currency: "usd".into(),
                customer_email: "ana@example.com".into(),
                success_url: "http://localhost/success".into(),
                cancel_url: "http://localhost/cancel".into(),
            })
            .await
            .unwrap();

        assert_eq!(session.session_id, "cs_test_42");
        assert_eq!(session.checkout_url, "https://checkout.stripe.test/c/cs_test_42");

        let forms = seen.lock().unwrap();
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0]["line_items[0][price_data][unit_amount]"], "4950");
        assert_eq!(forms[0]["metadata[booking_id]"], "bk-1");
    }
}
