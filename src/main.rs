use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use slotbook::config::AppConfig;
use slotbook::db;
use slotbook::services::payments::sandbox::SandboxGateway;
use slotbook::services::payments::stripe::StripeGateway;
use slotbook::services::payments::PaymentGateway;
use slotbook::services::sweeper;
use slotbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let payments: Box<dyn PaymentGateway> = match config.payment_provider.as_str() {
        "stripe" => {
            anyhow::ensure!(
                !config.stripe_secret_key.is_empty(),
                "STRIPE_SECRET_KEY must be set when PAYMENT_PROVIDER=stripe"
            );
            if config.stripe_webhook_secret.is_empty() {
                tracing::warn!("STRIPE_WEBHOOK_SECRET is empty, webhook signatures will not be checked");
            }
            tracing::info!("using Stripe payment gateway (api: {})", config.stripe_api_base);
            Box::new(StripeGateway::new(
                config.stripe_api_base.clone(),
                config.stripe_secret_key.clone(),
            ))
        }
        _ => {
            tracing::info!("using sandbox payment gateway");
            Box::new(SandboxGateway::new(config.public_base_url.clone()))
        }
    };

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        payments,
    });

    tokio::spawn(sweeper::run_sweeper(Arc::clone(&state)));

    let app = slotbook::app(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
