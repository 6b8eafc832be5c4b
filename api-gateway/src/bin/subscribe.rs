//! Subscribe Lambda - Handles POST /subscribe.
//!
//! Registers the submitted email address with the announcement topic. SNS
//! sends the confirmation email; this function never sees the outcome.

use api_gateway::handlers::subscribe;
use lambda_http::{run, service_fn, Error, Request};
use shared::{Config, SnsNotifier};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across requests.
struct AppState {
    notifier: SnsNotifier,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;
        let aws_config = config.aws_sdk_config().await;
        let sns_client = aws_sdk_sns::Client::new(&aws_config);

        info!(topic_arn = %config.topic_arn, "Subscribe function initialised");

        Ok(Self {
            notifier: SnsNotifier::new(sns_client, config.topic_arn),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move { subscribe::handle(&state.notifier, event).await }
    }))
    .await
}
