//! Create Event Lambda - Handles POST /create-event.
//!
//! Appends the event to the events document in the site bucket and
//! announces it on the topic. Announcements that fail to publish stay in the
//! outbox until the relay delivers them.

use api_gateway::handlers::create_event;
use lambda_http::{run, service_fn, Error, Request};
use shared::{Config, EventRegistrar, S3EventStore, S3Outbox, SnsNotifier};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across requests.
struct AppState {
    registrar: EventRegistrar,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;
        let bucket = config.events_bucket()?.to_string();

        let aws_config = config.aws_sdk_config().await;
        let s3_client = aws_sdk_s3::Client::new(&aws_config);
        let sns_client = aws_sdk_sns::Client::new(&aws_config);

        info!(
            bucket = %bucket,
            key = %config.events_key,
            topic_arn = %config.topic_arn,
            "Create event function initialised"
        );

        let registrar = EventRegistrar::new(
            Arc::new(S3EventStore::new(s3_client.clone(), &bucket, &config.events_key)),
            Arc::new(SnsNotifier::new(sns_client, &config.topic_arn)),
            Arc::new(S3Outbox::new(s3_client, &bucket, &config.outbox_prefix)),
            &config.notification_subject,
        )
        .with_max_write_attempts(config.max_write_attempts);

        Ok(Self { registrar })
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
        async move { create_event::handle(&state.registrar, event).await }
    }))
    .await
}
