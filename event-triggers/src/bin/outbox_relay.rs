//! Outbox Relay Lambda - Redelivers announcements that failed to publish.
//!
//! This Lambda runs every few minutes via EventBridge and:
//! 1. Lists pending announcements in the outbox
//! 2. Publishes each one to the announcement topic
//! 3. Removes delivered entries, bumps the attempt count on failures
//! 4. Parks entries that ran out of attempts or are not entries at all
//!
//! Entries younger than `RELAY_MIN_AGE_SECS` are skipped; the handler that
//! recorded them is still publishing.

use chrono::Utc;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::Deserialize;
use shared::{relay_pending, Config, RelayPolicy, RelayReport, S3Outbox, SnsNotifier};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct ScheduledEvent {
    // EventBridge scheduled event
    #[serde(default, rename = "detail-type")]
    detail_type: String,
}

struct AppState {
    outbox: S3Outbox,
    notifier: SnsNotifier,
    policy: RelayPolicy,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;
        let bucket = config.events_bucket()?.to_string();

        let aws_config = config.aws_sdk_config().await;
        let s3_client = aws_sdk_s3::Client::new(&aws_config);
        let sns_client = aws_sdk_sns::Client::new(&aws_config);

        Ok(Self {
            outbox: S3Outbox::new(s3_client, bucket, &config.outbox_prefix),
            notifier: SnsNotifier::new(sns_client, &config.topic_arn),
            policy: RelayPolicy::from_config(&config),
        })
    }
}

async fn handler(
    state: Arc<AppState>,
    event: LambdaEvent<ScheduledEvent>,
) -> Result<RelayReport, Error> {
    info!(detail_type = %event.payload.detail_type, "Starting outbox relay");

    let report = relay_pending(&state.outbox, &state.notifier, state.policy, Utc::now()).await?;

    info!(
        delivered = report.delivered,
        failed = report.failed,
        abandoned = report.abandoned,
        deferred = report.deferred,
        "Outbox relay complete"
    );

    Ok(report)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
