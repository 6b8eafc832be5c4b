//! Announcement topic backed by SNS.

use async_trait::async_trait;
use aws_sdk_sns::Client as SnsClient;
use tracing::info;

use crate::{Error, Result};

/// Delivery protocol used for every subscription.
pub const EMAIL_PROTOCOL: &str = "email";

/// The announcement topic: subscriptions in, announcements out.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Subscribe an address to the topic with the given protocol.
    ///
    /// Returns the subscription ARN, which is `pending confirmation` until
    /// the recipient follows the link in the confirmation email.
    async fn subscribe(&self, protocol: &str, endpoint: &str) -> Result<String>;

    /// Publish a plain-text message, returning the message id.
    async fn publish(&self, subject: &str, message: &str) -> Result<String>;
}

/// Subscribe an email address to the announcement topic.
///
/// Single attempt; the caller reports any failure as is.
pub async fn subscribe_email(notifier: &dyn Notifier, email: &str) -> Result<String> {
    let subscription = notifier.subscribe(EMAIL_PROTOCOL, email).await?;
    info!(subscription = %subscription, "Subscription requested");
    Ok(subscription)
}

/// SNS topic client.
pub struct SnsNotifier {
    client: SnsClient,
    topic_arn: String,
}

impl SnsNotifier {
    pub fn new(client: SnsClient, topic_arn: impl Into<String>) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
        }
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    async fn subscribe(&self, protocol: &str, endpoint: &str) -> Result<String> {
        let response = self
            .client
            .subscribe()
            .topic_arn(&self.topic_arn)
            .protocol(protocol)
            .endpoint(endpoint)
            .send()
            .await
            .map_err(|e| Error::aws("Failed to subscribe", e))?;

        Ok(response
            .subscription_arn()
            .unwrap_or("pending confirmation")
            .to_string())
    }

    async fn publish(&self, subject: &str, message: &str) -> Result<String> {
        let response = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(subject)
            .message(message)
            .send()
            .await
            .map_err(|e| Error::aws("Failed to publish to SNS", e))?;

        Ok(response.message_id().unwrap_or_default().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingNotifier;
    use aws_sdk_sns::error::SdkError;
    use aws_sdk_sns::operation::publish::PublishError;
    use aws_sdk_sns::types::error::NotFoundException;

    #[tokio::test]
    async fn test_subscribe_email_uses_email_protocol() {
        let notifier = RecordingNotifier::default();
        subscribe_email(&notifier, "fan@example.com").await.unwrap();

        assert_eq!(
            notifier.subscriptions(),
            vec![("email".to_string(), "fan@example.com".to_string())]
        );
    }

    #[tokio::test]
    async fn test_subscribe_failure_is_passed_through() {
        let notifier = RecordingNotifier::failing_subscribe();
        let err = subscribe_email(&notifier, "fan@example.com").await.unwrap_err();
        assert!(matches!(err, Error::Aws(_)));
    }

    #[test]
    fn test_sdk_failure_keeps_service_message() {
        let err: SdkError<PublishError, ()> = SdkError::service_error(
            PublishError::NotFoundException(
                NotFoundException::builder()
                    .message("Topic does not exist")
                    .build(),
            ),
            (),
        );

        let message = Error::aws("Failed to publish to SNS", err).to_string();
        assert!(message.starts_with("AWS error: Failed to publish to SNS: "), "{}", message);
        assert!(message.contains("Topic does not exist"), "{}", message);
    }
}
