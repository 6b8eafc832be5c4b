//! Outbox of announcements that still have to reach the topic.
//!
//! The registration handler records every announcement here before publishing
//! it, and removes it once SNS accepted it. Whatever is left behind is picked
//! up by the relay, which retries until the entry is delivered or exhausted.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::notify::Notifier;
use crate::{Config, Error, Result};

/// Sub-prefix where exhausted entries are parked.
const DEAD_LETTER_DIR: &str = "dead/";

/// An announcement waiting to be published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingNotification {
    pub id: Uuid,
    pub subject: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
}

impl PendingNotification {
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject: subject.into(),
            message: message.into(),
            created_at: Utc::now(),
            attempts: 0,
        }
    }
}

/// An object under the outbox prefix that does not parse as an entry.
#[derive(Debug, Clone)]
pub struct UnreadableEntry {
    pub key: String,
    pub body: Vec<u8>,
    pub reason: String,
}

/// One listing of the outbox.
#[derive(Debug, Default)]
pub struct PendingBatch {
    pub entries: Vec<PendingNotification>,
    pub unreadable: Vec<UnreadableEntry>,
}

/// Durable store of pending notifications.
#[async_trait]
pub trait Outbox: Send + Sync {
    /// Persist a new or updated entry.
    async fn record(&self, notification: &PendingNotification) -> Result<()>;

    /// List up to `limit` live objects, parsed or not.
    async fn pending(&self, limit: u32) -> Result<PendingBatch>;

    /// Drop an entry after successful delivery.
    async fn complete(&self, id: Uuid) -> Result<()>;

    /// Move an exhausted entry out of the live set.
    async fn abandon(&self, notification: &PendingNotification) -> Result<()>;

    /// Move an object that is not a valid entry out of the live set, as is.
    async fn park_unreadable(&self, entry: &UnreadableEntry) -> Result<()>;
}

/// Outbox kept as one JSON object per entry under a key prefix.
pub struct S3Outbox {
    client: S3Client,
    bucket: String,
    prefix: String,
}

impl S3Outbox {
    pub fn new(client: S3Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self {
            client,
            bucket: bucket.into(),
            prefix,
        }
    }

    fn key_for(&self, id: Uuid) -> String {
        format!("{}{}.json", self.prefix, id)
    }

    fn dead_key_for(&self, key: &str) -> String {
        let name = key.strip_prefix(self.prefix.as_str()).unwrap_or(key);
        format!("{}{}{}", self.prefix, DEAD_LETTER_DIR, name)
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| Error::aws(format!("Failed to write outbox entry {}", key), e))?;

        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::aws(format!("Failed to read outbox entry {}", key), e))?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| Error::aws(format!("Failed to read outbox entry {}", key), e))?
            .into_bytes();

        Ok(bytes.to_vec())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::aws(format!("Failed to delete outbox entry {}", key), e))?;

        Ok(())
    }
}

#[async_trait]
impl Outbox for S3Outbox {
    async fn record(&self, notification: &PendingNotification) -> Result<()> {
        let body = serde_json::to_vec(notification)?;
        self.put(&self.key_for(notification.id), body).await
    }

    async fn pending(&self, limit: u32) -> Result<PendingBatch> {
        // The delimiter keeps parked entries under dead/ out of the listing.
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&self.prefix)
            .delimiter("/")
            .max_keys(i32::try_from(limit).unwrap_or(i32::MAX))
            .send()
            .await
            .map_err(|e| Error::aws("Failed to list outbox", e))?;

        let mut batch = PendingBatch::default();
        for object in response.contents() {
            let Some(key) = object.key() else { continue };

            // A failed read may be transient, so the object stays for the next run.
            let body = match self.fetch(key).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping outbox entry");
                    continue;
                }
            };

            match serde_json::from_slice::<PendingNotification>(&body) {
                Ok(entry) => batch.entries.push(entry),
                Err(e) => batch.unreadable.push(UnreadableEntry {
                    key: key.to_string(),
                    body,
                    reason: e.to_string(),
                }),
            }
        }

        Ok(batch)
    }

    async fn complete(&self, id: Uuid) -> Result<()> {
        self.delete(&self.key_for(id)).await
    }

    async fn abandon(&self, notification: &PendingNotification) -> Result<()> {
        let key = self.key_for(notification.id);
        let body = serde_json::to_vec(notification)?;
        self.put(&self.dead_key_for(&key), body).await?;
        self.delete(&key).await
    }

    async fn park_unreadable(&self, entry: &UnreadableEntry) -> Result<()> {
        self.put(&self.dead_key_for(&entry.key), entry.body.clone())
            .await?;
        self.delete(&entry.key).await
    }
}

/// Limits applied by one relay run.
#[derive(Debug, Clone, Copy)]
pub struct RelayPolicy {
    /// Objects listed per run
    pub batch_size: u32,
    /// Delivery attempts before an entry is parked
    pub max_attempts: u32,
    /// Entries younger than this still belong to the handler that wrote them
    pub min_age: Duration,
}

impl RelayPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.relay_batch_size,
            max_attempts: config.relay_max_attempts,
            min_age: Duration::seconds(i64::from(config.relay_min_age_secs)),
        }
    }
}

/// Outcome of one relay run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RelayReport {
    pub delivered: u32,
    pub failed: u32,
    pub abandoned: u32,
    pub deferred: u32,
}

/// Publish every pending notification once.
///
/// Delivered entries are removed and failed ones are rewritten with one more
/// attempt. Entries that already used `max_attempts`, and objects that are
/// not entries at all, are parked. Entries newer than `min_age` are left
/// alone: the handler that recorded them may still be publishing.
pub async fn relay_pending(
    outbox: &dyn Outbox,
    notifier: &dyn Notifier,
    policy: RelayPolicy,
    now: DateTime<Utc>,
) -> Result<RelayReport> {
    let mut report = RelayReport::default();
    let batch = outbox.pending(policy.batch_size).await?;

    for unreadable in &batch.unreadable {
        error!(
            key = %unreadable.key,
            reason = %unreadable.reason,
            "Parking unreadable outbox entry"
        );
        if let Err(e) = outbox.park_unreadable(unreadable).await {
            warn!(key = %unreadable.key, error = %e, "Failed to park outbox entry");
        }
        report.abandoned += 1;
    }

    for mut entry in batch.entries {
        if now - entry.created_at < policy.min_age {
            debug!(notification_id = %entry.id, "Outbox entry too recent, leaving it");
            report.deferred += 1;
            continue;
        }

        if entry.attempts >= policy.max_attempts {
            error!(
                notification_id = %entry.id,
                attempts = entry.attempts,
                "Giving up on announcement"
            );
            if let Err(e) = outbox.abandon(&entry).await {
                warn!(notification_id = %entry.id, error = %e, "Failed to park outbox entry");
            }
            report.abandoned += 1;
            continue;
        }

        match notifier.publish(&entry.subject, &entry.message).await {
            Ok(message_id) => {
                info!(
                    notification_id = %entry.id,
                    message_id = %message_id,
                    "Announcement delivered"
                );
                if let Err(e) = outbox.complete(entry.id).await {
                    // Left in place, so it will be published again next run.
                    warn!(notification_id = %entry.id, error = %e, "Failed to clear outbox entry");
                }
                report.delivered += 1;
            }
            Err(e) => {
                entry.attempts += 1;
                warn!(
                    notification_id = %entry.id,
                    attempts = entry.attempts,
                    error = %e,
                    "Announcement delivery failed"
                );
                if let Err(e) = outbox.record(&entry).await {
                    warn!(notification_id = %entry.id, error = %e, "Failed to update outbox entry");
                }
                report.failed += 1;
            }
        }
    }

    Ok(report)
}
