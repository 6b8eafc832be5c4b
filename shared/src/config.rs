//! Configuration management for Lambda functions.

use std::env;
use std::str::FromStr;

use aws_config::{BehaviorVersion, Region, SdkConfig};

use crate::{Error, Result};

const DEFAULT_EVENTS_KEY: &str = "events.json";
const DEFAULT_OUTBOX_PREFIX: &str = "outbox/";
const DEFAULT_SUBJECT: &str = "New Event Announcement";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// ARN of the announcement topic
    pub topic_arn: String,
    /// Bucket holding the events document and the outbox
    pub events_bucket: Option<String>,
    /// Key of the events document
    pub events_key: String,
    /// Key prefix for pending notifications
    pub outbox_prefix: String,
    /// Subject line used for every announcement
    pub notification_subject: String,
    /// Conditional write attempts before giving up on a conflict
    pub max_write_attempts: u32,
    /// Pending notifications handled per relay run
    pub relay_batch_size: u32,
    /// Delivery attempts after which the relay stops retrying an entry
    pub relay_max_attempts: u32,
    /// Seconds an outbox entry is left to the handler that recorded it
    pub relay_min_age_secs: u32,
    /// AWS region
    pub aws_region: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let topic_arn = lookup("TOPIC_ARN")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Config("TOPIC_ARN not set".to_string()))?;

        Ok(Self {
            topic_arn,
            events_bucket: lookup("EVENTS_BUCKET").filter(|v| !v.is_empty()),
            events_key: lookup("EVENTS_KEY").unwrap_or_else(|| DEFAULT_EVENTS_KEY.to_string()),
            outbox_prefix: lookup("OUTBOX_PREFIX")
                .unwrap_or_else(|| DEFAULT_OUTBOX_PREFIX.to_string()),
            notification_subject: lookup("NOTIFICATION_SUBJECT")
                .unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
            max_write_attempts: parse_or(&lookup, "MAX_WRITE_ATTEMPTS", 3)?,
            relay_batch_size: parse_or(&lookup, "RELAY_BATCH_SIZE", 25)?,
            relay_max_attempts: parse_or(&lookup, "RELAY_MAX_ATTEMPTS", 5)?,
            relay_min_age_secs: parse_or(&lookup, "RELAY_MIN_AGE_SECS", 60)?,
            aws_region: lookup("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
        })
    }

    /// Shared AWS SDK configuration, pinned to the configured region.
    pub async fn aws_sdk_config(&self) -> SdkConfig {
        aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.aws_region.clone()))
            .load()
            .await
    }

    /// Bucket name, required by everything that touches storage.
    pub fn events_bucket(&self) -> Result<&str> {
        self.events_bucket
            .as_deref()
            .ok_or_else(|| Error::Config("EVENTS_BUCKET not set".to_string()))
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} must be a number, got {:?}", name, raw))),
        None => Ok(default),
    }
}
