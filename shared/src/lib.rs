//! Shared library for the event announcer Lambda functions.
//!
//! This crate provides the event model, the S3 and SNS clients, and the
//! registration and outbox logic used across all Lambda functions.

pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod notify;
pub mod outbox;
pub mod registration;
pub mod storage;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use config::Config;
pub use error::{Error, Result};
pub use models::{CreateEventRequest, Event, EventCollection, SubscribeRequest};
pub use notify::{subscribe_email, Notifier, SnsNotifier, EMAIL_PROTOCOL};
pub use outbox::{
    relay_pending, Outbox, PendingBatch, PendingNotification, RelayPolicy, RelayReport, S3Outbox,
    UnreadableEntry,
};
pub use registration::{EventRegistrar, Registration};
pub use storage::{EventStore, S3EventStore, StoredEvents};
