//! Event registration: append to the shared document, then announce.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::Event;
use crate::notify::Notifier;
use crate::outbox::{Outbox, PendingNotification};
use crate::storage::{EventStore, StoredEvents};
use crate::{Error, Result};

const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 3;

/// What a successful registration did.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Size of the collection after the append
    pub events_stored: usize,
    /// Outbox id of the announcement
    pub notification_id: Uuid,
    /// SNS message id of the announcement
    pub message_id: String,
}

/// Appends events to the shared document and announces them on the topic.
pub struct EventRegistrar {
    store: Arc<dyn EventStore>,
    notifier: Arc<dyn Notifier>,
    outbox: Arc<dyn Outbox>,
    subject: String,
    max_write_attempts: u32,
}

impl EventRegistrar {
    pub fn new(
        store: Arc<dyn EventStore>,
        notifier: Arc<dyn Notifier>,
        outbox: Arc<dyn Outbox>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            outbox,
            subject: subject.into(),
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        }
    }

    /// Bound the number of read-append-write rounds on version conflicts.
    pub fn with_max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts.max(1);
        self
    }

    /// Store the event, then publish its announcement.
    ///
    /// The first failing step aborts. Once the event is stored it stays
    /// stored; an announcement that could not be published is left in the
    /// outbox for the relay.
    #[tracing::instrument(skip(self, event), fields(title = %event.title, date = %event.date))]
    pub async fn register(&self, event: Event) -> Result<Registration> {
        let events_stored = self.append(&event).await?;
        info!(events_stored, "Event stored");

        let pending = PendingNotification::new(&self.subject, event.announcement());
        self.outbox.record(&pending).await?;

        let message_id = match self.notifier.publish(&pending.subject, &pending.message).await {
            Ok(id) => id,
            Err(e) => {
                error!(
                    notification_id = %pending.id,
                    error = %e,
                    "Publish failed, announcement left in outbox"
                );
                return Err(e);
            }
        };

        if let Err(e) = self.outbox.complete(pending.id).await {
            warn!(notification_id = %pending.id, error = %e, "Failed to clear outbox entry");
        }

        info!(notification_id = %pending.id, message_id = %message_id, "Event announced");

        Ok(Registration {
            events_stored,
            notification_id: pending.id,
            message_id,
        })
    }

    /// Read, append and conditionally write until the write lands.
    async fn append(&self, event: &Event) -> Result<usize> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let StoredEvents {
                mut events,
                version,
            } = self.store.load().await?;
            events.push(event.clone());

            match self.store.save(&events, version.as_deref()).await {
                Ok(()) => return Ok(events.len()),
                Err(Error::Conflict(reason)) if attempt < self.max_write_attempts => {
                    warn!(attempt, reason = %reason, "Events document changed, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }
}
