//! In-memory stand-ins for S3 and SNS.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Event, EventCollection};
use crate::notify::Notifier;
use crate::outbox::{Outbox, PendingBatch, PendingNotification, UnreadableEntry};
use crate::storage::{EventStore, StoredEvents};
use crate::{Error, Result};

#[derive(Default)]
struct StoreState {
    events: Option<EventCollection>,
    version: u64,
    loads: u32,
    saves: u32,
    fail_load: bool,
    fail_save: bool,
    conflict_always: bool,
    racing_writes: Vec<Event>,
}

/// Events document held in memory, with ETag-like versions.
#[derive(Default)]
pub struct MemoryEventStore {
    state: Mutex<StoreState>,
}

impl MemoryEventStore {
    pub fn with_events(events: Vec<Event>) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().events = Some(EventCollection::new(events));
        store
    }

    /// No document at the key.
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn failing_load() -> Self {
        let store = Self::with_events(Vec::new());
        store.state.lock().unwrap().fail_load = true;
        store
    }

    pub fn failing_save() -> Self {
        let store = Self::with_events(Vec::new());
        store.state.lock().unwrap().fail_save = true;
        store
    }

    /// Every conditional write reports a conflict.
    pub fn conflict_always(&self) {
        self.state.lock().unwrap().conflict_always = true;
    }

    /// Another writer appends `event` right after the next read.
    pub fn append_between_read_and_write(&self, event: Event) {
        self.state.lock().unwrap().racing_writes.push(event);
    }

    pub fn events(&self) -> Option<EventCollection> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn loads(&self) -> u32 {
        self.state.lock().unwrap().loads
    }

    pub fn saves(&self) -> u32 {
        self.state.lock().unwrap().saves
    }
}

fn etag(version: u64) -> String {
    format!("\"v{}\"", version)
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn load(&self) -> Result<StoredEvents> {
        let mut state = self.state.lock().unwrap();
        state.loads += 1;

        if state.fail_load {
            return Err(Error::Aws("simulated read failure".to_string()));
        }

        let events = state
            .events
            .clone()
            .ok_or_else(|| Error::NotFound("events.json".to_string()))?;
        let snapshot = StoredEvents {
            events,
            version: Some(etag(state.version)),
        };

        let racing: Vec<Event> = state.racing_writes.drain(..).collect();
        if !racing.is_empty() {
            if let Some(stored) = state.events.as_mut() {
                for event in racing {
                    stored.push(event);
                }
            }
            state.version += 1;
        }

        Ok(snapshot)
    }

    async fn save(&self, events: &EventCollection, expected_version: Option<&str>) -> Result<()> {
        let mut state = self.state.lock().unwrap();

        if state.fail_save {
            return Err(Error::Aws("simulated write failure".to_string()));
        }

        let current = etag(state.version);
        if state.conflict_always || expected_version.is_some_and(|v| v != current) {
            return Err(Error::Conflict(format!("expected {:?}, found {}", expected_version, current)));
        }

        state.events = Some(events.clone());
        state.version += 1;
        state.saves += 1;
        Ok(())
    }
}

/// Topic that records calls instead of sending anything.
#[derive(Default)]
pub struct RecordingNotifier {
    subscriptions: Mutex<Vec<(String, String)>>,
    published: Mutex<Vec<(String, String)>>,
    fail_subscribe: bool,
    fail_publish: bool,
}

impl RecordingNotifier {
    pub fn failing_subscribe() -> Self {
        Self {
            fail_subscribe: true,
            ..Self::default()
        }
    }

    pub fn failing_publish() -> Self {
        Self {
            fail_publish: true,
            ..Self::default()
        }
    }

    /// `(protocol, endpoint)` pairs, in call order.
    pub fn subscriptions(&self) -> Vec<(String, String)> {
        self.subscriptions.lock().unwrap().clone()
    }

    /// `(subject, message)` pairs, in call order.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn subscribe(&self, protocol: &str, endpoint: &str) -> Result<String> {
        if self.fail_subscribe {
            return Err(Error::Aws("Failed to subscribe: simulated outage".to_string()));
        }
        self.subscriptions
            .lock()
            .unwrap()
            .push((protocol.to_string(), endpoint.to_string()));
        Ok("pending confirmation".to_string())
    }

    async fn publish(&self, subject: &str, message: &str) -> Result<String> {
        if self.fail_publish {
            return Err(Error::Aws("Failed to publish to SNS: simulated outage".to_string()));
        }
        let mut published = self.published.lock().unwrap();
        published.push((subject.to_string(), message.to_string()));
        Ok(format!("msg-{}", published.len()))
    }
}

/// Outbox held in memory.
///
/// Unreadable objects are listed before entries, the way stray keys can sort
/// ahead of real ones in a bucket listing.
#[derive(Default)]
pub struct MemoryOutbox {
    live: Mutex<BTreeMap<Uuid, PendingNotification>>,
    unreadable: Mutex<BTreeMap<String, Vec<u8>>>,
    parked: Mutex<Vec<PendingNotification>>,
    parked_unreadable: Mutex<Vec<String>>,
}

impl MemoryOutbox {
    pub fn entries(&self) -> Vec<PendingNotification> {
        self.live.lock().unwrap().values().cloned().collect()
    }

    pub fn parked(&self) -> Vec<PendingNotification> {
        self.parked.lock().unwrap().clone()
    }

    /// Drop an object that is not a valid entry under the outbox prefix.
    pub fn insert_unreadable(&self, key: &str, body: &[u8]) {
        self.unreadable
            .lock()
            .unwrap()
            .insert(key.to_string(), body.to_vec());
    }

    pub fn parked_unreadable(&self) -> Vec<String> {
        self.parked_unreadable.lock().unwrap().clone()
    }
}

#[async_trait]
impl Outbox for MemoryOutbox {
    async fn record(&self, notification: &PendingNotification) -> Result<()> {
        self.live
            .lock()
            .unwrap()
            .insert(notification.id, notification.clone());
        Ok(())
    }

    async fn pending(&self, limit: u32) -> Result<PendingBatch> {
        let limit = limit as usize;

        let unreadable: Vec<UnreadableEntry> = self
            .unreadable
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .map(|(key, body)| UnreadableEntry {
                key: key.clone(),
                body: body.clone(),
                reason: "not a pending notification".to_string(),
            })
            .collect();

        let entries = self
            .live
            .lock()
            .unwrap()
            .values()
            .take(limit - unreadable.len())
            .cloned()
            .collect();

        Ok(PendingBatch {
            entries,
            unreadable,
        })
    }

    async fn complete(&self, id: Uuid) -> Result<()> {
        self.live.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn abandon(&self, notification: &PendingNotification) -> Result<()> {
        self.live.lock().unwrap().remove(&notification.id);
        self.parked.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn park_unreadable(&self, entry: &UnreadableEntry) -> Result<()> {
        self.unreadable.lock().unwrap().remove(&entry.key);
        self.parked_unreadable.lock().unwrap().push(entry.key.clone());
        Ok(())
    }
}
