//! `POST /create-event` - append an event to the site's events document and
//! announce it to subscribers.

use lambda_http::{Body, Error, Request, Response};
use shared::http::{json_response, parse_json_object, preflight_response, MessageBody};
use shared::{CreateEventRequest, EventRegistrar};
use tracing::{error, info, warn};

pub const CREATED_MESSAGE: &str = "Event created successfully!";

pub async fn handle(registrar: &EventRegistrar, event: Request) -> Result<Response<Body>, Error> {
    match event.method().as_str() {
        "POST" => {}
        "OPTIONS" => return preflight_response(),
        method => {
            warn!(method = %method, "Rejected create-event request");
            return json_response(405, &MessageBody::new("Method not allowed."));
        }
    }

    let request: CreateEventRequest = match parse_json_object(event.body()) {
        Some(request) => request,
        None => return json_response(400, &MessageBody::new("Invalid request format.")),
    };

    let new_event = match request.into_event() {
        Ok(new_event) => new_event,
        Err(e) => return json_response(e.status_code(), &MessageBody::new(e.to_string())),
    };

    match registrar.register(new_event).await {
        Ok(registration) => {
            info!(
                events_stored = registration.events_stored,
                message_id = %registration.message_id,
                "Event created"
            );
            json_response(200, &MessageBody::new(CREATED_MESSAGE))
        }
        Err(e) => {
            error!(error = %e, "Event creation failed");
            json_response(e.status_code(), &MessageBody::new(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_http::http;
    use shared::testing::{MemoryEventStore, MemoryOutbox, RecordingNotifier};
    use shared::Event;
    use std::sync::Arc;

    const MEETUP: &str = r#"{"title":"Tech Meetup","date":"2024-12-01","description":"A gathering of tech enthusiasts!"}"#;

    struct Harness {
        store: Arc<MemoryEventStore>,
        notifier: Arc<RecordingNotifier>,
        outbox: Arc<MemoryOutbox>,
    }

    impl Harness {
        fn new(store: MemoryEventStore, notifier: RecordingNotifier) -> Self {
            Self {
                store: Arc::new(store),
                notifier: Arc::new(notifier),
                outbox: Arc::new(MemoryOutbox::default()),
            }
        }

        fn seeded() -> Self {
            Self::new(
                MemoryEventStore::with_events(vec![
                    Event {
                        title: "Rust Night".to_string(),
                        date: "2024-10-02".to_string(),
                        description: "Lightning talks".to_string(),
                    },
                    Event {
                        title: "Hack Day".to_string(),
                        date: "2024-11-15".to_string(),
                        description: "Build something".to_string(),
                    },
                ]),
                RecordingNotifier::default(),
            )
        }

        fn registrar(&self) -> EventRegistrar {
            EventRegistrar::new(
                self.store.clone(),
                self.notifier.clone(),
                self.outbox.clone(),
                "New Event Announcement",
            )
        }

        async fn send(&self, method: &str, body: &str) -> Response<Body> {
            let request = http::Request::builder()
                .method(method)
                .uri("/create-event")
                .body(Body::from(body.to_string()))
                .unwrap();
            handle(&self.registrar(), request).await.unwrap()
        }

        async fn post(&self, body: &str) -> Response<Body> {
            self.send("POST", body).await
        }
    }

    fn message(response: &Response<Body>) -> String {
        let body: serde_json::Value = serde_json::from_slice(response.body().as_ref()).unwrap();
        body["message"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_creates_and_announces() {
        let harness = Harness::seeded();

        let response = harness.post(MEETUP).await;

        assert_eq!(response.status(), 200);
        assert_eq!(message(&response), CREATED_MESSAGE);

        let stored = harness.store.events().unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored.last().unwrap().title, "Tech Meetup");
        assert_eq!(
            harness.notifier.published(),
            vec![(
                "New Event Announcement".to_string(),
                "New Event: Tech Meetup on 2024-12-01\nA gathering of tech enthusiasts!".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_validation_happens_before_side_effects() {
        let harness = Harness::seeded();

        let response = harness
            .post(r#"{"title":"Tech Meetup","date":"next week","description":"Talks"}"#)
            .await;
        assert_eq!(response.status(), 400);
        assert_eq!(message(&response), "Date must be formatted as YYYY-MM-DD.");

        let response = harness.post(r#"{"date":"2024-12-01","description":"Talks"}"#).await;
        assert_eq!(response.status(), 400);
        assert_eq!(message(&response), "Title is required.");

        let response = harness.post("not json").await;
        assert_eq!(response.status(), 400);
        assert_eq!(message(&response), "Invalid request format.");

        assert_eq!(harness.store.loads(), 0);
        assert!(harness.notifier.published().is_empty());
    }

    #[tokio::test]
    async fn test_storage_read_failure() {
        let harness = Harness::new(MemoryEventStore::failing_load(), RecordingNotifier::default());

        let response = harness.post(MEETUP).await;

        assert_eq!(response.status(), 500);
        assert!(message(&response).contains("simulated read failure"));
        assert_eq!(harness.store.saves(), 0);
        assert!(harness.notifier.published().is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_after_write() {
        let harness = Harness::new(
            MemoryEventStore::with_events(Vec::new()),
            RecordingNotifier::failing_publish(),
        );

        let response = harness.post(MEETUP).await;

        assert_eq!(response.status(), 500);
        assert!(message(&response).contains("simulated outage"));
        assert_eq!(harness.store.events().unwrap().len(), 1);
        assert_eq!(harness.outbox.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_stored_document() {
        let harness = Harness::new(MemoryEventStore::missing(), RecordingNotifier::default());

        let response = harness.post(MEETUP).await;

        assert_eq!(response.status(), 500);
        assert!(harness.notifier.published().is_empty());
    }

    #[tokio::test]
    async fn test_preflight_and_method() {
        let harness = Harness::seeded();

        let response = harness.send("OPTIONS", "").await;
        assert_eq!(response.status(), 204);
        assert_eq!(
            response.headers().get("access-control-allow-methods").unwrap(),
            "OPTIONS,POST"
        );

        let response = harness.send("GET", MEETUP).await;
        assert_eq!(response.status(), 405);
        assert_eq!(message(&response), "Method not allowed.");

        assert_eq!(harness.store.loads(), 0);
        assert!(harness.notifier.published().is_empty());
    }
}
