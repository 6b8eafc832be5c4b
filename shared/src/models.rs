//! Shared data models.

use std::borrow::Cow;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{Error, Result};

/// Date layout accepted for event dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One announced event, as stored in the events document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub title: String,
    pub date: String,
    pub description: String,
}

impl Event {
    /// Plain-text body of the announcement sent to subscribers.
    pub fn announcement(&self) -> String {
        format!(
            "New Event: {} on {}\n{}",
            self.title, self.date, self.description
        )
    }
}

/// Ordered list of events, serialized as a bare JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventCollection {
    events: Vec<Event>,
}

impl EventCollection {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    /// Parse a stored events document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Serialize the whole collection for storage.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Append at the end, keeping insertion order.
    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }
}

/// Body of `POST /subscribe`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct SubscribeRequest {
    #[serde(default)]
    #[validate(email(message = "Invalid email address."))]
    pub email: Option<String>,
}

impl SubscribeRequest {
    /// Check the address and return it trimmed.
    pub fn validated_email(self) -> Result<String> {
        let email = self
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| Error::Validation("Email not provided.".to_string()))?;

        let trimmed = SubscribeRequest {
            email: Some(email),
        };
        trimmed
            .validate()
            .map_err(|errors| Error::Validation(first_message(&errors, &[("email", "Email")])))?;

        Ok(trimmed.email.unwrap_or_default())
    }
}

/// Body of `POST /create-event`. Missing fields deserialize as empty and are
/// rejected by validation rather than by serde.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CreateEventRequest {
    #[validate(custom(function = "required"))]
    pub title: String,
    #[validate(custom(function = "iso_date"))]
    pub date: String,
    #[validate(custom(function = "required"))]
    pub description: String,
}

impl CreateEventRequest {
    /// Validate every field and turn the request into an event record.
    pub fn into_event(self) -> Result<Event> {
        self.validate().map_err(|errors| {
            Error::Validation(first_message(
                &errors,
                &[
                    ("title", "Title"),
                    ("date", "Date"),
                    ("description", "Description"),
                ],
            ))
        })?;

        Ok(Event {
            title: self.title,
            date: self.date,
            description: self.description,
        })
    }
}

fn required(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

fn iso_date(value: &str) -> std::result::Result<(), ValidationError> {
    required(value)?;

    if NaiveDate::parse_from_str(value, DATE_FORMAT).is_err() {
        let mut error = ValidationError::new("iso_date");
        error.message = Some(Cow::from("Date must be formatted as YYYY-MM-DD."));
        return Err(error);
    }
    Ok(())
}

/// Pick the message of the first failing field, in the given field order.
fn first_message(errors: &ValidationErrors, fields: &[(&str, &str)]) -> String {
    let by_field = errors.field_errors();

    for (field, label) in fields {
        if let Some(error) = by_field.get(*field).and_then(|errs| errs.first()) {
            return match &error.message {
                Some(message) => message.to_string(),
                None => format!("{} is required.", label),
            };
        }
    }

    "Invalid request format.".to_string()
}
