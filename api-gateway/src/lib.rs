//! API Gateway handlers for the event announcer.
//!
//! Each route is deployed as its own Lambda binary under `src/bin/`; the
//! request handling lives here so it can run against in-memory fakes.

pub mod handlers;
