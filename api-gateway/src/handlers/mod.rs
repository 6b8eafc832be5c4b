//! Request handlers, one module per route.

pub mod create_event;
pub mod subscribe;
