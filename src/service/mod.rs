//! Named services on top of the event layer.
//!
//! [`Tree::register`](crate::Tree::register) attaches a [`Command`] to a node
//! as an exclusive subscription on `"service:<name>"`;
//! [`Tree::call`](crate::Tree::call) publishes that event with `first_only`
//! and hands back whatever the first enabled command returned.

mod command;
mod registry;

pub use command::Command;
pub use registry::{service_enabled_event_name, service_event_name, CallService, Register, SERVICE_EVENT_PREFIX};
