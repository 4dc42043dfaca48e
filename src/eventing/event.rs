//! The event value threaded through one publish operation.
//!
//! Identity fields (`id`, `name`, `spec`, `target`, `async`) are fixed at
//! construction. State fields are updated by the dispatcher and by handlers
//! while the event travels through the tree.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ArborResult, ValidationError};
use crate::tree::NodeId;
use crate::value::Value;

use super::filter::{spec_matches, NameFilter, Spec};

/// Unique identifier for a published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dispatch phase during which a handler is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Root down to the target's parent.
    Capturing,
    /// The target node itself.
    Targeting,
    /// Pre-order through the target's descendants.
    Spreading,
    /// The target's parent up to the root.
    Bubbling,
}

impl Phase {
    /// Lowercase phase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Capturing => "capturing",
            Self::Targeting => "targeting",
            Self::Spreading => "spreading",
            Self::Bubbling => "bubbling",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One in-flight or completed publish operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: EventId,
    name: String,
    spec: Spec,
    target: NodeId,
    propagation: bool,
    processing: bool,
    dispatched: bool,
    decline: bool,
    state: Phase,
    result: Option<Value>,
    #[serde(rename = "async")]
    is_async: bool,
    published_at: DateTime<Utc>,
}

impl Event {
    /// Starts building an event for `name` published against `target`.
    #[must_use]
    pub fn builder(name: impl Into<String>, target: NodeId) -> EventBuilder {
        EventBuilder::new(name, target)
    }

    /// Unique id of this publish.
    #[must_use]
    pub const fn id(&self) -> EventId {
        self.id
    }

    /// Published event name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Published spec.
    #[must_use]
    pub const fn spec(&self) -> &Spec {
        &self.spec
    }

    /// Node the event was published against.
    #[must_use]
    pub const fn target(&self) -> NodeId {
        self.target
    }

    /// Whether the traversal was deferred to the scheduler.
    #[must_use]
    pub const fn is_async(&self) -> bool {
        self.is_async
    }

    /// Time the event was created.
    #[must_use]
    pub const fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    /// Whether traversal continues after the current handler.
    #[must_use]
    pub const fn propagation(&self) -> bool {
        self.propagation
    }

    /// Sets the propagation flag.
    pub fn set_propagation(&mut self, propagation: bool) {
        self.propagation = propagation;
    }

    /// Stops the current phase. During spreading only the current subtree is skipped.
    pub fn stop_propagation(&mut self) {
        self.propagation = false;
    }

    /// Whether default processing should still happen after dispatch.
    #[must_use]
    pub const fn processing(&self) -> bool {
        self.processing
    }

    /// Sets the advisory processing flag.
    pub fn set_processing(&mut self, processing: bool) {
        self.processing = processing;
    }

    /// Whether at least one handler matched and did not decline.
    #[must_use]
    pub const fn dispatched(&self) -> bool {
        self.dispatched
    }

    pub(crate) fn mark_dispatched(&mut self) {
        self.dispatched = true;
    }

    /// Whether the handler currently running declined the event.
    #[must_use]
    pub const fn declined(&self) -> bool {
        self.decline
    }

    /// Sets the decline flag for the current handler.
    pub fn set_decline(&mut self, decline: bool) {
        self.decline = decline;
    }

    /// Signals that the current handler matched but did not act.
    pub fn decline(&mut self) {
        self.decline = true;
    }

    /// Phase of the handler currently running (or last run).
    #[must_use]
    pub const fn state(&self) -> Phase {
        self.state
    }

    /// Phase is owned by the dispatcher; handlers read it through [`Event::state`].
    pub(crate) fn set_state(&mut self, state: Phase) {
        self.state = state;
    }

    /// Accumulated result.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Replaces the accumulated result.
    pub fn set_result(&mut self, result: Option<Value>) {
        self.result = result;
    }

    pub(crate) fn take_result(&mut self) -> Option<Value> {
        self.result.take()
    }

    /// Returns true iff this event is accepted by the given subscription filter.
    #[must_use]
    pub fn matches(&self, name: &NameFilter, spec: &Spec) -> bool {
        name.matches(&self.name) && spec_matches(spec, &self.spec)
    }

    pub(crate) fn into_result(self) -> Option<Value> {
        self.result
    }
}

/// Builder for [`Event`] values.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    name: String,
    target: NodeId,
    spec: Spec,
    propagation: bool,
    processing: bool,
    dispatched: bool,
    decline: bool,
    state: Phase,
    result: Option<Value>,
    is_async: bool,
}

impl EventBuilder {
    fn new(name: impl Into<String>, target: NodeId) -> Self {
        Self {
            name: name.into(),
            target,
            spec: Spec::new(),
            propagation: true,
            processing: true,
            dispatched: false,
            decline: false,
            state: Phase::Targeting,
            result: None,
            is_async: false,
        }
    }

    /// Sets the spec.
    #[must_use]
    pub fn spec(mut self, spec: Spec) -> Self {
        self.spec = spec;
        self
    }

    /// Sets the initial propagation flag.
    #[must_use]
    pub fn propagation(mut self, propagation: bool) -> Self {
        self.propagation = propagation;
        self
    }

    /// Sets the initial processing flag.
    #[must_use]
    pub fn processing(mut self, processing: bool) -> Self {
        self.processing = processing;
        self
    }

    /// Sets the initial dispatched flag.
    #[must_use]
    pub fn dispatched(mut self, dispatched: bool) -> Self {
        self.dispatched = dispatched;
        self
    }

    /// Sets the initial decline flag.
    #[must_use]
    pub fn decline(mut self, decline: bool) -> Self {
        self.decline = decline;
        self
    }

    /// Sets the initial phase.
    #[must_use]
    pub fn state(mut self, state: Phase) -> Self {
        self.state = state;
        self
    }

    /// Sets the initial result.
    #[must_use]
    pub fn result(mut self, result: Option<Value>) -> Self {
        self.result = result;
        self
    }

    /// Marks the event as deferred.
    #[must_use]
    pub fn asynchronous(mut self, is_async: bool) -> Self {
        self.is_async = is_async;
        self
    }

    /// Build the event.
    ///
    /// Returns `ValidationError::EmptyEventName` if the name is empty or whitespace.
    pub fn build(self) -> ArborResult<Event> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyEventName.into());
        }
        Ok(Event {
            id: EventId::new(),
            name: self.name,
            spec: self.spec,
            target: self.target,
            propagation: self.propagation,
            processing: self.processing,
            dispatched: self.dispatched,
            decline: self.decline,
            state: self.state,
            result: self.result,
            is_async: self.is_async,
            published_at: Utc::now(),
        })
    }
}
