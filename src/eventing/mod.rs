//! Hierarchical publish/subscribe.
//!
//! Subscriptions live on nodes of a [`Tree`](crate::Tree). A publish against a
//! target node walks the tree in four phases (capturing, targeting, spreading,
//! bubbling) and invokes every matching subscription flagged for the phase.

pub(crate) mod dispatcher;

/// Event value and phases.
pub mod event;
/// Name and spec filters.
pub mod filter;
/// Publish options and return selection.
pub mod publish;
/// Per-node subscription tables.
pub mod table;

pub use event::{Event, EventBuilder, EventId, Phase};
pub use filter::{spec_matches, NameFilter, Spec};
pub use publish::{Completed, Publish, Published, ResultStep};
pub use table::{Handler, HandlerFn, Invocation, Subscribe, Subscription, SubscriptionId, SubscriptionTable};
