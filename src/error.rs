//! Error taxonomy.
//!
//! Option validation, dispatch failures and handler failures are kept in
//! separate enums and folded into [`ArborError`].

use thiserror::Error;

use crate::eventing::SubscriptionId;
use crate::tree::NodeId;

/// Validation errors raised at the option/builder boundary.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A publish or subscribe named no event.
    #[error("Event name cannot be empty")]
    EmptyEventName,

    /// A register or call named no service.
    #[error("Service name cannot be empty")]
    EmptyServiceName,

    /// A name filter pattern failed to compile.
    #[error("Invalid name pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Source text of the rejected expression.
        pattern: String,
        /// Compiler message.
        reason: String,
    },
}

/// Errors produced by the eventing and service operations themselves.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// An exclusive subscription met an existing matching subscriber.
    #[error("Exclusive subscription for '{name}' on node {node} conflicts with an existing subscriber")]
    ExclusivityViolation {
        /// Node that already holds a matching subscriber.
        node: NodeId,
        /// Name filter of the rejected subscription.
        name: String,
    },

    /// The subscription id is not present on the node.
    #[error("Subscription {id} not found on node {node}")]
    UnknownSubscription {
        /// Node that was searched.
        node: NodeId,
        /// Missing id.
        id: SubscriptionId,
    },

    /// No enabled handler answered a service call.
    #[error("No such registered service found: \"{name}\"")]
    ServiceNotFound {
        /// Service name as passed to `call`.
        name: String,
    },

    /// The node id does not belong to this tree.
    #[error("Node not found: {id}")]
    NodeNotFound {
        /// Unknown id.
        id: NodeId,
    },

    /// The task queue is full.
    #[error("Task queue saturated (capacity {capacity})")]
    SchedulerSaturated {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// The task queue's receiving side is gone.
    #[error("Task queue disconnected")]
    SchedulerDisconnected,
}

/// Top-level error type for arbor.
#[derive(Debug, Error)]
pub enum ArborError {
    /// Rejected options.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Failed eventing or service operation.
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Error returned by a subscriber or service function.
    #[error("Handler error: {message}")]
    Handler {
        /// Handler-supplied description.
        message: String,
    },

    /// Broken internal invariant.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl ArborError {
    /// Creates an error raised from inside a subscriber.
    #[must_use]
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a dispatch error.
    #[must_use]
    pub const fn is_dispatch(&self) -> bool {
        matches!(self, Self::Dispatch(_))
    }

    /// Returns true if this error was raised by a handler.
    #[must_use]
    pub const fn is_handler(&self) -> bool {
        matches!(self, Self::Handler { .. })
    }

    /// Returns true if a service call found no enabled handler.
    #[must_use]
    pub const fn is_service_not_found(&self) -> bool {
        matches!(self, Self::Dispatch(DispatchError::ServiceNotFound { .. }))
    }

    /// Returns true if an exclusive subscription was rejected.
    #[must_use]
    pub const fn is_exclusivity_violation(&self) -> bool {
        matches!(self, Self::Dispatch(DispatchError::ExclusivityViolation { .. }))
    }

    /// Returns true if an unknown subscription id was used.
    #[must_use]
    pub const fn is_unknown_subscription(&self) -> bool {
        matches!(self, Self::Dispatch(DispatchError::UnknownSubscription { .. }))
    }
}

/// Result type alias for arbor operations.
pub type ArborResult<T> = Result<T, ArborError>;
