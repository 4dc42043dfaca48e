//! # Arbor - hierarchical event dispatch
//!
//! Arbor routes named events through a tree of nodes. Every node carries a
//! subscription table; a publish against a target node walks the tree in up
//! to four phases and invokes the subscriptions that match.
//!
//! ## Core Concepts
//!
//! - **Tree**: An arena of named nodes addressed by [`NodeId`]
//! - **Subscription**: A handler bound to a node, an event name filter and a spec
//! - **Publish**: One traversal of capturing, targeting, spreading and bubbling
//! - **Service**: An exclusive, toggleable subscription called by name
//! - **Spool**: A named list of reverse operations replayed by `unspool`
//!
//! ## Usage
//!
//! ```rust
//! use arbor::{CallService, Publish, Register, Subscribe, Tree, Value};
//!
//! let mut tree = Tree::new("app");
//! let root = tree.root();
//! let view = tree.add_child(root, "view").unwrap();
//!
//! tree.subscribe(root, Subscribe::new("clicked", |_| Ok(None))).unwrap();
//! let event = tree.publish(view, Publish::new("clicked")).unwrap().into_event().unwrap();
//! assert!(event.dispatched());
//!
//! tree.register(root, Register::new("version", |_| Ok(Some(Value::from("1.0"))))).unwrap();
//! let version = tree.call(view, CallService::new("version")).unwrap();
//! assert_eq!(version, Some(Value::from("1.0")));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod eventing;
pub(crate) mod scheduler;
pub mod service;
pub mod spool;
pub mod tree;
pub mod value;

pub use error::{ArborError, ArborResult, DispatchError, ValidationError};
pub use eventing::{
    Event, EventId, Handler, Invocation, NameFilter, Phase, Publish, Published, Spec, Subscribe, Subscription,
    SubscriptionId,
};
pub use service::{CallService, Command, Register};
pub use spool::SpooledOp;
pub use tree::{Hierarchy, NodeId, Tree, TreeConfig};
pub use value::Value;
