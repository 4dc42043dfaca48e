//! Arena-backed component tree.
//!
//! Nodes are addressed by stable [`NodeId`]s. Each node owns an ordered list
//! of child ids and a non-owning back-reference to its parent. The dispatch
//! engine only relies on the [`Hierarchy`] contract: `path()` and `children()`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ArborResult, DispatchError};
use crate::eventing::SubscriptionTable;
use crate::scheduler::Scheduler;
use crate::spool::SpoolRegistry;

/// Stable identifier of a node in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// Wraps a raw arena index.
    #[must_use]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Returns the raw arena index.
    #[must_use]
    pub const fn as_raw(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two tree queries the dispatch engine depends on.
pub trait Hierarchy {
    /// Ancestors of `node` ordered root-to-self, `node` included.
    fn path(&self, node: NodeId) -> ArborResult<Vec<NodeId>>;

    /// Direct descendants of `node` in order.
    fn children(&self, node: NodeId) -> ArborResult<Vec<NodeId>>;
}

/// Tree configuration.
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Max queued asynchronous tasks before publishing fails.
    pub task_queue_capacity: usize,
    /// Upper bound on ticks performed by `run_until_idle`.
    pub max_ticks: usize,
    /// Emit tracing records for publish and per-node dispatch.
    pub trace_dispatch: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            task_queue_capacity: 4096,
            max_ticks: 1024,
            trace_dispatch: true,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) table: SubscriptionTable,
    pub(crate) spools: SpoolRegistry,
}

impl Node {
    fn new(name: String, parent: Option<NodeId>) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            table: SubscriptionTable::default(),
            spools: SpoolRegistry::default(),
        }
    }
}

/// A component tree carrying per-node subscription tables and the
/// task queue used for asynchronous dispatch.
///
/// # Examples
///
/// ```
/// use arbor::{Hierarchy, Tree};
///
/// let mut tree = Tree::new("app");
/// let panel = tree.add_child(tree.root(), "panel").unwrap();
/// let button = tree.add_child(panel, "button").unwrap();
///
/// assert_eq!(tree.path(button).unwrap(), vec![tree.root(), panel, button]);
/// assert_eq!(tree.path_string(button), "/app/panel/button");
/// ```
#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Node>,
    pub(crate) config: TreeConfig,
    pub(crate) scheduler: Scheduler,
}

impl Tree {
    /// Creates a tree holding a single root node.
    #[must_use]
    pub fn new(root_name: impl Into<String>) -> Self {
        Self::with_config(root_name, TreeConfig::default())
    }

    /// Creates a tree with an explicit configuration.
    #[must_use]
    pub fn with_config(root_name: impl Into<String>, config: TreeConfig) -> Self {
        let scheduler = Scheduler::new(config.task_queue_capacity);
        Self {
            nodes: vec![Node::new(root_name.into(), None)],
            config,
            scheduler,
        }
    }

    /// The root node.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree always holds its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `node` belongs to this tree.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len()
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Appends a new child under `parent` and returns its id.
    pub fn add_child(&mut self, parent: NodeId, name: impl Into<String>) -> ArborResult<NodeId> {
        self.node(parent)?;
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(name.into(), Some(parent)));
        self.node_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Name of `node`.
    pub fn name(&self, node: NodeId) -> ArborResult<&str> {
        Ok(&self.node(node)?.name)
    }

    /// Parent of `node`, `None` for the root.
    pub fn parent(&self, node: NodeId) -> ArborResult<Option<NodeId>> {
        Ok(self.node(node)?.parent)
    }

    /// Slash-separated names from the root down to `node`.
    #[must_use]
    pub fn path_string(&self, node: NodeId) -> String {
        match self.path(node) {
            Ok(path) => path
                .iter()
                .filter_map(|id| self.nodes.get(id.0))
                .fold(String::new(), |mut out, n| {
                    out.push('/');
                    out.push_str(&n.name);
                    out
                }),
            Err(_) => format!("<unknown node {node}>"),
        }
    }

    pub(crate) fn node(&self, node: NodeId) -> ArborResult<&Node> {
        self.nodes
            .get(node.0)
            .ok_or_else(|| DispatchError::NodeNotFound { id: node }.into())
    }

    pub(crate) fn node_mut(&mut self, node: NodeId) -> ArborResult<&mut Node> {
        self.nodes
            .get_mut(node.0)
            .ok_or_else(|| DispatchError::NodeNotFound { id: node }.into())
    }

    pub(crate) fn tracing_enabled(&self, silent: bool) -> bool {
        self.config.trace_dispatch && !silent
    }
}

impl Hierarchy for Tree {
    fn path(&self, node: NodeId) -> ArborResult<Vec<NodeId>> {
        let mut path = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            current = self.node(id)?.parent;
            path.push(id);
        }
        path.reverse();
        Ok(path)
    }

    fn children(&self, node: NodeId) -> ArborResult<Vec<NodeId>> {
        Ok(self.node(node)?.children.clone())
    }
}
