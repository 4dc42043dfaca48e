//! Per-node subscription tables.
//!
//! Every node owns a [`SubscriptionTable`] mapping process-wide unique
//! [`SubscriptionId`]s to [`Subscription`] descriptors. Ids grow
//! monotonically, so iteration order within a table is subscription order.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{ArborResult, DispatchError, ValidationError};
use crate::service::Command;
use crate::spool::SpooledOp;
use crate::tree::{NodeId, Tree};
use crate::value::Value;

use super::event::{Event, Phase};
use super::filter::{NameFilter, Spec};

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Allocates the next process-wide id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap an existing raw id.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Signature of a subscriber function.
pub type HandlerFn = dyn Fn(&mut Invocation<'_>) -> ArborResult<Option<Value>>;

/// Callable attached to a subscription.
#[derive(Clone)]
pub enum Handler {
    /// A plain function.
    Func(Rc<HandlerFn>),
    /// A service command with an `enabled` toggle.
    Command(Rc<Command>),
}

impl Handler {
    /// Wraps a closure as a handler.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&mut Invocation<'_>) -> ArborResult<Option<Value>> + 'static,
    {
        Self::Func(Rc::new(func))
    }

    /// The wrapped service command, if any.
    #[must_use]
    pub fn as_command(&self) -> Option<&Rc<Command>> {
        match self {
            Self::Command(cmd) => Some(cmd),
            Self::Func(_) => None,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Func(_) => f.write_str("Handler::Func"),
            Self::Command(cmd) => f.debug_tuple("Handler::Command").field(cmd).finish(),
        }
    }
}

/// Everything a handler sees while it runs.
///
/// The tree is handed out mutably, so handlers may publish, subscribe or
/// unsubscribe re-entrantly.
pub struct Invocation<'a> {
    tree: &'a mut Tree,
    ctx: NodeId,
    origin: Option<NodeId>,
    event: Option<&'a mut Event>,
    args: Vec<Value>,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(
        tree: &'a mut Tree,
        ctx: NodeId,
        origin: Option<NodeId>,
        event: Option<&'a mut Event>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            tree,
            ctx,
            origin,
            event,
            args,
        }
    }

    /// The tree being dispatched on.
    pub fn tree(&mut self) -> &mut Tree {
        &mut *self.tree
    }

    /// The node the handler executes against.
    #[must_use]
    pub const fn ctx(&self) -> NodeId {
        self.ctx
    }

    /// The traversal's originating node, when the subscription asked for it.
    #[must_use]
    pub const fn origin(&self) -> Option<NodeId> {
        self.origin
    }

    /// The in-flight event, unless the subscription set `noevent`.
    pub fn event(&mut self) -> Option<&mut Event> {
        self.event.as_deref_mut()
    }

    /// Subscription-bound arguments followed by publish arguments.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Argument at `index`.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }
}

/// A stored subscription descriptor.
#[allow(missing_docs)]
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub name: NameFilter,
    pub spec: Spec,
    pub ctx: NodeId,
    pub func: Handler,
    pub args: Vec<Value>,
    pub capturing: bool,
    pub spreading: bool,
    pub bubbling: bool,
    pub noevent: bool,
    pub exclusive: bool,
    pub origin: bool,
}

impl Subscription {
    /// Targeting always applies; other phases are opt-in per flag.
    #[must_use]
    pub const fn fires_in(&self, phase: Phase) -> bool {
        match phase {
            Phase::Capturing => self.capturing,
            Phase::Targeting => true,
            Phase::Spreading => self.spreading,
            Phase::Bubbling => self.bubbling,
        }
    }
}

/// Options for [`Tree::subscribe`].
///
/// # Example
/// ```rust,ignore
/// let id = tree.subscribe(
///     panel,
///     Subscribe::new("resize", |inv| {
///         inv.event().map(|ev| ev.set_processing(false));
///         Ok(None)
///     })
///     .capturing(true)
///     .exclusive(true),
/// )?;
/// ```
#[derive(Debug, Clone)]
pub struct Subscribe {
    name: NameFilter,
    spec: Spec,
    ctx: Option<NodeId>,
    func: Handler,
    args: Vec<Value>,
    capturing: bool,
    spreading: bool,
    bubbling: bool,
    noevent: bool,
    exclusive: bool,
    origin: bool,
    spool: Option<String>,
}

impl Subscribe {
    /// Subscribes `func` to events accepted by `name`.
    pub fn new<F>(name: impl Into<NameFilter>, func: F) -> Self
    where
        F: Fn(&mut Invocation<'_>) -> ArborResult<Option<Value>> + 'static,
    {
        Self::with_handler(name, Handler::new(func))
    }

    /// Subscribes an already wrapped handler.
    #[must_use]
    pub fn with_handler(name: impl Into<NameFilter>, func: Handler) -> Self {
        Self {
            name: name.into(),
            spec: Spec::new(),
            ctx: None,
            func,
            args: Vec::new(),
            capturing: false,
            spreading: false,
            bubbling: true,
            noevent: false,
            exclusive: false,
            origin: false,
            spool: None,
        }
    }

    /// Only match events whose spec contains `spec`.
    #[must_use]
    pub fn spec(mut self, spec: Spec) -> Self {
        self.spec = spec;
        self
    }

    /// Node the handler executes against (default: the subscribing node).
    #[must_use]
    pub fn ctx(mut self, ctx: NodeId) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Binds one argument passed ahead of publish arguments.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Binds arguments passed ahead of publish arguments.
    #[must_use]
    pub fn args(mut self, args: impl IntoIterator<Item = Value>) -> Self {
        self.args.extend(args);
        self
    }

    /// Fire during capturing.
    #[must_use]
    pub fn capturing(mut self, capturing: bool) -> Self {
        self.capturing = capturing;
        self
    }

    /// Fire during spreading.
    #[must_use]
    pub fn spreading(mut self, spreading: bool) -> Self {
        self.spreading = spreading;
        self
    }

    /// Fire during bubbling.
    #[must_use]
    pub fn bubbling(mut self, bubbling: bool) -> Self {
        self.bubbling = bubbling;
        self
    }

    /// Do not hand the event to the handler; its return value is folded into the result.
    #[must_use]
    pub fn noevent(mut self, noevent: bool) -> Self {
        self.noevent = noevent;
        self
    }

    /// Reject the subscription if a matching subscriber already exists.
    #[must_use]
    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    /// Hand the traversal's originating node to the handler.
    #[must_use]
    pub fn origin(mut self, origin: bool) -> Self {
        self.origin = origin;
        self
    }

    /// Record the reverse `unsubscribe` under this spool name.
    #[must_use]
    pub fn spool(mut self, spool: impl Into<String>) -> Self {
        self.spool = Some(spool.into());
        self
    }

    fn into_subscription(self, id: SubscriptionId, node: NodeId) -> (Subscription, Option<String>) {
        let subscription = Subscription {
            id,
            name: self.name,
            spec: self.spec,
            ctx: self.ctx.unwrap_or(node),
            func: self.func,
            args: self.args,
            capturing: self.capturing,
            spreading: self.spreading,
            bubbling: self.bubbling,
            noevent: self.noevent,
            exclusive: self.exclusive,
            origin: self.origin,
        };
        (subscription, self.spool)
    }
}

/// Subscriptions owned by one node.
#[derive(Debug, Default)]
pub struct SubscriptionTable {
    entries: BTreeMap<SubscriptionId, Subscription>,
}

impl SubscriptionTable {
    /// Number of subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `id` is present.
    #[must_use]
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Looks up a subscription.
    #[must_use]
    pub fn get(&self, id: SubscriptionId) -> Option<&Subscription> {
        self.entries.get(&id)
    }

    pub(crate) fn insert(&mut self, subscription: Subscription) {
        self.entries.insert(subscription.id, subscription);
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> Option<Subscription> {
        self.entries.remove(&id)
    }

    /// Subscriptions in subscription order.
    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.entries.values()
    }

    /// Snapshot of every subscription whose filter accepts `event`.
    #[must_use]
    pub fn matching(&self, event: &Event) -> Vec<Subscription> {
        self.iter()
            .filter(|s| event.matches(&s.name, &s.spec))
            .cloned()
            .collect()
    }

    /// Snapshot of the subscriptions accepting `event` that take part in `phase`.
    #[must_use]
    pub fn matching_in_phase(&self, event: &Event, phase: Phase) -> Vec<Subscription> {
        self.iter()
            .filter(|s| s.fires_in(phase) && event.matches(&s.name, &s.spec))
            .cloned()
            .collect()
    }
}

impl Tree {
    /// Attaches a subscription to `node`.
    ///
    /// Returns `DispatchError::ExclusivityViolation` if `exclusive` is set and
    /// a subscriber on `node` already matches the new subscription's name/spec.
    /// For pattern filters the expression's source text is used as the probe name.
    pub fn subscribe(&mut self, node: NodeId, params: Subscribe) -> ArborResult<SubscriptionId> {
        if params.name.is_empty() {
            return Err(ValidationError::EmptyEventName.into());
        }
        self.node(node)?;

        if params.exclusive {
            let existing = self.subscribers(node, params.name.as_str(), &params.spec)?;
            if !existing.is_empty() {
                return Err(DispatchError::ExclusivityViolation {
                    node,
                    name: params.name.as_str().to_string(),
                }
                .into());
            }
        }

        let id = SubscriptionId::next();
        let (subscription, spool) = params.into_subscription(id, node);
        let entry = self.node_mut(node)?;
        entry.table.insert(subscription);
        if let Some(spool) = spool {
            entry.spools.push(spool, SpooledOp::Unsubscribe(id));
        }
        Ok(id)
    }

    /// Removes a subscription from `node`.
    ///
    /// Returns `DispatchError::UnknownSubscription` if `id` is not present on `node`.
    pub fn unsubscribe(&mut self, node: NodeId, id: SubscriptionId) -> ArborResult<()> {
        self.node_mut(node)?
            .table
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| DispatchError::UnknownSubscription { node, id }.into())
    }

    /// Whether `id` exists on `node`. Never fails.
    #[must_use]
    pub fn subscription(&self, node: NodeId, id: SubscriptionId) -> bool {
        self.node(node).is_ok_and(|n| n.table.contains(id))
    }

    /// Every subscription on `node` whose filter accepts the probe `name`/`spec`,
    /// regardless of phase flags.
    pub fn subscribers(&self, node: NodeId, name: &str, spec: &Spec) -> ArborResult<Vec<Subscription>> {
        let probe = Event::builder(name, node).spec(spec.clone()).build()?;
        Ok(self.node(node)?.table.matching(&probe))
    }

    /// Read-only view of the subscription table of `node`.
    pub fn subscription_table(&self, node: NodeId) -> ArborResult<&SubscriptionTable> {
        Ok(&self.node(node)?.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop(_: &mut Invocation<'_>) -> ArborResult<Option<Value>> {
        Ok(None)
    }

    #[test]
    fn ids_are_monotonic() {
        let a = SubscriptionId::next();
        let b = SubscriptionId::next();
        assert!(b > a);
    }

    #[test]
    fn subscribe_and_unsubscribe() {
        let mut tree = Tree::new("root");
        let root = tree.root();
        let id = tree.subscribe(root, Subscribe::new("x", noop)).unwrap();
        assert!(tree.subscription(root, id));
        tree.unsubscribe(root, id).unwrap();
        assert!(!tree.subscription(root, id));

        let err = tree.unsubscribe(root, id).unwrap_err();
        assert!(err.is_unknown_subscription());
    }

    #[test]
    fn subscription_on_unknown_node_is_false() {
        let tree = Tree::new("root");
        assert!(!tree.subscription(NodeId::from_raw(5), SubscriptionId::from_raw(1)));
    }

    #[test]
    fn defaults_follow_option_table() {
        let mut tree = Tree::new("root");
        let root = tree.root();
        let id = tree.subscribe(root, Subscribe::new("x", noop)).unwrap();
        let table = tree.subscription_table(root).unwrap();
        let s = table.get(id).unwrap();
        assert!(!s.capturing);
        assert!(!s.spreading);
        assert!(s.bubbling);
        assert!(!s.noevent);
        assert!(!s.exclusive);
        assert!(!s.origin);
        assert_eq!(s.ctx, root);
        assert!(s.fires_in(Phase::Targeting));
        assert!(!s.fires_in(Phase::Capturing));
    }

    #[test]
    fn subscribers_ignore_phase_flags() {
        let mut tree = Tree::new("root");
        let root = tree.root();
        tree.subscribe(root, Subscribe::new("x", noop).bubbling(false)).unwrap();
        tree.subscribe(root, Subscribe::new("x", noop).capturing(true)).unwrap();
        tree.subscribe(root, Subscribe::new("y", noop)).unwrap();
        assert_eq!(tree.subscribers(root, "x", &Spec::new()).unwrap().len(), 2);
        assert_eq!(tree.subscribers(root, "z", &Spec::new()).unwrap().len(), 0);
    }

    #[test]
    fn subscribers_respect_spec() {
        let mut tree = Tree::new("root");
        let root = tree.root();
        let spec = json!({"kind": "a"}).as_object().cloned().unwrap();
        tree.subscribe(root, Subscribe::new("x", noop).spec(spec.clone())).unwrap();
        assert_eq!(tree.subscribers(root, "x", &spec).unwrap().len(), 1);
        assert!(tree.subscribers(root, "x", &Spec::new()).unwrap().is_empty());
    }

    #[test]
    fn exclusive_rejects_second_matcher() {
        let mut tree = Tree::new("root");
        let root = tree.root();
        tree.subscribe(root, Subscribe::new("x", noop)).unwrap();
        let err = tree
            .subscribe(root, Subscribe::new("x", noop).exclusive(true))
            .unwrap_err();
        assert!(err.is_exclusivity_violation());

        // A different name is fine.
        tree.subscribe(root, Subscribe::new("y", noop).exclusive(true)).unwrap();
    }

    #[test]
    fn empty_name_rejected() {
        let mut tree = Tree::new("root");
        let root = tree.root();
        let err = tree.subscribe(root, Subscribe::new("", noop)).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn table_iterates_in_subscription_order() {
        let mut tree = Tree::new("root");
        let root = tree.root();
        let ids: Vec<_> = (0..5)
            .map(|_| tree.subscribe(root, Subscribe::new("x", noop)).unwrap())
            .collect();
        let seen: Vec<_> = tree.subscription_table(root).unwrap().iter().map(|s| s.id).collect();
        assert_eq!(seen, ids);
    }
}
