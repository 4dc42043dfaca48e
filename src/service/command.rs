//! Command wrapper used as the handler of a registered service.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::error::ArborResult;
use crate::eventing::{Event, HandlerFn, Invocation};
use crate::scheduler::Task;
use crate::tree::{NodeId, Tree};
use crate::value::Value;

/// A service function bound to a context node and arguments, with an
/// `enabled` toggle.
///
/// A disabled command declines every event it receives, so it never counts
/// as dispatched. An asynchronous command defers its function to the next
/// scheduler tick and yields no value.
pub struct Command {
    ctx: NodeId,
    func: Rc<HandlerFn>,
    args: Vec<Value>,
    is_async: bool,
    enabled: Cell<bool>,
}

impl Command {
    pub(crate) fn new(ctx: NodeId, func: Rc<HandlerFn>, args: Vec<Value>, is_async: bool) -> Self {
        Self {
            ctx,
            func,
            args,
            is_async,
            enabled: Cell::new(true),
        }
    }

    /// Node the function runs against.
    #[must_use]
    pub const fn ctx(&self) -> NodeId {
        self.ctx
    }

    /// Bound arguments.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Whether calls are deferred to the scheduler.
    #[must_use]
    pub const fn is_async(&self) -> bool {
        self.is_async
    }

    /// Current toggle.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Sets the toggle and returns the previous value.
    pub(crate) fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.replace(enabled)
    }

    /// Entry point used by the dispatcher.
    pub(crate) fn dispatch(
        self: &Rc<Self>,
        tree: &mut Tree,
        event: &mut Event,
        noevent: bool,
        origin: Option<NodeId>,
        args: Vec<Value>,
    ) -> ArborResult<Option<Value>> {
        if !self.enabled() {
            event.decline();
            return Ok(None);
        }

        if self.is_async {
            tree.scheduler.enqueue(Task::Invocation {
                command: Rc::clone(self),
                origin,
                args,
            })?;
            return Ok(None);
        }

        let event = if noevent { None } else { Some(event) };
        self.call(tree, event, origin, args)
    }

    /// Runs the wrapped function with bound arguments ahead of `args`.
    pub(crate) fn call(
        &self,
        tree: &mut Tree,
        event: Option<&mut Event>,
        origin: Option<NodeId>,
        args: Vec<Value>,
    ) -> ArborResult<Option<Value>> {
        let mut all = Vec::with_capacity(self.args.len() + args.len());
        all.extend(self.args.iter().cloned());
        all.extend(args);

        let mut invocation = Invocation::new(tree, self.ctx, origin, event, all);
        (self.func)(&mut invocation)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("ctx", &self.ctx)
            .field("args", &self.args)
            .field("async", &self.is_async)
            .field("enabled", &self.enabled.get())
            .finish_non_exhaustive()
    }
}
