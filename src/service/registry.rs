//! Service register/call operations.
//!
//! A service is an exclusive, `noevent` subscription on the event
//! `"service:<name>"` whose handler is a [`Command`]. Calling a service
//! publishes that event synchronously with `first_only`, so at most one
//! enabled handler answers.

use std::rc::Rc;

use crate::error::{ArborError, ArborResult, DispatchError, ValidationError};
use crate::eventing::{Handler, HandlerFn, Invocation, Publish, Spec, Subscribe, SubscriptionId};
use crate::spool::SpooledOp;
use crate::tree::{NodeId, Tree};
use crate::value::Value;

use super::command::Command;

/// Namespace prefix of service events.
pub const SERVICE_EVENT_PREFIX: &str = "service:";

/// Event name a service is registered and called under.
#[must_use]
pub fn service_event_name(name: &str) -> String {
    format!("{SERVICE_EVENT_PREFIX}{name}")
}

/// Event name published when a service's `enabled` toggle changes.
#[must_use]
pub fn service_enabled_event_name(name: &str) -> String {
    format!("{SERVICE_EVENT_PREFIX}{name}:enabled")
}

fn validate_service_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyServiceName);
    }
    Ok(())
}

/// Options for [`Tree::register`].
///
/// # Example
/// ```rust,ignore
/// let id = tree.register(
///     store,
///     Register::new("load", |inv| Ok(inv.arg(0).cloned()))
///         .arg("defaults")
///         .spool("lifecycle"),
/// )?;
/// ```
#[derive(Clone)]
pub struct Register {
    name: String,
    ctx: Option<NodeId>,
    func: Rc<HandlerFn>,
    args: Vec<Value>,
    is_async: bool,
    origin: bool,
    spool: Option<String>,
    capturing: bool,
    spreading: bool,
    bubbling: bool,
}

impl Register {
    /// Registers `func` as service `name`.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Invocation<'_>) -> ArborResult<Option<Value>> + 'static,
    {
        Self {
            name: name.into(),
            ctx: None,
            func: Rc::new(func),
            args: Vec::new(),
            is_async: false,
            origin: false,
            spool: None,
            capturing: false,
            spreading: false,
            bubbling: true,
        }
    }

    /// Runs the function against `ctx` instead of the registering node.
    #[must_use]
    pub fn ctx(mut self, ctx: NodeId) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends arguments.
    #[must_use]
    pub fn args(mut self, args: impl IntoIterator<Item = Value>) -> Self {
        self.args.extend(args);
        self
    }

    /// Run the service function on the next tick instead of inline.
    #[must_use]
    pub fn asynchronous(mut self, is_async: bool) -> Self {
        self.is_async = is_async;
        self
    }

    /// Expose the calling node as the invocation origin.
    #[must_use]
    pub fn origin(mut self, origin: bool) -> Self {
        self.origin = origin;
        self
    }

    /// Records the matching `unregister` under `spool`.
    #[must_use]
    pub fn spool(mut self, spool: impl Into<String>) -> Self {
        self.spool = Some(spool.into());
        self
    }

    /// Capturing phase flag.
    #[must_use]
    pub fn capturing(mut self, capturing: bool) -> Self {
        self.capturing = capturing;
        self
    }

    /// Spreading phase flag.
    #[must_use]
    pub fn spreading(mut self, spreading: bool) -> Self {
        self.spreading = spreading;
        self
    }

    /// Bubbling phase flag.
    #[must_use]
    pub fn bubbling(mut self, bubbling: bool) -> Self {
        self.bubbling = bubbling;
        self
    }
}

impl std::fmt::Debug for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Register")
            .field("name", &self.name)
            .field("ctx", &self.ctx)
            .field("args", &self.args)
            .field("async", &self.is_async)
            .field("origin", &self.origin)
            .field("spool", &self.spool)
            .field("capturing", &self.capturing)
            .field("spreading", &self.spreading)
            .field("bubbling", &self.bubbling)
            .finish_non_exhaustive()
    }
}

/// Options for [`Tree::call`].
#[derive(Debug, Clone)]
pub struct CallService {
    name: String,
    args: Vec<Value>,
    capturing: bool,
    spreading: bool,
    bubbling: bool,
}

impl CallService {
    /// Calls service `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            capturing: false,
            spreading: false,
            bubbling: true,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends arguments.
    #[must_use]
    pub fn args(mut self, args: impl IntoIterator<Item = Value>) -> Self {
        self.args.extend(args);
        self
    }

    /// Capturing phase flag.
    #[must_use]
    pub fn capturing(mut self, capturing: bool) -> Self {
        self.capturing = capturing;
        self
    }

    /// Spreading phase flag.
    #[must_use]
    pub fn spreading(mut self, spreading: bool) -> Self {
        self.spreading = spreading;
        self
    }

    /// Bubbling phase flag.
    #[must_use]
    pub fn bubbling(mut self, bubbling: bool) -> Self {
        self.bubbling = bubbling;
        self
    }
}

impl Tree {
    /// Registers a service on `node`.
    ///
    /// Returns `DispatchError::ExclusivityViolation` if `node` already serves `name`.
    pub fn register(&mut self, node: NodeId, params: Register) -> ArborResult<SubscriptionId> {
        validate_service_name(&params.name)?;
        self.node(node)?;

        let ctx = params.ctx.unwrap_or(node);
        let command = Rc::new(Command::new(ctx, params.func, params.args, params.is_async));

        let id = self.subscribe(
            node,
            Subscribe::with_handler(service_event_name(&params.name), Handler::Command(command))
                .ctx(ctx)
                .noevent(true)
                .origin(params.origin)
                .capturing(params.capturing)
                .spreading(params.spreading)
                .bubbling(params.bubbling)
                .exclusive(true),
        )?;

        if let Some(spool) = params.spool {
            self.node_mut(node)?.spools.push(spool, SpooledOp::Unregister(id));
        }

        if self.config.trace_dispatch {
            tracing::debug!(node = %self.path_string(node), service = %params.name, subscription = %id, "service registered");
        }
        Ok(id)
    }

    /// Removes a service registration.
    pub fn unregister(&mut self, node: NodeId, id: SubscriptionId) -> ArborResult<()> {
        self.unsubscribe(node, id)
    }

    /// Gets (`value == None`) or sets a service's `enabled` toggle.
    ///
    /// Getting returns the current toggle, setting returns the previous one.
    /// Returns `Ok(None)` unless exactly one service subscriber for `name`
    /// exists on `node`. A change of the toggle publishes
    /// `"service:<name>:enabled"` asynchronously on `node` with args `[new, old]`.
    pub fn service_enabled(&mut self, node: NodeId, name: &str, value: Option<bool>) -> ArborResult<Option<bool>> {
        validate_service_name(name)?;
        let subscribers = self.subscribers(node, &service_event_name(name), &Spec::new())?;
        let [subscriber] = subscribers.as_slice() else {
            return Ok(None);
        };
        let Some(command) = subscriber.func.as_command().cloned() else {
            return Ok(None);
        };

        let Some(enabled) = value else {
            return Ok(Some(command.enabled()));
        };

        let previous = command.set_enabled(enabled);
        if previous != enabled {
            let notified = self.publish(
                node,
                Publish::new(service_enabled_event_name(name))
                    .arg(enabled)
                    .arg(previous)
                    .local()
                    .asynchronous(true)
                    .no_result(true),
            );
            // The toggle only changes if its notification was queued.
            if let Err(err) = notified {
                command.set_enabled(previous);
                return Err(err);
            }
        }
        Ok(Some(previous))
    }

    /// Calls a service reachable from `node`.
    ///
    /// Returns `DispatchError::ServiceNotFound` if no enabled handler answered.
    pub fn call(&mut self, node: NodeId, params: CallService) -> ArborResult<Option<Value>> {
        validate_service_name(&params.name)?;
        let published = self.publish(
            node,
            Publish::new(service_event_name(&params.name))
                .args(params.args)
                .capturing(params.capturing)
                .spreading(params.spreading)
                .bubbling(params.bubbling)
                .first_only(true)
                .asynchronous(false),
        )?;

        let event = published
            .into_event()
            .ok_or_else(|| ArborError::internal("service publish returned no event"))?;
        if !event.dispatched() {
            return Err(DispatchError::ServiceNotFound { name: params.name }.into());
        }
        Ok(event.result().cloned())
    }
}
