//! Publish options and return-value selection.

use std::fmt;
use std::rc::Rc;

use crate::error::{ArborResult, ValidationError};
use crate::tree::Tree;
use crate::value::Value;

use super::event::Event;
use super::filter::Spec;

/// Folds a handler's return value into the accumulated result.
pub type ResultStep = dyn Fn(Option<Value>, Value) -> Value;

/// Continuation run once traversal has finished.
pub type Completed = dyn Fn(&mut Tree, &Event) -> ArborResult<()>;

/// Options for [`Tree::publish`].
///
/// Defaults: all phases enabled, synchronous, result step keeps the latest
/// value, and the event itself is returned.
///
/// # Example
/// ```rust,ignore
/// let total = tree
///     .publish(
///         node,
///         Publish::new("count")
///             .result_init(Value::Int(0))
///             .result_step(|acc, v| Value::Int(acc.and_then(|a| a.as_int()).unwrap_or(0) + v.as_int().unwrap_or(0)))
///             .direct_result(true),
///     )?
///     .into_result();
/// ```
#[derive(Clone)]
pub struct Publish {
    pub(crate) name: String,
    pub(crate) spec: Spec,
    pub(crate) is_async: bool,
    pub(crate) capturing: bool,
    pub(crate) spreading: bool,
    pub(crate) bubbling: bool,
    pub(crate) completed: Option<Rc<Completed>>,
    pub(crate) result_init: Option<Value>,
    pub(crate) result_step: Rc<ResultStep>,
    pub(crate) direct_result: bool,
    pub(crate) no_result: bool,
    pub(crate) first_only: bool,
    pub(crate) silent: bool,
    pub(crate) args: Vec<Value>,
}

impl Publish {
    /// Publishes `name` with default options.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spec: Spec::new(),
            is_async: false,
            capturing: true,
            spreading: true,
            bubbling: true,
            completed: None,
            result_init: None,
            result_step: Rc::new(|_: Option<Value>, latest: Value| latest),
            direct_result: false,
            no_result: false,
            first_only: false,
            silent: false,
            args: Vec::new(),
        }
    }

    /// Sets the event spec.
    #[must_use]
    pub fn spec(mut self, spec: Spec) -> Self {
        self.spec = spec;
        self
    }

    /// Defer the traversal to the next scheduler tick.
    #[must_use]
    pub fn asynchronous(mut self, is_async: bool) -> Self {
        self.is_async = is_async;
        self
    }

    /// Enables or disables the capturing phase.
    #[must_use]
    pub fn capturing(mut self, capturing: bool) -> Self {
        self.capturing = capturing;
        self
    }

    /// Enables or disables the spreading phase.
    #[must_use]
    pub fn spreading(mut self, spreading: bool) -> Self {
        self.spreading = spreading;
        self
    }

    /// Enables or disables the bubbling phase.
    #[must_use]
    pub fn bubbling(mut self, bubbling: bool) -> Self {
        self.bubbling = bubbling;
        self
    }

    /// Disables capturing, spreading and bubbling; only the target is visited.
    #[must_use]
    pub fn local(self) -> Self {
        self.capturing(false).spreading(false).bubbling(false)
    }

    /// Runs `completed` with the final event after traversal.
    #[must_use]
    pub fn completed<F>(mut self, completed: F) -> Self
    where
        F: Fn(&mut Tree, &Event) -> ArborResult<()> + 'static,
    {
        self.completed = Some(Rc::new(completed));
        self
    }

    /// Initial accumulated result.
    #[must_use]
    pub fn result_init(mut self, init: impl Into<Value>) -> Self {
        self.result_init = Some(init.into());
        self
    }

    /// Folds each `noevent` handler value into the result.
    #[must_use]
    pub fn result_step<F>(mut self, step: F) -> Self
    where
        F: Fn(Option<Value>, Value) -> Value + 'static,
    {
        self.result_step = Rc::new(step);
        self
    }

    /// Return the accumulated result instead of the event.
    #[must_use]
    pub fn direct_result(mut self, direct_result: bool) -> Self {
        self.direct_result = direct_result;
        self
    }

    /// Return nothing.
    #[must_use]
    pub fn no_result(mut self, no_result: bool) -> Self {
        self.no_result = no_result;
        self
    }

    /// Stop the whole traversal after the first handler that does not decline.
    #[must_use]
    pub fn first_only(mut self, first_only: bool) -> Self {
        self.first_only = first_only;
        self
    }

    /// Suppress tracing for this publish.
    #[must_use]
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Appends one publish argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends publish arguments.
    #[must_use]
    pub fn args(mut self, args: impl IntoIterator<Item = Value>) -> Self {
        self.args.extend(args);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyEventName);
        }
        Ok(())
    }

    pub(crate) const fn is_local(&self) -> bool {
        !self.capturing && !self.spreading && !self.bubbling
    }

    pub(crate) fn select(&self, event: Event) -> Published {
        if self.no_result {
            Published::Nothing
        } else if self.direct_result {
            Published::Result(event.into_result())
        } else {
            Published::Event(event)
        }
    }
}

impl fmt::Debug for Publish {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publish")
            .field("name", &self.name)
            .field("spec", &self.spec)
            .field("async", &self.is_async)
            .field("capturing", &self.capturing)
            .field("spreading", &self.spreading)
            .field("bubbling", &self.bubbling)
            .field("completed", &self.completed.is_some())
            .field("result_init", &self.result_init)
            .field("direct_result", &self.direct_result)
            .field("no_result", &self.no_result)
            .field("first_only", &self.first_only)
            .field("silent", &self.silent)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// What [`Tree::publish`] hands back, chosen by `no_result`/`direct_result`.
#[derive(Debug, Clone, PartialEq)]
pub enum Published {
    /// The event value (default).
    Event(Event),
    /// The accumulated result (`direct_result`).
    Result(Option<Value>),
    /// Nothing (`no_result`).
    Nothing,
}

impl Published {
    /// The event, when the event was selected.
    #[must_use]
    pub fn event(&self) -> Option<&Event> {
        match self {
            Self::Event(ev) => Some(ev),
            _ => None,
        }
    }

    /// Consumes into the event, when the event was selected.
    #[must_use]
    pub fn into_event(self) -> Option<Event> {
        match self {
            Self::Event(ev) => Some(ev),
            _ => None,
        }
    }

    /// The result carried by `Result`, or the event's result for `Event`.
    #[must_use]
    pub fn into_result(self) -> Option<Value> {
        match self {
            Self::Event(ev) => ev.into_result(),
            Self::Result(result) => result,
            Self::Nothing => None,
        }
    }

    /// Whether `no_result` suppressed the return value.
    #[must_use]
    pub const fn is_nothing(&self) -> bool {
        matches!(self, Self::Nothing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeId;

    #[test]
    fn defaults_follow_option_table() {
        let params = Publish::new("x");
        assert!(params.capturing && params.spreading && params.bubbling);
        assert!(!params.is_async);
        assert!(!params.direct_result && !params.no_result);
        assert!(!params.first_only && !params.silent);
        assert!(params.result_init.is_none());
        assert_eq!((params.result_step)(Some(Value::Int(1)), Value::Int(2)), Value::Int(2));
        assert!(!params.is_local());
        assert!(params.local().is_local());
    }

    #[test]
    fn validate_rejects_empty_name() {
        assert!(Publish::new("").validate().is_err());
        assert!(Publish::new("x").validate().is_ok());
    }

    #[test]
    fn select_follows_flags() {
        let event = Event::builder("x", NodeId::from_raw(0))
            .result(Some(Value::Int(4)))
            .build()
            .unwrap();

        let nothing = Publish::new("x").no_result(true).direct_result(true).select(event.clone());
        assert!(nothing.is_nothing());

        let direct = Publish::new("x").direct_result(true).select(event.clone());
        assert_eq!(direct, Published::Result(Some(Value::Int(4))));

        let whole = Publish::new("x").select(event);
        assert_eq!(whole.event().and_then(Event::result), Some(&Value::Int(4)));
        assert_eq!(whole.into_result(), Some(Value::Int(4)));
    }
}
