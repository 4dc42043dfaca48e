//! Four-phase event dispatch.
//!
//! A publish on target `T` walks the tree in this order:
//!
//! 1. capturing: root down to `T`'s parent, subscriptions flagged `capturing`
//! 2. targeting: `T` itself, every matching subscription
//! 3. spreading: `T`'s descendants in pre-order, subscriptions flagged `spreading`
//! 4. bubbling: `T`'s parent up to the root, subscriptions flagged `bubbling`
//!
//! Matching subscriptions are snapshotted per node before any of them runs, so
//! handlers may subscribe or unsubscribe freely. A snapshot entry that was
//! removed by an earlier handler is skipped.

use crate::error::ArborResult;
use crate::scheduler::Task;
use crate::tree::{Hierarchy, NodeId, Tree};
use crate::value::Value;

use super::event::{Event, Phase};
use super::publish::{Publish, Published};
use super::table::{Handler, Invocation, Subscription};

impl Tree {
    /// Publishes an event against `node`.
    ///
    /// Synchronous publishes run the whole traversal before returning.
    /// Asynchronous publishes enqueue it for the next [`Tree::tick`] and return
    /// a snapshot of the event taken before dispatch; use `completed` to
    /// observe the outcome.
    pub fn publish(&mut self, node: NodeId, params: Publish) -> ArborResult<Published> {
        params.validate()?;

        // Purely local events with no listeners skip the traversal entirely.
        let mut short_circuit = false;
        if params.is_local() && self.node(node)?.table.is_empty() {
            if params.no_result {
                return Ok(Published::Nothing);
            }
            if params.direct_result {
                return Ok(Published::Result(params.result_init.clone()));
            }
            short_circuit = true;
        }

        let event = Event::builder(params.name.clone(), node)
            .spec(params.spec.clone())
            .asynchronous(params.is_async)
            .result(params.result_init.clone())
            .build()?;

        if short_circuit {
            return Ok(Published::Event(event));
        }

        if self.tracing_enabled(params.silent) {
            tracing::debug!(
                node = %self.path_string(node),
                name = %event.name(),
                event_id = %event.id(),
                asynchronous = event.is_async(),
                capturing = params.capturing,
                spreading = params.spreading,
                bubbling = params.bubbling,
                direct_result = params.direct_result,
                no_result = params.no_result,
                first_only = params.first_only,
                "publish"
            );
        }

        if event.is_async() {
            let snapshot = event.clone();
            self.scheduler.enqueue(Task::Traversal {
                event,
                params: params.clone(),
            })?;
            return Ok(params.select(snapshot));
        }

        let event = dispatch_all(self, event, &params)?;
        Ok(params.select(event))
    }
}

/// Runs all four phases for `event` and then the `completed` continuation.
pub(crate) fn dispatch_all(tree: &mut Tree, mut event: Event, params: &Publish) -> ArborResult<Event> {
    let target = event.target();
    let path = if params.capturing || params.bubbling {
        tree.path(target)?
    } else {
        Vec::new()
    };
    let ancestors = &path[..path.len().saturating_sub(1)];

    if params.capturing {
        for &node in ancestors {
            dispatch_single(tree, &mut event, target, node, params, Phase::Capturing)?;
            if !event.propagation() {
                break;
            }
        }
    }

    if event.propagation() {
        dispatch_single(tree, &mut event, target, target, params, Phase::Targeting)?;
    }

    if params.spreading && event.propagation() {
        spread(tree, &mut event, target, params)?;
    }

    if params.bubbling && event.propagation() {
        for &node in ancestors.iter().rev() {
            dispatch_single(tree, &mut event, target, node, params, Phase::Bubbling)?;
            if !event.propagation() {
                break;
            }
        }
    }

    if let Some(completed) = params.completed.clone() {
        completed(tree, &event)?;
    }

    Ok(event)
}

/// Pre-order walk over the target's descendants.
///
/// A propagation stop only prunes the subtree below the node where it
/// happened; siblings are still visited. Under `first_only` a dispatch ends
/// the walk altogether.
fn spread(tree: &mut Tree, event: &mut Event, target: NodeId, params: &Publish) -> ArborResult<()> {
    let mut stack: Vec<NodeId> = tree.children(target)?;
    stack.reverse();

    while let Some(node) = stack.pop() {
        dispatch_single(tree, event, target, node, params, Phase::Spreading)?;
        if !event.propagation() {
            if params.first_only && event.dispatched() {
                return Ok(());
            }
            event.set_propagation(true);
            continue;
        }
        stack.extend(tree.children(node)?.into_iter().rev());
    }
    Ok(())
}

/// Invokes every subscription on `node` that matches `event` in `phase`.
fn dispatch_single(
    tree: &mut Tree,
    event: &mut Event,
    origin: NodeId,
    node: NodeId,
    params: &Publish,
    phase: Phase,
) -> ArborResult<()> {
    let matched = tree.node(node)?.table.matching_in_phase(event, phase);
    if matched.is_empty() {
        return Ok(());
    }

    for subscription in matched {
        if !tree.subscription(node, subscription.id) {
            continue;
        }

        if tree.tracing_enabled(params.silent) {
            tracing::trace!(
                node = %tree.path_string(node),
                phase = %phase,
                name = %event.name(),
                subscription = %subscription.id,
                "dispatch"
            );
        }

        event.set_state(phase);
        event.set_decline(false);

        let mut args = Vec::with_capacity(subscription.args.len() + params.args.len());
        args.extend(subscription.args.iter().cloned());
        args.extend(params.args.iter().cloned());

        let returned = invoke(tree, event, &subscription, origin, args)?;
        if subscription.noevent {
            if let Some(value) = returned {
                let acc = event.take_result();
                event.set_result(Some((params.result_step)(acc, value)));
            }
        }

        if !event.declined() {
            event.mark_dispatched();
            if params.first_only {
                event.set_propagation(false);
                break;
            }
        }
    }
    Ok(())
}

fn invoke(
    tree: &mut Tree,
    event: &mut Event,
    subscription: &Subscription,
    origin: NodeId,
    args: Vec<Value>,
) -> ArborResult<Option<Value>> {
    let origin = subscription.origin.then_some(origin);

    match &subscription.func {
        Handler::Func(func) => {
            let event = if subscription.noevent { None } else { Some(event) };
            let mut invocation = Invocation::new(tree, subscription.ctx, origin, event, args);
            func(&mut invocation)
        }
        // Commands always see the event so a disabled one can decline it.
        Handler::Command(command) => {
            command.dispatch(tree, event, subscription.noevent, origin, args)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::eventing::Subscribe;

    type Log = Rc<RefCell<Vec<String>>>;

    fn record(log: &Log, label: &str) -> impl Fn(&mut Invocation<'_>) -> ArborResult<Option<Value>> {
        let log = Rc::clone(log);
        let label = label.to_string();
        move |inv: &mut Invocation<'_>| -> ArborResult<Option<Value>> {
            let phase = inv.event().map(|ev| ev.state().to_string()).unwrap_or_default();
            log.borrow_mut().push(format!("{label}:{phase}"));
            Ok(None)
        }
    }

    #[test]
    fn fast_path_returns_result_init() {
        let mut tree = Tree::new("root");
        let root = tree.root();
        let out = tree
            .publish(root, Publish::new("x").local().result_init(7).direct_result(true))
            .unwrap();
        assert_eq!(out, Published::Result(Some(Value::Int(7))));

        let out = tree.publish(root, Publish::new("x").local().no_result(true)).unwrap();
        assert!(out.is_nothing());

        let ev = tree.publish(root, Publish::new("x").local()).unwrap().into_event().unwrap();
        assert!(!ev.dispatched());
    }

    #[test]
    fn fast_path_skips_completed() {
        let mut tree = Tree::new("root");
        let root = tree.root();
        let ran = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&ran);
        tree.publish(
            root,
            Publish::new("x").local().completed(move |_, _| {
                *flag.borrow_mut() = true;
                Ok(())
            }),
        )
        .unwrap();
        assert!(!*ran.borrow());
    }

    #[test]
    fn targeting_ignores_phase_flags() {
        let mut tree = Tree::new("root");
        let root = tree.root();
        let log: Log = Rc::default();
        tree.subscribe(root, Subscribe::new("x", record(&log, "t")).bubbling(false))
            .unwrap();
        let ev = tree.publish(root, Publish::new("x")).unwrap().into_event().unwrap();
        assert!(ev.dispatched());
        assert_eq!(*log.borrow(), vec!["t:targeting"]);
    }

    #[test]
    fn decline_keeps_dispatched_false() {
        let mut tree = Tree::new("root");
        let root = tree.root();
        tree.subscribe(
            root,
            Subscribe::new("x", |inv| {
                if let Some(ev) = inv.event() {
                    ev.decline();
                }
                Ok(None)
            }),
        )
        .unwrap();
        let ev = tree.publish(root, Publish::new("x")).unwrap().into_event().unwrap();
        assert!(!ev.dispatched());
    }

    #[test]
    fn handler_error_aborts_traversal() {
        let mut tree = Tree::new("root");
        let root = tree.root();
        let child = tree.add_child(root, "child").unwrap();
        let log: Log = Rc::default();
        tree.subscribe(child, Subscribe::new("x", |_| Err(crate::ArborError::handler("boom"))))
            .unwrap();
        tree.subscribe(root, Subscribe::new("x", record(&log, "root"))).unwrap();

        let err = tree.publish(child, Publish::new("x")).unwrap_err();
        assert!(err.is_handler());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn origin_and_args_reach_handler() {
        let mut tree = Tree::new("root");
        let root = tree.root();
        let child = tree.add_child(root, "child").unwrap();
        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        tree.subscribe(
            root,
            Subscribe::new("x", move |inv| {
                *sink.borrow_mut() = Some((inv.origin(), inv.ctx(), inv.args().to_vec()));
                Ok(None)
            })
            .origin(true)
            .arg("bound"),
        )
        .unwrap();

        tree.publish(child, Publish::new("x").arg(1)).unwrap();
        let (origin, ctx, args) = seen.borrow().clone().unwrap();
        assert_eq!(origin, Some(child));
        assert_eq!(ctx, root);
        assert_eq!(args, vec![Value::from("bound"), Value::Int(1)]);
    }

    #[test]
    fn noevent_handler_gets_no_event() {
        let mut tree = Tree::new("root");
        let root = tree.root();
        let saw_event = Rc::new(RefCell::new(true));
        let sink = Rc::clone(&saw_event);
        tree.subscribe(
            root,
            Subscribe::new("x", move |inv| {
                *sink.borrow_mut() = inv.event().is_some();
                Ok(Some(Value::Int(1)))
            })
            .noevent(true),
        )
        .unwrap();
        let result = tree
            .publish(root, Publish::new("x").direct_result(true))
            .unwrap()
            .into_result();
        assert!(!*saw_event.borrow());
        assert_eq!(result, Some(Value::Int(1)));
    }

    #[test]
    fn event_handler_return_value_is_not_folded() {
        let mut tree = Tree::new("root");
        let root = tree.root();
        tree.subscribe(root, Subscribe::new("x", |_| Ok(Some(Value::Int(5))))).unwrap();
        let result = tree
            .publish(root, Publish::new("x").result_init(1).direct_result(true))
            .unwrap()
            .into_result();
        assert_eq!(result, Some(Value::Int(1)));
    }

    #[test]
    fn unsubscribing_sibling_mid_phase_skips_it() {
        let mut tree = Tree::new("root");
        let root = tree.root();
        let log: Log = Rc::default();
        let victim = Rc::new(RefCell::new(None));

        let target = Rc::clone(&victim);
        tree.subscribe(
            root,
            Subscribe::new("x", move |inv| {
                if let Some(id) = *target.borrow() {
                    let ctx = inv.ctx();
                    inv.tree().unsubscribe(ctx, id)?;
                }
                Ok(None)
            }),
        )
        .unwrap();
        let id = tree.subscribe(root, Subscribe::new("x", record(&log, "victim"))).unwrap();
        *victim.borrow_mut() = Some(id);

        tree.publish(root, Publish::new("x")).unwrap();
        assert!(log.borrow().is_empty());
        assert!(!tree.subscription(root, id));
    }

    #[test]
    fn handler_may_publish_reentrantly() {
        let mut tree = Tree::new("root");
        let root = tree.root();
        let log: Log = Rc::default();
        tree.subscribe(
            root,
            Subscribe::new("outer", |inv| {
                let ctx = inv.ctx();
                inv.tree().publish(ctx, Publish::new("inner"))?;
                Ok(None)
            }),
        )
        .unwrap();
        tree.subscribe(root, Subscribe::new("inner", record(&log, "inner"))).unwrap();

        tree.publish(root, Publish::new("outer")).unwrap();
        assert_eq!(*log.borrow(), vec!["inner:targeting"]);
    }
}
