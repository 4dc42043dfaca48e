//! Deferred-dispatch task queue.
//!
//! Asynchronous publishes and asynchronous service commands do not run inline;
//! they are queued here and executed as whole units by [`Tree::tick`]. A tick
//! only runs the tasks that were queued before it started, so work queued
//! while ticking lands on the next tick. Nothing yields mid-traversal.

use std::fmt;
use std::rc::Rc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::error::{ArborResult, DispatchError};
use crate::eventing::dispatcher::dispatch_all;
use crate::eventing::{Event, Publish};
use crate::service::Command;
use crate::tree::{NodeId, Tree};
use crate::value::Value;

/// A unit of deferred work.
pub(crate) enum Task {
    /// A full four-phase traversal.
    Traversal { event: Event, params: Publish },
    /// A single call of an asynchronous service command.
    Invocation {
        command: Rc<Command>,
        origin: Option<NodeId>,
        args: Vec<Value>,
    },
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Traversal { event, .. } => f
                .debug_struct("Traversal")
                .field("name", &event.name())
                .field("target", &event.target())
                .finish_non_exhaustive(),
            Self::Invocation { command, .. } => f
                .debug_struct("Invocation")
                .field("ctx", &command.ctx())
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Scheduler {
    tx: Sender<Task>,
    rx: Receiver<Task>,
    capacity: usize,
}

impl Scheduler {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded::<Task>(capacity);
        Self { tx, rx, capacity }
    }

    pub(crate) fn enqueue(&self, task: Task) -> ArborResult<()> {
        match self.tx.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(capacity = self.capacity, "task queue saturated, rejecting task");
                Err(DispatchError::SchedulerSaturated {
                    capacity: self.capacity,
                }
                .into())
            }
            Err(TrySendError::Disconnected(_)) => Err(DispatchError::SchedulerDisconnected.into()),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.rx.len()
    }

    fn next(&self) -> Option<Task> {
        self.rx.try_recv().ok()
    }
}

impl Tree {
    /// Runs every task that was queued before this call.
    ///
    /// Returns the number of tasks run. A failing task aborts the tick; tasks
    /// behind it stay queued.
    pub fn tick(&mut self) -> ArborResult<usize> {
        let due = self.scheduler.len();
        if due > 0 && self.config.trace_dispatch {
            tracing::trace!(due, "scheduler tick");
        }

        let mut ran = 0;
        for _ in 0..due {
            let Some(task) = self.scheduler.next() else {
                break;
            };
            self.run_task(task)?;
            ran += 1;
        }
        Ok(ran)
    }

    /// Ticks until the queue is empty or `max_ticks` is reached.
    ///
    /// Returns the total number of tasks run.
    pub fn run_until_idle(&mut self) -> ArborResult<usize> {
        let mut total = 0;
        for _ in 0..self.config.max_ticks.max(1) {
            if self.scheduler.len() == 0 {
                break;
            }
            total += self.tick()?;
        }
        Ok(total)
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }

    fn run_task(&mut self, task: Task) -> ArborResult<()> {
        match task {
            Task::Traversal { event, params } => {
                dispatch_all(self, event, &params)?;
            }
            Task::Invocation {
                command,
                origin,
                args,
            } => {
                command.call(self, None, origin, args)?;
            }
        }
        Ok(())
    }
}
