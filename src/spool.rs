//! Named reverse-operation lists.
//!
//! `subscribe` and `register` may record their reverse operation under a
//! spool name on the subscribing node. [`Tree::unspool`] replays a spool in
//! LIFO order, which tears down everything a component set up under it.

use std::collections::HashMap;

use crate::error::ArborResult;
use crate::eventing::SubscriptionId;
use crate::tree::{NodeId, Tree};

/// A recorded reverse operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpooledOp {
    /// Undo a `subscribe`.
    Unsubscribe(SubscriptionId),
    /// Undo a `register`.
    Unregister(SubscriptionId),
}

#[derive(Debug, Default)]
pub(crate) struct SpoolRegistry {
    spools: HashMap<String, Vec<SpooledOp>>,
}

impl SpoolRegistry {
    pub(crate) fn push(&mut self, name: impl Into<String>, op: SpooledOp) {
        self.spools.entry(name.into()).or_default().push(op);
    }

    pub(crate) fn take(&mut self, name: &str) -> Vec<SpooledOp> {
        self.spools.remove(name).unwrap_or_default()
    }

    pub(crate) fn len(&self, name: &str) -> usize {
        self.spools.get(name).map_or(0, Vec::len)
    }
}

impl Tree {
    /// Runs every reverse operation spooled on `node` under `name`, newest first.
    ///
    /// Operations whose subscription is already gone are skipped. Returns the
    /// number of operations actually performed.
    pub fn unspool(&mut self, node: NodeId, name: &str) -> ArborResult<usize> {
        let ops = self.node_mut(node)?.spools.take(name);
        let mut performed = 0;
        for op in ops.into_iter().rev() {
            match op {
                SpooledOp::Unsubscribe(id) if self.subscription(node, id) => {
                    self.unsubscribe(node, id)?;
                }
                SpooledOp::Unregister(id) if self.subscription(node, id) => {
                    self.unregister(node, id)?;
                }
                _ => continue,
            }
            performed += 1;
        }
        Ok(performed)
    }

    /// Number of operations spooled on `node` under `name`.
    pub fn spooled(&self, node: NodeId, name: &str) -> ArborResult<usize> {
        Ok(self.node(node)?.spools.len(name))
    }
}
