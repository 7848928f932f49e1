//! Lightweight unique identifier for nodes within a [`Context`](crate::context::Context).
//!
//! Each [`DiaNode`](crate::node::DiaNode) created by an operator call is
//! assigned a sequential `NodeId`. Ids are never reused within a context, so a
//! node created by `execute()` is always distinguishable from the node it
//! replaced.

use std::fmt;

/// Unique numeric identifier for a node in a DIA graph.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn new(v: u64) -> Self {
        Self(v)
    }

    /// Return the underlying numeric value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
