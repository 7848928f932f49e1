use crate::context::Context;
use crate::error::DiaError;
use crate::mem::Reservation;
use crate::node_id::NodeId;
use crate::type_token::{Partition, Shards, TypeTag, VecOps};
use anyhow::{Result, anyhow};
use std::any::Any;
use std::fmt;
use std::ops::Range;
use std::sync::{Arc, Mutex};

/// A worker-local transform applied to one partition.
pub trait DynOp: Send + Sync {
    fn apply(&self, input: &dyn Any) -> Result<Partition>;
}

pub(crate) type GenerateExec = Arc<dyn Fn(Range<usize>) -> Result<Partition> + Send + Sync>;
pub(crate) type IndexExec = Arc<dyn Fn(&Shards, &Context) -> Result<Shards> + Send + Sync>;
pub(crate) type ZipExec = Arc<dyn Fn(&Shards, &Shards, &Context) -> Result<Shards> + Send + Sync>;

/// The operator a node was created by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Source,
    Map,
    Filter,
    FlatMap,
    GroupByIndex,
    ReduceToIndex,
    Zip,
    Generate,
    Collapse,
    Cache,
    Execute,
}

impl NodeKind {
    /// Whether the operator redistributes records between workers.
    pub fn is_barrier(self) -> bool {
        matches!(self, Self::GroupByIndex | Self::ReduceToIndex)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub(crate) enum NodeOp {
    /// Data distributed at creation time.
    Source(Shards),
    Generate {
        size: usize,
        exec: GenerateExec,
    },
    /// Map, Filter and FlatMap. Adjacent unretained stateless nodes are fused
    /// into one pass per partition.
    Stateless(Arc<dyn DynOp>),
    /// Collapse and Cache: identity over the single parent, stops fusion.
    Fence,
    /// ReduceToIndex and GroupByIndex over the single parent.
    Index {
        size: usize,
        exec: IndexExec,
    },
    Zip(ZipExec),
    /// Execute: the data lives in the retained slot only.
    Retained,
}

// The reservation is declared first so it is released before the shards
// allocation it is keyed by can be freed.
pub(crate) struct Retained {
    _reservation: Arc<Reservation>,
    pub(crate) shards: Shards,
}

/// A lazy operator node.
///
/// Parents are held by `Arc`, so a node lives as long as the longest-living
/// handle or child that refers to it.
pub struct DiaNode {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) elem: TypeTag,
    pub(crate) vec_ops: Arc<dyn VecOps>,
    pub(crate) parents: Vec<Arc<DiaNode>>,
    pub(crate) op: NodeOp,
    retained: Mutex<Option<Retained>>,
}

impl DiaNode {
    pub(crate) fn new(
        id: NodeId,
        kind: NodeKind,
        elem: TypeTag,
        vec_ops: Arc<dyn VecOps>,
        parents: Vec<Arc<DiaNode>>,
        op: NodeOp,
    ) -> Self {
        Self {
            id,
            kind,
            elem,
            vec_ops,
            parents,
            op,
            retained: Mutex::new(None),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Declared index-space size for Generate, ReduceToIndex and GroupByIndex.
    pub fn declared_size(&self) -> Option<usize> {
        match &self.op {
            NodeOp::Generate { size, .. } | NodeOp::Index { size, .. } => Some(*size),
            _ => None,
        }
    }

    pub(crate) fn label(&self) -> String {
        format!("{}{}", self.kind, self.id)
    }

    pub(crate) fn parent(&self, i: usize) -> Result<&Arc<DiaNode>> {
        self.parents.get(i).ok_or_else(|| {
            anyhow!(DiaError::usage(format!("{} is missing parent {i}", self.label())))
        })
    }

    /// The retained result, if this node holds one.
    pub(crate) fn retained(&self) -> Result<Option<Shards>> {
        let slot = self
            .retained
            .lock()
            .map_err(|_| anyhow!(DiaError::usage(format!("{} state poisoned", self.label()))))?;
        Ok(slot.as_ref().map(|r| Arc::clone(&r.shards)))
    }

    pub fn is_retained(&self) -> bool {
        self.retained.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Keep `shards` for later consumers, accounting their footprint.
    pub(crate) fn retain(&self, shards: Shards, reservation: Arc<Reservation>) -> Result<()> {
        let mut slot = self
            .retained
            .lock()
            .map_err(|_| anyhow!(DiaError::usage(format!("{} state poisoned", self.label()))))?;
        *slot = Some(Retained {
            _reservation: reservation,
            shards,
        });
        Ok(())
    }

    /// Total record count of a materialized result of this node.
    pub(crate) fn count(&self, shards: &Shards) -> usize {
        shards
            .iter()
            .filter_map(|p| self.vec_ops.len(p.as_ref()))
            .sum()
    }

    /// Shallow byte footprint of a materialized result of this node.
    pub(crate) fn footprint(&self, shards: &Shards) -> usize {
        shards
            .iter()
            .filter_map(|p| self.vec_ops.footprint(p.as_ref()))
            .sum()
    }
}

impl fmt::Debug for DiaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiaNode")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("elem", &self.elem.name)
            .field("parents", &self.parents.iter().map(|p| p.id).collect::<Vec<_>>())
            .field("retained", &self.is_retained())
            .finish()
    }
}
