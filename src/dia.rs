use crate::context::Context;
use crate::explain::GraphExplanation;
use crate::node::{DiaNode, DynOp, NodeKind, NodeOp};
use crate::node_id::NodeId;
use crate::runner::Runner;
use crate::type_token::{Partition, downcast_part};
use anyhow::Result;
use serde::{Serialize, de::DeserializeOwned};
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

/// Bound for record types flowing through a DIA.
pub trait Data: 'static + Send + Sync + Clone + Serialize + DeserializeOwned {}
impl<T> Data for T where T: 'static + Send + Sync + Clone + Serialize + DeserializeOwned {}

/// Handle to a distributed immutable array of `T`.
///
/// Handles are cheap references to a lazy graph node: cloning one shares the
/// node, not the data. Operators only extend the graph; nothing runs until a
/// materializing call such as [`execute`](Dia::execute) or
/// [`size`](Dia::size).
pub struct Dia<T> {
    pub(crate) ctx: Context,
    pub(crate) node: Arc<DiaNode>,
    _t: PhantomData<fn() -> T>,
}

impl<T> Clone for Dia<T> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            node: Arc::clone(&self.node),
            _t: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Dia<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dia").field("node", &self.node).finish()
    }
}

// ---- Stateless DynOps ----

struct MapOp<I, O, F>(F, PhantomData<fn(I) -> O>);
impl<I, O, F> DynOp for MapOp<I, O, F>
where
    I: Data,
    O: Data,
    F: Send + Sync + Fn(&I) -> O + 'static,
{
    fn apply(&self, input: &dyn Any) -> Result<Partition> {
        let v = downcast_part::<I>(input)?;
        Ok(Box::new(v.iter().map(&self.0).collect::<Vec<O>>()))
    }
}

struct TryMapOp<I, O, F>(F, PhantomData<fn(I) -> O>);
impl<I, O, F> DynOp for TryMapOp<I, O, F>
where
    I: Data,
    O: Data,
    F: Send + Sync + Fn(&I) -> Result<O> + 'static,
{
    fn apply(&self, input: &dyn Any) -> Result<Partition> {
        let v = downcast_part::<I>(input)?;
        Ok(Box::new(v.iter().map(&self.0).collect::<Result<Vec<O>>>()?))
    }
}

struct FilterOp<T, P>(P, PhantomData<fn(T)>);
impl<T, P> DynOp for FilterOp<T, P>
where
    T: Data,
    P: Send + Sync + Fn(&T) -> bool + 'static,
{
    fn apply(&self, input: &dyn Any) -> Result<Partition> {
        let v = downcast_part::<T>(input)?;
        Ok(Box::new(v.iter().filter(|t| self.0(t)).cloned().collect::<Vec<T>>()))
    }
}

struct FlatMapOp<I, O, It, F>(F, PhantomData<fn(I) -> (O, It)>);
impl<I, O, It, F> DynOp for FlatMapOp<I, O, It, F>
where
    I: Data,
    O: Data,
    It: IntoIterator<Item = O>,
    F: Send + Sync + Fn(&I) -> It + 'static,
{
    fn apply(&self, input: &dyn Any) -> Result<Partition> {
        let v = downcast_part::<I>(input)?;
        let mut out: Vec<O> = Vec::new();
        for i in v {
            out.extend(self.0(i));
        }
        Ok(Box::new(out))
    }
}

struct TryFlatMapOp<I, O, It, F>(F, PhantomData<fn(I) -> (O, It)>);
impl<I, O, It, F> DynOp for TryFlatMapOp<I, O, It, F>
where
    I: Data,
    O: Data,
    It: IntoIterator<Item = O>,
    F: Send + Sync + Fn(&I) -> Result<It> + 'static,
{
    fn apply(&self, input: &dyn Any) -> Result<Partition> {
        let v = downcast_part::<I>(input)?;
        let mut out: Vec<O> = Vec::new();
        for i in v {
            out.extend(self.0(i)?);
        }
        Ok(Box::new(out))
    }
}

impl<T: Data> Dia<T> {
    pub(crate) fn from_node(ctx: Context, node: Arc<DiaNode>) -> Self {
        Self {
            ctx,
            node,
            _t: PhantomData,
        }
    }

    /// Add a child node of element type `O` to the graph.
    pub(crate) fn derive<O: Data>(
        &self,
        kind: NodeKind,
        op: NodeOp,
        parents: Vec<Arc<DiaNode>>,
    ) -> Dia<O> {
        let node = self.ctx.insert_node::<O>(kind, parents, op);
        Dia::from_node(self.ctx.clone(), node)
    }

    fn stateless<O: Data>(&self, kind: NodeKind, op: Arc<dyn DynOp>) -> Dia<O> {
        self.derive(kind, NodeOp::Stateless(op), vec![Arc::clone(&self.node)])
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn node_id(&self) -> NodeId {
        self.node.id
    }

    pub fn kind(&self) -> NodeKind {
        self.node.kind
    }

    /// Whether this node currently holds its result.
    pub fn is_materialized(&self) -> bool {
        self.node.is_retained()
    }

    pub fn map<O, F>(&self, f: F) -> Dia<O>
    where
        O: Data,
        F: 'static + Send + Sync + Fn(&T) -> O,
    {
        self.stateless(NodeKind::Map, Arc::new(MapOp::<T, O, F>(f, PhantomData)))
    }

    /// Fallible map; the first `Err` aborts the materialization that runs it.
    pub fn try_map<O, F>(&self, f: F) -> Dia<O>
    where
        O: Data,
        F: 'static + Send + Sync + Fn(&T) -> Result<O>,
    {
        self.stateless(NodeKind::Map, Arc::new(TryMapOp::<T, O, F>(f, PhantomData)))
    }

    pub fn filter<P>(&self, pred: P) -> Dia<T>
    where
        P: 'static + Send + Sync + Fn(&T) -> bool,
    {
        self.stateless(NodeKind::Filter, Arc::new(FilterOp::<T, P>(pred, PhantomData)))
    }

    pub fn flat_map<O, I, F>(&self, f: F) -> Dia<O>
    where
        O: Data,
        I: IntoIterator<Item = O> + 'static,
        F: 'static + Send + Sync + Fn(&T) -> I,
    {
        self.stateless(NodeKind::FlatMap, Arc::new(FlatMapOp::<T, O, I, F>(f, PhantomData)))
    }

    /// Fallible flat map; the first `Err` aborts the materialization that runs it.
    pub fn try_flat_map<O, I, F>(&self, f: F) -> Dia<O>
    where
        O: Data,
        I: IntoIterator<Item = O> + 'static,
        F: 'static + Send + Sync + Fn(&T) -> Result<I>,
    {
        self.stateless(
            NodeKind::FlatMap,
            Arc::new(TryFlatMapOp::<T, O, I, F>(f, PhantomData)),
        )
    }

    /// Fusion fence: pending local transforms above this node run as one
    /// pass and stop there, without any redistribution.
    pub fn collapse(&self) -> Dia<T> {
        self.derive(NodeKind::Collapse, NodeOp::Fence, vec![Arc::clone(&self.node)])
    }

    /// Retain this node's result the first time it is computed, so later
    /// consumers reuse it instead of recomputing the subgraph.
    pub fn cache(&self) -> Dia<T> {
        self.derive(NodeKind::Cache, NodeOp::Fence, vec![Arc::clone(&self.node)])
    }

    /// Materialize this node and its unmaterialized ancestors.
    ///
    /// Returns a handle to a node holding the realized result with no parents,
    /// so the subgraph that produced it can be freed once other handles to it
    /// are dropped. Calling this on a `Cache` or `Execute` handle retains the
    /// result in place and returns the same node.
    ///
    /// # Errors
    ///
    /// Any failure raised while materializing; see [`DiaError`](crate::DiaError).
    pub fn execute(&self) -> Result<Dia<T>> {
        let shards = Runner::new(&self.ctx).run(&self.node)?;
        if matches!(self.node.kind, NodeKind::Cache | NodeKind::Execute) {
            return Ok(self.clone());
        }
        let reservation = self
            .ctx
            .reserve_shards(&shards, self.node.footprint(&shards))?;
        let node = self
            .ctx
            .insert_node::<T>(NodeKind::Execute, Vec::new(), NodeOp::Retained);
        node.retain(shards, reservation)?;
        Ok(Dia::from_node(self.ctx.clone(), node))
    }

    /// Describe the subgraph this handle depends on.
    pub fn explain(&self) -> GraphExplanation {
        GraphExplanation::of(&self.node)
    }
}
