//! Execution trigger.
//!
//! [`Runner::run`] materializes a node by walking its ancestors depth-first,
//! parents before children:
//!
//! 1. A retained result (Cache or Execute node) is reused as-is.
//! 2. Chains of unretained stateless nodes (map, filter, flat map) are fused
//!    into one pass per partition; Collapse and Cache nodes stop the fusion.
//! 3. Index-partitioning nodes and zips run their typed executor over the
//!    materialized inputs.
//! 4. A Cache node keeps its result once computed.
//!
//! User functions run inside a panic guard: a panic or an error raised while a
//! node is computed discards that node's partial output and surfaces as
//! [`DiaError::UserFunction`].

use crate::context::Context;
use crate::error::{DiaError, dia_error};
use crate::node::{DiaNode, DynOp, NodeKind, NodeOp};
use crate::type_token::{Partition, Shards};
use anyhow::{Result, anyhow};
use rayon::prelude::*;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, trace};

pub(crate) struct Runner<'a> {
    ctx: &'a Context,
}

impl<'a> Runner<'a> {
    pub(crate) fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// Materialize `node` as an explicit trigger.
    pub(crate) fn run(&self, node: &Arc<DiaNode>) -> Result<Shards> {
        let _guard = self.ctx.begin_trigger()?;
        self.ctx.metrics().record_trigger();
        debug!(node = %node.label(), "trigger");
        self.materialize(node)
    }

    fn materialize(&self, node: &Arc<DiaNode>) -> Result<Shards> {
        if let Some(shards) = node.retained()? {
            trace!(node = %node.label(), "reusing retained result");
            self.ctx.metrics().record_cache_hit();
            return Ok(shards);
        }

        let shards = match &node.op {
            NodeOp::Source(shards) => Arc::clone(shards),
            NodeOp::Retained => {
                return Err(anyhow!(DiaError::usage(format!(
                    "{} lost its retained result",
                    node.label()
                ))));
            }
            NodeOp::Generate { size, exec } => {
                let (size, exec) = (*size, Arc::clone(exec));
                let ctx = self.ctx;
                self.guarded(node, || {
                    ctx.pool().install(|| {
                        (0..ctx.workers())
                            .into_par_iter()
                            .map(|w| exec(ctx.index_range(size, w).as_range()))
                            .collect::<Result<Vec<Partition>>>()
                    })
                })
                .map(Arc::new)?
            }
            NodeOp::Stateless(_) => self.run_fused(node)?,
            NodeOp::Fence => self.materialize(node.parent(0)?)?,
            NodeOp::Index { exec, .. } => {
                let input = self.materialize(node.parent(0)?)?;
                self.guarded(node, || exec(&input, self.ctx))?
            }
            NodeOp::Zip(exec) => {
                let left = self.materialize(node.parent(0)?)?;
                let right = self.materialize(node.parent(1)?)?;
                self.guarded(node, || exec(&left, &right, self.ctx))?
            }
        };

        self.ctx.metrics().record_materialized();
        if node.kind == NodeKind::Cache {
            let reservation = self.ctx.reserve_shards(&shards, node.footprint(&shards))?;
            node.retain(Arc::clone(&shards), reservation)?;
            debug!(
                node = %node.label(),
                records = node.count(&shards),
                memory = self.ctx.memory().total(),
                "cached"
            );
        }
        Ok(shards)
    }

    /// Run `node` together with every unretained stateless ancestor directly
    /// above it as one pass per partition.
    fn run_fused(&self, node: &Arc<DiaNode>) -> Result<Shards> {
        let mut ops: Vec<Arc<dyn DynOp>> = Vec::new();
        let mut cur = node;
        loop {
            let NodeOp::Stateless(op) = &cur.op else {
                break;
            };
            if cur.is_retained() {
                break;
            }
            ops.push(Arc::clone(op));
            cur = cur.parent(0)?;
        }
        ops.reverse();

        let input = self.materialize(cur)?;
        trace!(node = %node.label(), fused = ops.len(), "running fused stage");
        self.guarded(node, || {
            self.ctx.pool().install(|| {
                input
                    .par_iter()
                    .map(|part| apply_chain(&ops, part.as_ref()))
                    .collect::<Result<Vec<Partition>>>()
            })
        })
        .map(Arc::new)
    }

    /// Run a stage of user code, turning errors and panics into
    /// [`DiaError::UserFunction`] unless they already carry a `DiaError`.
    fn guarded<R>(&self, node: &DiaNode, f: impl FnOnce() -> Result<R>) -> Result<R> {
        debug!(node = %node.label(), "materializing");
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(r)) => Ok(r),
            Ok(Err(e)) if dia_error(&e).is_some() => Err(e),
            Ok(Err(e)) => Err(anyhow!(DiaError::UserFunction {
                node: node.label(),
                message: format!("{e:#}"),
            })),
            Err(panic) => Err(anyhow!(DiaError::UserFunction {
                node: node.label(),
                message: panic_message(panic.as_ref()),
            })),
        }
    }
}

fn apply_chain(ops: &[Arc<dyn DynOp>], input: &dyn Any) -> Result<Partition> {
    let Some((first, rest)) = ops.split_first() else {
        return Err(anyhow!(DiaError::usage("empty fused stage")));
    };
    let mut acc = first.apply(input)?;
    for op in rest {
        acc = op.apply(acc.as_ref())?;
    }
    Ok(acc)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
