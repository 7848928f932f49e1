//! Index-space sources.

use crate::context::Context;
use crate::dia::{Data, Dia};
use crate::node::{GenerateExec, NodeKind, NodeOp};
use crate::type_token::Partition;
use anyhow::Result;
use std::ops::Range;
use std::sync::Arc;

/// A DIA of `size` records where record `i` is `f(i)`.
///
/// Nothing is computed until a trigger reaches the node; each worker then
/// evaluates `f` over its own index range.
///
/// ```
/// use irondia::*;
///
/// # fn main() -> anyhow::Result<()> {
/// let ctx = Context::new(ContextConfig::default().with_workers(2))?;
/// let squares = generate(&ctx, 4, |i| (i * i) as u64);
/// assert_eq!(squares.all_gather()?, vec![0, 1, 4, 9]);
/// # Ok(())
/// # }
/// ```
pub fn generate<T, F>(ctx: &Context, size: usize, f: F) -> Dia<T>
where
    T: Data,
    F: 'static + Send + Sync + Fn(usize) -> T,
{
    let exec: GenerateExec = Arc::new(move |range: Range<usize>| -> Result<Partition> {
        Ok(Box::new(range.map(&f).collect::<Vec<T>>()))
    });
    let node = ctx.insert_node::<T>(NodeKind::Generate, Vec::new(), NodeOp::Generate { size, exec });
    Dia::from_node(ctx.clone(), node)
}
