//! Position-wise combination of two DIAs.
//!
//! The right operand is re-aligned to the left operand's partition boundaries
//! by global position: the record at global position `i` of the right operand
//! is paired with the record at global position `i` of the left one, wherever
//! either of them lives.

use crate::context::Context;
use crate::dia::{Data, Dia};
use crate::error::DiaError;
use crate::node::{NodeKind, NodeOp, ZipExec};
use crate::type_token::{Partition, Shards, downcast_part};
use anyhow::Result;
use rayon::prelude::*;
use std::sync::Arc;

impl<A: Data> Dia<A> {
    /// Combine records at equal global positions with `f`.
    ///
    /// The output has the left operand's partitioning.
    ///
    /// ### Errors
    /// The trigger that materializes the zip fails with [`DiaError::Usage`] if
    /// the operands have different global lengths or belong to different
    /// contexts.
    ///
    /// ### Example
    /// ```
    /// use irondia::*;
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let ctx = Context::new(ContextConfig::default().with_workers(2))?;
    /// let names = from_vec(&ctx, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    /// let ids = generate(&ctx, 3, |i| i);
    /// let labels = ids.zip(&names, |i: &usize, s: &String| format!("{i}={s}"));
    /// assert_eq!(labels.all_gather()?, vec!["0=a", "1=b", "2=c"]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn zip<B, O, F>(&self, other: &Dia<B>, f: F) -> Dia<O>
    where
        B: Data,
        O: Data,
        F: 'static + Send + Sync + Fn(&A, &B) -> O,
    {
        let same_context = self.ctx.same_as(&other.ctx);
        let exec: ZipExec = Arc::new(move |left: &Shards, right: &Shards, ctx: &Context| -> Result<Shards> {
            if !same_context {
                return Err(DiaError::usage("zip operands belong to different contexts").into());
            }
            zip_shards::<A, B, O, F>(left, right, ctx, &f)
        });
        self.derive(
            NodeKind::Zip,
            NodeOp::Zip(exec),
            vec![Arc::clone(&self.node), Arc::clone(&other.node)],
        )
    }
}

fn zip_shards<A, B, O, F>(left: &Shards, right: &Shards, ctx: &Context, f: &F) -> Result<Shards>
where
    A: Data,
    B: Data,
    O: Data,
    F: Send + Sync + Fn(&A, &B) -> O,
{
    let left = left
        .iter()
        .map(|p| downcast_part::<A>(p.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    let right: Vec<&B> = right
        .iter()
        .map(|p| downcast_part::<B>(p.as_ref()))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect();

    let left_len: usize = left.iter().map(|p| p.len()).sum();
    if left_len != right.len() {
        return Err(DiaError::usage(format!(
            "zip operands differ in length: {left_len} vs {}",
            right.len()
        ))
        .into());
    }

    let mut offsets = Vec::with_capacity(left.len());
    let mut at = 0;
    for part in &left {
        offsets.push(at);
        at += part.len();
    }

    let parts = ctx.pool().install(|| {
        left.par_iter()
            .zip(offsets.par_iter())
            .map(|(part, &offset)| {
                let aligned = &right[offset..offset + part.len()];
                let out: Vec<O> = part
                    .iter()
                    .zip(aligned.iter())
                    .map(|(a, b)| f(a, b))
                    .collect();
                Box::new(out) as Partition
            })
            .collect::<Vec<Partition>>()
    });
    Ok(Arc::new(parts))
}
