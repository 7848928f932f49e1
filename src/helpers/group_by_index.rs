//! Grouping into a global index space.
//!
//! Every record is shipped to the worker owning its index. The owner sorts
//! what it received by index (stably, so records of one index keep their
//! arrival order) and calls the group function once per index of its range,
//! including indices no record mapped to.

use crate::context::Context;
use crate::dia::{Data, Dia};
use crate::error::DiaError;
use crate::helpers::reduce_to_index::check_index;
use crate::index::IndexRange;
use crate::mem::MemVec;
use crate::node::{IndexExec, NodeKind, NodeOp};
use crate::shuffle::exchange;
use crate::type_token::{Partition, Shards, downcast_part};
use anyhow::Result;
use rayon::prelude::*;
use std::iter::Peekable;
use std::sync::Arc;
use std::vec;

/// Forward-only iterator over the records of one index.
///
/// Records left unconsumed when the group function returns are skipped.
pub struct GroupIter<'a, T> {
    index: usize,
    records: &'a mut Peekable<vec::IntoIter<(usize, T)>>,
}

impl<T> GroupIter<'_, T> {
    /// The index this group belongs to.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<T> Iterator for GroupIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let index = self.index;
        self.records.next_if(|(k, _)| *k == index).map(|(_, t)| t)
    }
}

impl<T: Data> Dia<T> {
    /// Group records by `key_fn` into `size` indices and produce one output
    /// record per index with `group_fn`.
    ///
    /// ### Errors
    /// The trigger fails with [`DiaError::Usage`] if `key_fn` returns an index
    /// `>= size`.
    ///
    /// ### Example
    /// ```
    /// use irondia::*;
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let ctx = Context::new(ContextConfig::default().with_workers(2))?;
    /// let edges = from_vec(&ctx, vec![(0usize, 1usize), (2, 0), (0, 2)]);
    /// let out = edges.group_by_index(
    ///     |e: &(usize, usize)| e.0,
    ///     |g: &mut GroupIter<'_, (usize, usize)>, _| g.map(|e| e.1).collect::<Vec<_>>(),
    ///     3,
    /// );
    /// assert_eq!(out.all_gather()?, vec![vec![1, 2], vec![], vec![0]]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn group_by_index<O, K, G>(&self, key_fn: K, group_fn: G, size: usize) -> Dia<O>
    where
        O: Data,
        K: 'static + Send + Sync + Fn(&T) -> usize,
        G: 'static + Send + Sync + Fn(&mut GroupIter<'_, T>, usize) -> O,
    {
        let exec: IndexExec = Arc::new(move |input: &Shards, ctx: &Context| -> Result<Shards> {
            group_shards(input, ctx, size, &key_fn, &group_fn)
        });
        self.derive(
            NodeKind::GroupByIndex,
            NodeOp::Index { size, exec },
            vec![Arc::clone(&self.node)],
        )
    }
}

fn group_shards<T, O, K, G>(
    input: &Shards,
    ctx: &Context,
    size: usize,
    key_fn: &K,
    group_fn: &G,
) -> Result<Shards>
where
    T: Data,
    O: Data,
    K: Send + Sync + Fn(&T) -> usize,
    G: Send + Sync + Fn(&mut GroupIter<'_, T>, usize) -> O,
{
    let workers = ctx.workers();

    let outgoing = ctx.pool().install(|| {
        input
            .par_iter()
            .map(|part| -> Result<Vec<Vec<(usize, T)>>> {
                let mut buckets: Vec<Vec<(usize, T)>> = vec![Vec::new(); workers];
                for rec in downcast_part::<T>(part.as_ref())? {
                    let k = key_fn(rec);
                    check_index(k, size)?;
                    buckets[IndexRange::owner(size, workers, k)].push((k, rec.clone()));
                }
                Ok(buckets)
            })
            .collect::<Result<Vec<_>>>()
    })?;

    let received = exchange(ctx, outgoing)?;

    let parts = ctx.pool().install(|| {
        received
            .into_par_iter()
            .enumerate()
            .map(|(w, pairs)| -> Result<Partition> {
                let range = ctx.index_range(size, w);
                let mut sorted = MemVec::with_capacity_in(pairs.len(), ctx.allocator().clone())
                    .map_err(DiaError::from)?;
                sorted.try_extend(pairs).map_err(DiaError::from)?;
                sorted.sort_by_key(|(k, _)| *k);

                let mut records = sorted.into_vec().into_iter().peekable();
                let mut out: Vec<O> = Vec::with_capacity(range.len());
                for index in range.as_range() {
                    let mut group = GroupIter {
                        index,
                        records: &mut records,
                    };
                    out.push(group_fn(&mut group, index));
                    while records.next_if(|(k, _)| *k == index).is_some() {}
                }
                Ok(Box::new(out))
            })
            .collect::<Result<Vec<Partition>>>()
    })?;
    Ok(Arc::new(parts))
}
