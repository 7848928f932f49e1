//! Dense reduction into a global index space.
//!
//! `reduce_to_index` maps every record to an index in `[0, n)` and combines
//! all records sharing an index. The output has exactly `n` records in
//! ascending index order; an index no record mapped to holds the neutral
//! value.
//!
//! ### Execution
//! 1. Every worker pre-reduces its partition in an ordered map.
//! 2. The pre-reduced `(index, value)` pairs are exchanged to the worker owning
//!    the index.
//! 3. The owner merges into a dense slot table over its index range, allocated
//!    through the context's tracked allocator, and fills empty slots.
//!
//! The combine function should be associative and commutative; the order in
//! which partial values meet depends on the number of workers.

use crate::context::Context;
use crate::dia::{Data, Dia};
use crate::error::DiaError;
use crate::index::IndexRange;
use crate::mem::MemVec;
use crate::node::{IndexExec, NodeKind, NodeOp};
use crate::shuffle::exchange;
use crate::type_token::{Partition, Shards, downcast_part};
use anyhow::Result;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

impl<T: Data> Dia<T> {
    /// Reduce into `size` records, filling absent indices with `T::default()`.
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
    /// let hits = from_vec(&ctx, vec![(0usize, 1u32), (2, 1), (0, 1)]);
    /// let counts = hits.reduce_to_index(|p: &(usize, u32)| p.0, |a, b| (a.0, a.1 + b.1), 4);
    /// assert_eq!(
    ///     counts.map(|p: &(usize, u32)| p.1).all_gather()?,
    ///     vec![2, 0, 1, 0]
    /// );
    /// # Ok(())
    /// # }
    /// ```
    pub fn reduce_to_index<K, C>(&self, key_fn: K, combine_fn: C, size: usize) -> Dia<T>
    where
        T: Default,
        K: 'static + Send + Sync + Fn(&T) -> usize,
        C: 'static + Send + Sync + Fn(&T, &T) -> T,
    {
        self.reduce_to_index_with_default(key_fn, combine_fn, size, T::default())
    }

    /// Like [`reduce_to_index`](Dia::reduce_to_index) with an explicit
    /// neutral value for empty indices.
    pub fn reduce_to_index_with_default<K, C>(
        &self,
        key_fn: K,
        combine_fn: C,
        size: usize,
        neutral: T,
    ) -> Dia<T>
    where
        K: 'static + Send + Sync + Fn(&T) -> usize,
        C: 'static + Send + Sync + Fn(&T, &T) -> T,
    {
        let exec: IndexExec = Arc::new(move |input: &Shards, ctx: &Context| -> Result<Shards> {
            reduce_shards(input, ctx, size, &key_fn, &combine_fn, &neutral)
        });
        self.derive(
            NodeKind::ReduceToIndex,
            NodeOp::Index { size, exec },
            vec![Arc::clone(&self.node)],
        )
    }
}

fn reduce_shards<T, K, C>(
    input: &Shards,
    ctx: &Context,
    size: usize,
    key_fn: &K,
    combine_fn: &C,
    neutral: &T,
) -> Result<Shards>
where
    T: Data,
    K: Send + Sync + Fn(&T) -> usize,
    C: Send + Sync + Fn(&T, &T) -> T,
{
    let workers = ctx.workers();

    let outgoing = ctx.pool().install(|| {
        input
            .par_iter()
            .map(|part| -> Result<Vec<Vec<(usize, T)>>> {
                let mut local: BTreeMap<usize, T> = BTreeMap::new();
                for rec in downcast_part::<T>(part.as_ref())? {
                    let k = key_fn(rec);
                    check_index(k, size)?;
                    let merged = match local.remove(&k) {
                        Some(acc) => combine_fn(&acc, rec),
                        None => rec.clone(),
                    };
                    local.insert(k, merged);
                }
                let mut buckets: Vec<Vec<(usize, T)>> = vec![Vec::new(); workers];
                for (k, v) in local {
                    buckets[IndexRange::owner(size, workers, k)].push((k, v));
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
                let mut slots: MemVec<Option<T>, _> =
                    MemVec::from_elem_in(None, range.len(), ctx.allocator().clone())
                        .map_err(DiaError::from)?;
                for (k, v) in pairs {
                    let slot = &mut slots[k - range.begin];
                    *slot = Some(match slot.take() {
                        Some(acc) => combine_fn(&acc, &v),
                        None => v,
                    });
                }
                let out: Vec<T> = slots
                    .into_vec()
                    .into_iter()
                    .map(|s| s.unwrap_or_else(|| neutral.clone()))
                    .collect();
                Ok(Box::new(out))
            })
            .collect::<Result<Vec<Partition>>>()
    })?;
    Ok(Arc::new(parts))
}

pub(crate) fn check_index(k: usize, size: usize) -> Result<()> {
    if k >= size {
        return Err(DiaError::usage(format!("index {k} outside 0..{size}")).into());
    }
    Ok(())
}
