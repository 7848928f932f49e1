//! Execution counters for a context.
//!
//! Every [`Context`](crate::Context) owns an [`ExecutionMetrics`]. The runner
//! and the shuffle bump its counters; callers read them through
//! [`ExecutionMetrics::snapshot`] or as JSON.
//!
//! ```
//! use irondia::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let ctx = Context::new(ContextConfig::default().with_workers(2))?;
//! let n = from_vec(&ctx, vec![1u32, 2, 3]).map(|x: &u32| x * 2).size()?;
//! assert_eq!(n, 3);
//! assert_eq!(ctx.metrics().snapshot().triggers, 1);
//! println!("{}", ctx.metrics().to_json());
//! # Ok(())
//! # }
//! ```

use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ExecutionMetrics {
    triggers: AtomicU64,
    nodes_materialized: AtomicU64,
    cache_hits: AtomicU64,
    records_exchanged: AtomicU64,
    bytes_exchanged: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Explicit materializations (execute, size, gather, ...).
    pub triggers: u64,
    /// Nodes computed, not counting retained results that were reused.
    pub nodes_materialized: u64,
    /// Times a retained result was reused instead of recomputed.
    pub cache_hits: u64,
    /// Records sent through the channel by index-partitioning operators.
    pub records_exchanged: u64,
    /// Encoded bytes sent through the channel.
    pub bytes_exchanged: u64,
}

impl ExecutionMetrics {
    pub(crate) fn record_trigger(&self) {
        self.triggers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_materialized(&self) {
        self.nodes_materialized.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exchange(&self, records: usize, bytes: usize) {
        self.records_exchanged
            .fetch_add(records as u64, Ordering::Relaxed);
        self.bytes_exchanged.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            triggers: self.triggers.load(Ordering::Relaxed),
            nodes_materialized: self.nodes_materialized.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            records_exchanged: self.records_exchanged.load(Ordering::Relaxed),
            bytes_exchanged: self.bytes_exchanged.load(Ordering::Relaxed),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.snapshot()).unwrap_or(Value::Null)
    }
}
