//! # irondia
//!
//! A **lazily evaluated dataflow engine** over distributed immutable arrays
//! (DIAs). A DIA is split into one partition per logical worker; operators
//! extend a graph of nodes and nothing runs until a result is requested.
//!
//! ## Key Features
//!
//! - **Lazy operator graph** - `map`, `filter`, `flat_map`, `zip`, `collapse`,
//!   `cache` and the index operators only record what to do
//! - **Index partitioning** - `reduce_to_index` and `group_by_index` produce a
//!   dense result over `[0, n)`, split contiguously across workers
//! - **Fusion** - chains of local transforms run as one pass per partition
//! - **Explicit materialization** - `execute()` realizes a node and cuts the
//!   graph above it, so iterative algorithms keep a bounded graph
//! - **Tracked memory** - data-sized structures are allocated through a
//!   [`TrackedAllocator`] that accounts every byte against the context's
//!   [`Manager`]
//!
//! ## Quick Start
//!
//! ```
//! use irondia::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let ctx = Context::new(ContextConfig::default().with_workers(4))?;
//!
//! // Count word lengths into a dense histogram over 0..8
//! let words = from_vec(&ctx, vec![
//!     "dia".to_string(),
//!     "index".to_string(),
//!     "zip".to_string(),
//!     "reduce".to_string(),
//! ]);
//! let histogram = words
//!     .map(|w: &String| (w.len(), 1u32))
//!     .reduce_to_index(|p: &(usize, u32)| p.0, |a, b| (a.0, a.1 + b.1), 8)
//!     .map(|p: &(usize, u32)| p.1);
//!
//! assert_eq!(histogram.all_gather()?, vec![0, 0, 0, 2, 0, 1, 1, 0]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Iterating
//!
//! Rebind a handle per iteration and call [`Dia::execute`] at the end of
//! each one. The returned node holds the realized result and has no parents,
//! so the previous iteration's graph is freed:
//!
//! ```
//! use irondia::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let ctx = Context::new(ContextConfig::default().with_workers(2))?;
//! let mut values = generate(&ctx, 4, |i| i as u64);
//! for _ in 0..10 {
//!     values = values.map(|v: &u64| v + 1).execute()?;
//! }
//! assert_eq!(values.all_gather()?, vec![10, 11, 12, 13]);
//! assert!(ctx.live_nodes() <= 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! Every materializing call returns [`anyhow::Result`] whose root cause is a
//! [`DiaError`]; use [`dia_error`] to classify a failure.

pub mod channel;
pub mod codec;
pub mod config;
pub mod context;
pub mod dia;
pub mod error;
pub mod explain;
pub mod helpers;
pub mod index;
pub mod mem;
pub mod metrics;
pub mod node;
pub mod node_id;
pub mod page_rank;
mod runner;
mod shuffle;
pub mod testing;
pub mod type_token;

// General re-exports
pub use config::ContextConfig;
pub use context::{Context, ContextBuilder};
pub use dia::{Data, Dia};
pub use error::{DiaError, dia_error};
pub use explain::{ExplainStep, GraphExplanation};
pub use helpers::*;
pub use index::IndexRange;
pub use mem::{Allocate, BypassAllocator, Manager, MemVec, TrackedAllocator};
pub use metrics::{ExecutionMetrics, MetricsSnapshot};
pub use node::NodeKind;
pub use node_id::NodeId;
pub use type_token::Partition;
