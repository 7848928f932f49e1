//! Helpers for constructing [`Dia`]s from in-memory data and text files.
//!
//! ### Overview
//! - [`from_vec`] -- distributes a `Vec<T>` over the context's workers.
//! - [`read_lines`] -- reads a text file, one record per line.
//!
//! Both split their input contiguously: worker `w` receives the global
//! positions `[floor(w*N/W), floor((w+1)*N/W))`, so concatenating the
//! partitions in worker order restores the input order.
//!
//! ### Example
//! ```
//! use irondia::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let ctx = Context::new(ContextConfig::default().with_workers(3))?;
//! let words = from_vec(&ctx, vec!["alpha".to_string(), "beta".to_string()]);
//! assert_eq!(words.all_gather()?, vec!["alpha", "beta"]);
//! # Ok(())
//! # }
//! ```

use crate::context::Context;
use crate::dia::{Data, Dia};
use crate::error::DiaError;
use crate::node::{NodeKind, NodeOp};
use crate::type_token::{Partition, Shards};
use anyhow::Result;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Split `data` into one contiguous partition per worker.
pub(crate) fn distribute<T: Data>(ctx: &Context, data: Vec<T>) -> Shards {
    let n = data.len();
    let mut rest = data.into_iter();
    let parts = (0..ctx.workers())
        .map(|w| {
            let len = ctx.index_range(n, w).len();
            Box::new(rest.by_ref().take(len).collect::<Vec<T>>()) as Partition
        })
        .collect();
    Arc::new(parts)
}

/// Create a [`Dia<T>`] from a pre-existing [`Vec<T>`].
///
/// The vector is split over the workers immediately; the resulting handle is
/// a source node that later operators build on.
pub fn from_vec<T: Data>(ctx: &Context, data: Vec<T>) -> Dia<T> {
    let shards = distribute(ctx, data);
    let node = ctx.insert_node::<T>(NodeKind::Source, Vec::new(), NodeOp::Source(shards));
    Dia::from_node(ctx.clone(), node)
}

/// Read `path` as UTF-8 text, one record per line without its terminator.
///
/// ### Errors
/// [`DiaError::Io`] if the file cannot be opened or read.
pub fn read_lines(ctx: &Context, path: impl AsRef<Path>) -> Result<Dia<String>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(DiaError::from)?;
    let lines = BufReader::new(file)
        .lines()
        .collect::<Result<Vec<String>, _>>()
        .map_err(DiaError::from)?;
    debug!(path = %path.display(), lines = lines.len(), "read input");
    Ok(from_vec(ctx, lines))
}
