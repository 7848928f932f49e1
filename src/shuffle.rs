//! All-to-all exchange of records between workers.
//!
//! Each worker hands in one bucket per destination. Buckets are encoded with
//! the [`codec`](crate::codec) and sent over the context's
//! [`Channel`](crate::channel::Channel); once every worker has sent, every
//! worker receives and decodes its blocks. The result for worker `w` holds the
//! records addressed to it ordered by sender, each sender's records in the
//! order that sender bucketed them.

use crate::codec::{decode_block, encode_block};
use crate::context::Context;
use crate::dia::Data;
use crate::error::DiaError;
use anyhow::Result;
use rayon::prelude::*;
use tracing::debug;

/// `outgoing[from][to]` holds the records worker `from` sends to worker `to`.
pub(crate) fn exchange<T: Data>(ctx: &Context, outgoing: Vec<Vec<Vec<T>>>) -> Result<Vec<Vec<T>>> {
    let workers = ctx.workers();
    if outgoing.len() != workers || outgoing.iter().any(|b| b.len() != workers) {
        return Err(DiaError::usage(format!(
            "exchange expects {workers}x{workers} buckets"
        ))
        .into());
    }

    let sent = ctx.pool().install(|| {
        outgoing
            .into_par_iter()
            .enumerate()
            .try_for_each(|(from, buckets)| -> Result<()> {
                for (to, bucket) in buckets.into_iter().enumerate() {
                    if bucket.is_empty() {
                        continue;
                    }
                    let block = encode_block(&bucket)?;
                    ctx.metrics().record_exchange(bucket.len(), block.len());
                    ctx.channel().send(from, to, block)?;
                }
                Ok(())
            })
    });
    if let Err(e) = sent {
        // Drop whatever did get delivered so the next exchange starts clean.
        for to in 0..workers {
            let _ = ctx.channel().receive(to);
        }
        return Err(e);
    }

    // Empty every mailbox before decoding anything, so a block that fails to
    // decode cannot leave other workers' blocks behind for the next exchange.
    let inboxes = (0..workers)
        .map(|to| ctx.channel().receive(to))
        .collect::<Vec<_>>()
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    let received = ctx.pool().install(|| {
        inboxes
            .into_par_iter()
            .map(|blocks| -> Result<Vec<T>> {
                let mut out = Vec::new();
                for block in blocks {
                    out.extend(decode_block::<T>(&block)?);
                }
                Ok(out)
            })
            .collect::<Result<Vec<_>>>()
    })?;

    debug!(
        workers,
        records = received.iter().map(Vec::len).sum::<usize>(),
        "exchange complete"
    );
    Ok(received)
}
