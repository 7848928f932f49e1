//! Point-to-point delivery of encoded record blocks between workers.
//!
//! The engine only needs a [`Channel`] that takes a block from worker `from`
//! to worker `to` and, on the receiving side, hands back every block delivered
//! so far ordered by sender id, with each sender's blocks in send order.
//! [`LocalChannel`] is the in-process implementation used by every context
//! unless another one is supplied.

use crate::error::DiaError;
use anyhow::Result;
use std::sync::Mutex;

pub trait Channel: Send + Sync {
    /// Number of workers this channel connects.
    fn workers(&self) -> usize;

    /// Deliver `block` from worker `from` to worker `to`.
    ///
    /// # Errors
    ///
    /// A [`DiaError::Channel`] if either worker id is out of range or the
    /// transport failed.
    fn send(&self, from: usize, to: usize, block: Vec<u8>) -> Result<()>;

    /// Take every block delivered to `to`, ordered by sender.
    ///
    /// # Errors
    ///
    /// A [`DiaError::Channel`] if `to` is out of range or the transport failed.
    fn receive(&self, to: usize) -> Result<Vec<Vec<u8>>>;
}

/// In-process mailboxes, one per worker.
pub struct LocalChannel {
    mailboxes: Vec<Mutex<Vec<(usize, Vec<u8>)>>>,
}

impl LocalChannel {
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            mailboxes: (0..workers).map(|_| Mutex::new(Vec::new())).collect(),
        }
    }

    fn mailbox(&self, worker: usize) -> Result<&Mutex<Vec<(usize, Vec<u8>)>>> {
        self.mailboxes.get(worker).ok_or_else(|| {
            DiaError::Channel(format!(
                "worker {worker} out of range for {} workers",
                self.mailboxes.len()
            ))
            .into()
        })
    }
}

impl Channel for LocalChannel {
    fn workers(&self) -> usize {
        self.mailboxes.len()
    }

    fn send(&self, from: usize, to: usize, block: Vec<u8>) -> Result<()> {
        if from >= self.mailboxes.len() {
            return Err(DiaError::Channel(format!("sender {from} out of range")).into());
        }
        self.mailbox(to)?
            .lock()
            .map_err(|_| DiaError::Channel(format!("mailbox {to} poisoned")))?
            .push((from, block));
        Ok(())
    }

    fn receive(&self, to: usize) -> Result<Vec<Vec<u8>>> {
        let mut delivered = std::mem::take(
            &mut *self
                .mailbox(to)?
                .lock()
                .map_err(|_| DiaError::Channel(format!("mailbox {to} poisoned")))?,
        );
        // Stable: keeps each sender's blocks in send order.
        delivered.sort_by_key(|(from, _)| *from);
        Ok(delivered.into_iter().map(|(_, block)| block).collect())
    }
}
