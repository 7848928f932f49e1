//! Actions: operations that trigger materialization and bring results back.
//!
//! Each action runs the graph above its handle through the runner and then
//! reads the worker partitions in worker order.

use crate::dia::{Data, Dia};
use crate::error::DiaError;
use crate::runner::Runner;
use crate::type_token::{Shards, downcast_part};
use anyhow::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

impl<T: Data> Dia<T> {
    fn materialize(&self) -> Result<Shards> {
        Runner::new(&self.ctx).run(&self.node)
    }

    /// Global record count.
    pub fn size(&self) -> Result<usize> {
        let shards = self.materialize()?;
        Ok(self.node.count(&shards))
    }

    /// Every record, in global order.
    pub fn all_gather(&self) -> Result<Vec<T>> {
        let shards = self.materialize()?;
        let mut out = Vec::with_capacity(self.node.count(&shards));
        for part in shards.iter() {
            out.extend_from_slice(downcast_part::<T>(part.as_ref())?);
        }
        Ok(out)
    }

    /// The greatest record, or `None` for an empty DIA.
    pub fn max(&self) -> Result<Option<T>>
    where
        T: Ord,
    {
        let shards = self.materialize()?;
        let mut best: Option<&T> = None;
        for part in shards.iter() {
            if let Some(m) = downcast_part::<T>(part.as_ref())?.iter().max() {
                best = Some(best.map_or(m, |b| b.max(m)));
            }
        }
        Ok(best.cloned())
    }
}

impl Dia<String> {
    /// Write every record as one line of `path`, in global order.
    ///
    /// ### Errors
    /// [`DiaError::Io`] if the file cannot be created or written, plus any
    /// failure of the materialization itself.
    pub fn write_lines(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let shards = self.materialize()?;
        let mut out = BufWriter::new(File::create(path).map_err(DiaError::from)?);
        let mut written = 0usize;
        for part in shards.iter() {
            for line in downcast_part::<String>(part.as_ref())? {
                writeln!(out, "{line}").map_err(DiaError::from)?;
                written += 1;
            }
        }
        out.flush().map_err(DiaError::from)?;
        debug!(path = %path.display(), lines = written, "wrote output");
        Ok(())
    }

    /// Print every record to stdout, in global order.
    pub fn print_lines(&self) -> Result<()> {
        let shards = self.materialize()?;
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for part in shards.iter() {
            for line in downcast_part::<String>(part.as_ref())? {
                writeln!(out, "{line}").map_err(DiaError::from)?;
            }
        }
        Ok(())
    }
}
