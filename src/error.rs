//! Error taxonomy for materialization failures.
//!
//! The public API returns [`anyhow::Result`], but every failure raised by the
//! engine itself has a [`DiaError`] as its root cause, so callers can
//! `downcast_ref::<DiaError>()` to tell a contract violation from bad input or
//! a failing user function.

use crate::mem::AllocError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiaError {
    /// Programmer/contract violation: mismatched zip lengths, out-of-range
    /// index keys, invalid configuration.
    #[error("usage error: {0}")]
    Usage(String),

    /// Malformed external input.
    #[error("parse error in line {line:?}: {reason}")]
    Parse { line: String, reason: String },

    /// The memory primitive could not satisfy a request, even after the
    /// low-memory handler ran.
    #[error("resource exhausted: could not allocate {bytes} bytes")]
    ResourceExhausted { bytes: usize },

    /// A user-supplied function failed or panicked while a node was being
    /// materialized.
    #[error("user function failed in {node}: {message}")]
    UserFunction { node: String, message: String },

    #[error("codec error: {0}")]
    Codec(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DiaError {
    pub(crate) fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }
}

impl From<AllocError> for DiaError {
    fn from(e: AllocError) -> Self {
        match e {
            AllocError::Exhausted { bytes } | AllocError::CapacityOverflow { bytes } => {
                Self::ResourceExhausted { bytes }
            }
        }
    }
}

/// Extract the [`DiaError`] at the root of an `anyhow` chain, if any.
#[must_use]
pub fn dia_error(err: &anyhow::Error) -> Option<&DiaError> {
    err.chain().find_map(|e| e.downcast_ref::<DiaError>())
}
