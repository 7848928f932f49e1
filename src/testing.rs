//! Testing utilities for irondia programs.
//!
//! - **Assertions**: compare gathered results with expected ones, exactly or
//!   within a floating-point tolerance
//! - **Fixtures**: link lists for PageRank and temporary input files
//! - [`TestContext`]: a small, fixed-size context so tests exercise more than
//!   one worker regardless of the machine they run on
//!
//! # Quick Start
//!
//! ```
//! use irondia::*;
//! use irondia::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let ctx = TestContext::new();
//! let result = from_vec(&ctx, vec![1, 2, 3]).map(|x: &i32| x * 2).all_gather()?;
//! assert_collections_equal(&result, &[2, 4, 6]);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;

use crate::{Context, ContextConfig};

/// Worker count of [`TestContext::new`].
pub const TEST_WORKERS: usize = 3;

/// A [`Context`] with a small deterministic configuration.
///
/// Three workers on two threads: more workers than threads, and a worker
/// count that does not divide most test inputs evenly.
#[derive(Clone, Debug)]
pub struct TestContext {
    ctx: Context,
}

impl TestContext {
    /// # Panics
    ///
    /// Panics if the thread pool cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self::with_workers(TEST_WORKERS)
    }

    /// # Panics
    ///
    /// Panics if `workers` is zero or the thread pool cannot be created.
    #[must_use]
    pub fn with_workers(workers: usize) -> Self {
        let config = ContextConfig::default().with_workers(workers).with_threads(2);
        Self {
            ctx: Context::new(config).expect("test context"),
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestContext {
    type Target = Context;

    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

impl AsRef<Context> for TestContext {
    fn as_ref(&self) -> &Context {
        &self.ctx
    }
}
