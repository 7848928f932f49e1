pub(crate) mod actions;
pub(crate) mod generate;
pub(crate) mod group_by_index;
pub(crate) mod reduce_to_index;
pub(crate) mod sources;
pub(crate) mod zip;

// Only re-export files with top-level functions or public types
pub use generate::*;
pub use group_by_index::GroupIter;
pub use sources::{from_vec, read_lines};
