//! Memory accounting substrate.
//!
//! - [`Manager`]: atomic byte counter for one accounting scope.
//! - [`TrackedAllocator`]: allocation that feeds a manager.
//! - [`BypassAllocator`]: allocation that never feeds one, for infrastructure.
//! - [`MemVec`]: a typed container over either capability.
//!
//! Data structures sized by the data (reduce tables, retained results) go
//! through the tracked path of their context; a manager's own storage always
//! goes through the bypass path so accounting never recurses into itself.

pub mod allocator;
pub mod manager;
pub mod primitive;
pub mod vec;

pub use allocator::{AllocError, Allocate, BypassAllocator, LowMemoryHandler, TrackedAllocator};
pub use manager::{Manager, Reservation};
pub use primitive::{RawMemory, SystemMemory};
pub use vec::{ByString, ByVec, MemVec};
