//! Tracked and bypass allocation capabilities.
//!
//! Both paths share one [`RawMemory`] primitive. The tracked path brackets
//! every primitive call with [`Manager`] accounting: `add` before the memory is
//! obtained, `subtract` after it is released, so the manager never undercounts
//! outstanding memory. The bypass path never touches a manager and is what
//! infrastructure (a manager's own storage included) must use.

use crate::mem::manager::Manager;
use crate::mem::primitive::{RawMemory, SystemMemory};
use std::alloc::Layout;
use std::fmt;
use std::mem::size_of;
use std::ptr::NonNull;
use std::sync::Arc;
use thiserror::Error;
use tracing::{trace, warn};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    #[error("memory exhausted allocating {bytes} bytes")]
    Exhausted { bytes: usize },
    #[error("requested capacity overflows the address space ({bytes} bytes)")]
    CapacityOverflow { bytes: usize },
}

/// Called when the primitive reports exhaustion. Returns `true` if it freed
/// something and the allocation should be retried.
pub type LowMemoryHandler = Arc<dyn Fn() -> bool + Send + Sync>;

/// Typed allocation over a memory primitive.
///
/// Requests for zero bytes (either `n == 0` or a zero-sized `T`) return a
/// dangling pointer and never reach the primitive or a manager.
pub trait Allocate: Clone + Send + Sync {
    /// Allocate uninitialized storage for `n` values of `T`.
    ///
    /// # Errors
    ///
    /// [`AllocError::CapacityOverflow`] if `n * size_of::<T>()` does not fit a
    /// layout, [`AllocError::Exhausted`] if the primitive cannot satisfy it.
    fn allocate<T>(&self, n: usize) -> Result<NonNull<T>, AllocError>;

    /// # Safety
    ///
    /// `ptr` must come from `allocate::<T>(n)` on an allocator that compares
    /// equal to this one, with the same `n`, and must not be used afterwards.
    unsafe fn deallocate<T>(&self, ptr: NonNull<T>, n: usize);
}

fn array_layout<T>(n: usize) -> Result<Layout, AllocError> {
    Layout::array::<T>(n).map_err(|_| AllocError::CapacityOverflow {
        bytes: n.saturating_mul(size_of::<T>()),
    })
}

/// Allocation straight from the primitive, with no accounting.
#[derive(Clone)]
pub struct BypassAllocator {
    memory: Arc<dyn RawMemory>,
}

impl BypassAllocator {
    #[must_use]
    pub fn with_memory(memory: Arc<dyn RawMemory>) -> Self {
        Self { memory }
    }
}

impl Default for BypassAllocator {
    fn default() -> Self {
        Self::with_memory(Arc::new(SystemMemory))
    }
}

impl Allocate for BypassAllocator {
    fn allocate<T>(&self, n: usize) -> Result<NonNull<T>, AllocError> {
        let layout = array_layout::<T>(n)?;
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }
        NonNull::new(self.memory.alloc(layout).cast::<T>()).ok_or(AllocError::Exhausted {
            bytes: layout.size(),
        })
    }

    unsafe fn deallocate<T>(&self, ptr: NonNull<T>, n: usize) {
        let Ok(layout) = array_layout::<T>(n) else {
            return;
        };
        if layout.size() == 0 {
            return;
        }
        // SAFETY: forwarded contract.
        unsafe { self.memory.dealloc(ptr.as_ptr().cast::<u8>(), layout) }
    }
}

/// Bypass allocators are stateless apart from the primitive; any two can free
/// each other's memory.
impl PartialEq for BypassAllocator {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for BypassAllocator {}

impl fmt::Debug for BypassAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BypassAllocator")
    }
}

/// Allocation accounted against a [`Manager`].
#[derive(Clone)]
pub struct TrackedAllocator {
    manager: Arc<Manager>,
    memory: Arc<dyn RawMemory>,
    on_low_memory: Option<LowMemoryHandler>,
}

impl TrackedAllocator {
    #[must_use]
    pub fn new(manager: Arc<Manager>) -> Self {
        Self::with_memory(manager, Arc::new(SystemMemory))
    }

    #[must_use]
    pub fn with_memory(manager: Arc<Manager>, memory: Arc<dyn RawMemory>) -> Self {
        Self {
            manager,
            memory,
            on_low_memory: None,
        }
    }

    /// Register the handler consulted when the primitive is exhausted.
    #[must_use]
    pub fn with_low_memory_handler(mut self, handler: LowMemoryHandler) -> Self {
        self.on_low_memory = Some(handler);
        self
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }
}

impl Allocate for TrackedAllocator {
    fn allocate<T>(&self, n: usize) -> Result<NonNull<T>, AllocError> {
        let layout = array_layout::<T>(n)?;
        let size = layout.size();
        if size == 0 {
            return Ok(NonNull::dangling());
        }

        self.manager.add(size);
        trace!(
            manager = self.manager.name(),
            n,
            elem = size_of::<T>(),
            total = self.manager.total(),
            "allocate"
        );

        loop {
            if let Some(ptr) = NonNull::new(self.memory.alloc(layout).cast::<T>()) {
                return Ok(ptr);
            }
            match &self.on_low_memory {
                Some(handler) if handler() => {
                    warn!(bytes = size, "allocation failed, retrying after low-memory handler");
                }
                _ => {
                    self.manager.rollback(size);
                    return Err(AllocError::Exhausted { bytes: size });
                }
            }
        }
    }

    unsafe fn deallocate<T>(&self, ptr: NonNull<T>, n: usize) {
        let Ok(layout) = array_layout::<T>(n) else {
            return;
        };
        if layout.size() == 0 {
            return;
        }
        // SAFETY: forwarded contract.
        unsafe { self.memory.dealloc(ptr.as_ptr().cast::<u8>(), layout) };
        self.manager.subtract(layout.size());
        trace!(
            manager = self.manager.name(),
            n,
            elem = size_of::<T>(),
            total = self.manager.total(),
            "deallocate"
        );
    }
}

/// Tracked allocators are interchangeable exactly when they account against
/// the same manager.
impl PartialEq for TrackedAllocator {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.manager, &other.manager)
    }
}

impl Eq for TrackedAllocator {}

impl fmt::Debug for TrackedAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedAllocator")
            .field("manager", &self.manager.name())
            .field("low_memory_handler", &self.on_low_memory.is_some())
            .finish()
    }
}
