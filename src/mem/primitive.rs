//! The raw memory primitive both allocation paths sit on.

use std::alloc::{GlobalAlloc, Layout, System};

/// Raw allocate/free over untyped layouts.
///
/// `alloc` returns a null pointer when memory is exhausted; it never panics.
pub trait RawMemory: Send + Sync {
    fn alloc(&self, layout: Layout) -> *mut u8;

    /// # Safety
    ///
    /// `ptr` must come from `alloc` on this primitive with the same `layout`,
    /// and must not have been freed already.
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout);
}

/// The process's system allocator.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemMemory;

impl RawMemory for SystemMemory {
    fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: callers never pass zero-sized layouts.
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: forwarded contract.
        unsafe { System.dealloc(ptr, layout) }
    }
}
