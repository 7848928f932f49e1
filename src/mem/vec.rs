//! A growable vector whose storage comes from an [`Allocate`] capability.

use crate::mem::allocator::{AllocError, Allocate, BypassAllocator};
use std::alloc::{Layout, handle_alloc_error};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};
use std::slice;

/// Vector with allocator-routed storage.
///
/// Growth is fallible: every method that may allocate returns
/// `Result<_, AllocError>` so an exhausted tracked allocator surfaces as an
/// error instead of an abort.
pub struct MemVec<T, A: Allocate> {
    ptr: NonNull<T>,
    cap: usize,
    len: usize,
    alloc: A,
    _marker: PhantomData<T>,
}

// SAFETY: MemVec owns its elements like Vec<T>.
unsafe impl<T: Send, A: Allocate> Send for MemVec<T, A> {}
// SAFETY: shared access only hands out &T.
unsafe impl<T: Sync, A: Allocate> Sync for MemVec<T, A> {}

impl<T, A: Allocate> MemVec<T, A> {
    pub fn new_in(alloc: A) -> Self {
        Self {
            ptr: NonNull::dangling(),
            cap: 0,
            len: 0,
            alloc,
            _marker: PhantomData,
        }
    }

    /// # Errors
    ///
    /// Propagates the allocator's failure.
    pub fn with_capacity_in(cap: usize, alloc: A) -> Result<Self, AllocError> {
        let mut v = Self::new_in(alloc);
        v.grow_to(cap)?;
        Ok(v)
    }

    /// `len` copies of `value`.
    ///
    /// # Errors
    ///
    /// Propagates the allocator's failure.
    pub fn from_elem_in(value: T, len: usize, alloc: A) -> Result<Self, AllocError>
    where
        T: Clone,
    {
        let mut v = Self::with_capacity_in(len, alloc)?;
        for _ in 0..len {
            v.try_push(value.clone())?;
        }
        Ok(v)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// # Errors
    ///
    /// Propagates the allocator's failure; `value` is dropped in that case.
    pub fn try_push(&mut self, value: T) -> Result<(), AllocError> {
        if self.len == self.cap {
            self.grow_to((self.cap * 2).max(4))?;
        }
        // SAFETY: len < cap after growing.
        unsafe { ptr::write(self.ptr.as_ptr().add(self.len), value) };
        self.len += 1;
        Ok(())
    }

    /// # Errors
    ///
    /// Propagates the allocator's failure; elements pushed before the failure
    /// stay in the vector.
    pub fn try_extend<I: IntoIterator<Item = T>>(&mut self, iter: I) -> Result<(), AllocError> {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        if self.cap - self.len < lower {
            self.grow_to(self.len + lower)?;
        }
        for item in iter {
            self.try_push(item)?;
        }
        Ok(())
    }

    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the first len slots are initialized.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: the first len slots are initialized and uniquely borrowed.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Move the elements into a standard `Vec`, releasing this storage.
    pub fn into_vec(mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);
        for i in 0..self.len {
            // SAFETY: each initialized slot is read exactly once; len is reset
            // below so Drop does not drop them again.
            out.push(unsafe { ptr::read(self.ptr.as_ptr().add(i)) });
        }
        self.len = 0;
        out
    }

    fn grow_to(&mut self, new_cap: usize) -> Result<(), AllocError> {
        if new_cap <= self.cap {
            return Ok(());
        }
        let new_ptr = self.alloc.allocate::<T>(new_cap)?;
        // SAFETY: both buffers hold at least len slots and do not overlap.
        unsafe { ptr::copy_nonoverlapping(self.ptr.as_ptr(), new_ptr.as_ptr(), self.len) };
        if self.cap > 0 {
            // SAFETY: the old buffer came from allocate::<T>(cap).
            unsafe { self.alloc.deallocate(self.ptr, self.cap) };
        }
        self.ptr = new_ptr;
        self.cap = new_cap;
        Ok(())
    }
}

impl<T, A: Allocate> Drop for MemVec<T, A> {
    fn drop(&mut self) {
        // SAFETY: drops exactly the initialized prefix, then frees the buffer
        // that came from allocate::<T>(cap).
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.len));
            if self.cap > 0 {
                self.alloc.deallocate(self.ptr, self.cap);
            }
        }
    }
}

impl<T, A: Allocate> Deref for MemVec<T, A> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, A: Allocate> DerefMut for MemVec<T, A> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: fmt::Debug, A: Allocate> fmt::Debug for MemVec<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Vector that never feeds a manager.
pub type ByVec<T> = MemVec<T, BypassAllocator>;

/// Byte string that never feeds a manager.
pub type ByString = MemVec<u8, BypassAllocator>;

impl MemVec<u8, BypassAllocator> {
    /// Copy `s` into bypass storage. Aborts through `handle_alloc_error` if
    /// the system allocator is exhausted, as `String` would.
    #[must_use]
    pub fn copy_from(s: &str) -> Self {
        let mut out = Self::new_in(BypassAllocator::default());
        if out.try_extend(s.bytes()).is_err() {
            handle_alloc_error(Layout::for_value(s.as_bytes()));
        }
        out
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self.as_slice()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::{Manager, TrackedAllocator};
    use std::rc::Rc;
    use std::sync::Arc;

    #[test]
    fn push_grows_and_accounts() {
        let m = Arc::new(Manager::new("vec"));
        let mut v = MemVec::new_in(TrackedAllocator::new(Arc::clone(&m)));
        for i in 0..100u32 {
            v.try_push(i).unwrap();
        }
        assert_eq!(v.len(), 100);
        assert_eq!(v[42], 42);
        assert_eq!(m.total(), v.capacity() * 4);
        drop(v);
        assert_eq!(m.total(), 0);
    }

    #[test]
    fn containers_of_different_types_share_one_scope() {
        let m = Arc::new(Manager::new("scope"));
        let alloc = TrackedAllocator::new(Arc::clone(&m));
        let a = MemVec::from_elem_in(0u64, 8, alloc.clone()).unwrap();
        let b = MemVec::from_elem_in(0u16, 8, alloc).unwrap();
        assert_eq!(m.total(), 8 * 8 + 8 * 2);
        assert_eq!(a.allocator(), b.allocator());
        drop((a, b));
        assert_eq!(m.total(), 0);
    }

    #[test]
    fn into_vec_moves_without_double_drop() {
        let marker = Rc::new(());
        let mut v = MemVec::new_in(BypassAllocator::default());
        for _ in 0..5 {
            v.try_push(Rc::clone(&marker)).unwrap();
        }
        let moved = v.into_vec();
        assert_eq!(Rc::strong_count(&marker), 6);
        drop(moved);
        assert_eq!(Rc::strong_count(&marker), 1);
    }

    #[test]
    fn bystring_round_trips_text() {
        let s = ByString::copy_from("reduce-table");
        assert_eq!(s.as_str(), "reduce-table");
    }
}
