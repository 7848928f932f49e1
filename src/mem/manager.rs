//! Byte accounting for a memory scope.

use crate::mem::vec::ByString;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts the bytes currently allocated through a tracked path.
///
/// All counters are atomics, so `add`/`subtract` may be called concurrently
/// from any allocation site without blocking. A manager can have a parent;
/// every update is forwarded to it, which lets a context-wide manager sum up
/// the usage of per-subsystem managers.
///
/// The label is stored in a [`ByString`], i.e. allocated through the bypass
/// path, so a manager's own storage never shows up in any manager's total.
pub struct Manager {
    name: ByString,
    parent: Option<Arc<Manager>>,
    total: AtomicUsize,
    peak: AtomicUsize,
    allocs: AtomicUsize,
}

impl Manager {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: ByString::copy_from(name),
            parent: None,
            total: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            allocs: AtomicUsize::new(0),
        }
    }

    /// Create a manager whose updates are also applied to `parent`.
    #[must_use]
    pub fn with_parent(name: &str, parent: Arc<Manager>) -> Self {
        Self {
            parent: Some(parent),
            ..Self::new(name)
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn parent(&self) -> Option<&Arc<Manager>> {
        self.parent.as_ref()
    }

    /// Record `bytes` as allocated.
    pub fn add(&self, bytes: usize) -> &Self {
        let now = self.total.fetch_add(bytes, Ordering::AcqRel) + bytes;
        self.peak.fetch_max(now, Ordering::AcqRel);
        self.allocs.fetch_add(1, Ordering::Relaxed);
        if let Some(parent) = &self.parent {
            parent.add(bytes);
        }
        self
    }

    /// Record `bytes` as released.
    ///
    /// Releasing more than was added is a caller bug; debug builds assert on
    /// it, release builds clamp the counter at zero.
    pub fn subtract(&self, bytes: usize) -> &Self {
        let prev = self
            .total
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| {
                Some(t.saturating_sub(bytes))
            })
            .unwrap_or_else(|t| t);
        debug_assert!(
            prev >= bytes,
            "manager {:?}: subtract({bytes}) exceeds total {prev}",
            self.name()
        );
        if let Some(parent) = &self.parent {
            parent.subtract(bytes);
        }
        self
    }

    /// Undo an `add` whose allocation never happened.
    ///
    /// Releases the bytes and takes the request back out of `alloc_count`;
    /// `peak` keeps whatever the attempt raised it to.
    pub fn rollback(&self, bytes: usize) -> &Self {
        self.subtract(bytes);
        self.uncount();
        self
    }

    fn uncount(&self) {
        self.allocs.fetch_sub(1, Ordering::Relaxed);
        if let Some(parent) = &self.parent {
            parent.uncount();
        }
    }

    /// Bytes currently outstanding.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    /// Highest `total` observed so far.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    /// Number of `add` calls so far, less rolled-back ones.
    pub fn alloc_count(&self) -> usize {
        self.allocs.load(Ordering::Relaxed)
    }
}

/// Bytes accounted against a manager for as long as the reservation lives.
///
/// Used for data the engine holds on to (retained node results) whose storage
/// is not routed through a [`TrackedAllocator`](crate::mem::TrackedAllocator).
#[derive(Debug)]
pub struct Reservation {
    manager: Arc<Manager>,
    bytes: usize,
}

impl Reservation {
    #[must_use]
    pub fn new(manager: Arc<Manager>, bytes: usize) -> Self {
        manager.add(bytes);
        Self { manager, bytes }
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.manager.subtract(self.bytes);
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("name", &self.name())
            .field("total", &self.total())
            .field("peak", &self.peak())
            .field("allocs", &self.alloc_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn add_subtract_restores_total() {
        let m = Manager::new("test");
        m.add(100).add(28);
        assert_eq!(m.total(), 128);
        m.subtract(28).subtract(100);
        assert_eq!(m.total(), 0);
        assert_eq!(m.peak(), 128);
        assert_eq!(m.alloc_count(), 2);
    }

    #[test]
    fn concurrent_paired_updates_net_to_zero() {
        let m = Arc::new(Manager::new("concurrent"));
        m.add(7);
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let m = Arc::clone(&m);
                thread::spawn(move || {
                    for i in 0..1000 {
                        let n = (t * 31 + i) % 97 + 1;
                        m.add(n);
                        m.subtract(n);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(m.total(), 7);
    }

    #[test]
    fn updates_propagate_to_parent() {
        let root = Arc::new(Manager::new("root"));
        let child = Manager::with_parent("child", Arc::clone(&root));
        child.add(64);
        assert_eq!(root.total(), 64);
        child.subtract(64);
        assert_eq!(root.total(), 0);
        assert_eq!(child.name(), "child");
    }

    #[test]
    fn reservation_releases_on_drop() {
        let m = Arc::new(Manager::new("reserve"));
        let r = Reservation::new(Arc::clone(&m), 4096);
        assert_eq!(m.total(), 4096);
        assert_eq!(r.bytes(), 4096);
        drop(r);
        assert_eq!(m.total(), 0);
    }

    #[test]
    fn rollback_undoes_the_count_up_the_chain() {
        let root = Arc::new(Manager::new("root"));
        let child = Manager::with_parent("child", Arc::clone(&root));
        child.add(32).add(16);
        child.rollback(16);
        assert_eq!(child.total(), 32);
        assert_eq!(child.alloc_count(), 1);
        assert_eq!(root.alloc_count(), 1);
        assert_eq!(root.total(), 32);
        assert_eq!(child.peak(), 48);
    }
}
