//! Dense global index space and its split across workers.
//!
//! For an index space `[0, n)` and `workers` workers, worker `w` owns the
//! contiguous range `[floor(w*n/workers), floor((w+1)*n/workers))`. Ranges are
//! disjoint, cover the whole space, and ascend with the worker id, so
//! concatenating worker partitions in worker order yields ascending index order.

use std::ops::Range;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexRange {
    pub begin: usize,
    pub end: usize,
}

impl IndexRange {
    /// The range worker `worker` owns.
    #[must_use]
    pub fn for_worker(n: usize, workers: usize, worker: usize) -> Self {
        Self {
            begin: boundary(n, workers, worker),
            end: boundary(n, workers, worker + 1),
        }
    }

    /// The worker owning index `k` (`k < n`).
    #[must_use]
    pub fn owner(n: usize, workers: usize, k: usize) -> usize {
        debug_assert!(k < n, "index {k} outside 0..{n}");
        let mut w = ((k as u128 * workers as u128) / n as u128) as usize;
        w = w.min(workers - 1);
        while w + 1 < workers && boundary(n, workers, w + 1) <= k {
            w += 1;
        }
        while w > 0 && boundary(n, workers, w) > k {
            w -= 1;
        }
        w
    }

    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    pub fn contains(&self, k: usize) -> bool {
        self.begin <= k && k < self.end
    }

    pub fn as_range(&self) -> Range<usize> {
        self.begin..self.end
    }
}

fn boundary(n: usize, workers: usize, w: usize) -> usize {
    ((w as u128 * n as u128) / workers as u128) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_tile_the_index_space() {
        for n in [0usize, 1, 2, 3, 7, 10, 64, 1000] {
            for workers in 1..=9 {
                let mut next = 0;
                for w in 0..workers {
                    let r = IndexRange::for_worker(n, workers, w);
                    assert_eq!(r.begin, next);
                    next = r.end;
                    for k in r.as_range() {
                        assert_eq!(IndexRange::owner(n, workers, k), w, "n={n} W={workers} k={k}");
                    }
                }
                assert_eq!(next, n);
            }
        }
    }

    #[test]
    fn more_workers_than_indices_leaves_some_empty() {
        let empty = (0..5).filter(|&w| IndexRange::for_worker(2, 5, w).is_empty()).count();
        assert_eq!(empty, 3);
    }
}
