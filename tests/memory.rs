use irondia::mem::{
    AllocError, BypassAllocator, Manager, MemVec, RawMemory, SystemMemory, TrackedAllocator,
};
use irondia::testing::*;
use irondia::{Context, ContextConfig, DiaError, GroupIter, dia_error, from_vec, generate};
use std::alloc::Layout;
use std::mem::size_of;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

#[test]
fn concurrent_net_zero_updates_restore_the_total() {
    let manager = Arc::new(Manager::new("concurrent"));
    manager.add(100);
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let m = Arc::clone(&manager);
            thread::spawn(move || {
                for i in 0..1000 {
                    let bytes = (t * 31 + i) % 97 + 1;
                    m.add(bytes);
                    m.subtract(bytes);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(manager.total(), 100);
    assert!(manager.peak() >= 100);
}

#[test]
fn tracked_vectors_account_their_capacity() -> Result<(), AllocError> {
    let manager = Arc::new(Manager::new("vec"));
    let alloc = TrackedAllocator::new(Arc::clone(&manager));
    {
        let mut v: MemVec<u64, _> = MemVec::with_capacity_in(16, alloc.clone())?;
        assert_eq!(manager.total(), 16 * size_of::<u64>());
        for i in 0..40 {
            v.try_push(i)?;
        }
        assert_eq!(manager.total(), v.capacity() * size_of::<u64>());
        assert_eq!(v.iter().sum::<u64>(), (0..40u64).sum::<u64>());
    }
    assert_eq!(manager.total(), 0);
    Ok(())
}

#[test]
fn bypass_allocations_never_touch_a_manager() -> Result<(), AllocError> {
    let ctx = TestContext::new();
    let before = ctx.memory().total();
    let v = MemVec::from_elem_in(7u32, 1000, BypassAllocator::default())?;
    assert_eq!(v.len(), 1000);
    assert_eq!(ctx.memory().total(), before);

    let m = Manager::new("a label stored through the bypass path");
    assert_eq!(m.total(), 0);
    assert_eq!(m.alloc_count(), 0);
    Ok(())
}

#[test]
fn index_operators_release_their_tables() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let start = ctx.memory().total();

    let reduced = generate(&ctx, 500, |i| (i % 50, 1u64))
        .reduce_to_index(|p: &(usize, u64)| p.0, |a, b| (a.0, a.1 + b.1), 50);
    assert_eq!(reduced.size()?, 50);

    let grouped = from_vec(&ctx, (0..300usize).collect::<Vec<_>>())
        .group_by_index(|i: &usize| i % 10, |g: &mut GroupIter<'_, usize>, _| g.count(), 10);
    assert_eq!(grouped.all_gather()?, vec![30; 10]);

    assert!(ctx.memory().peak() > start);
    assert!(ctx.memory().alloc_count() > 0);
    assert_eq!(ctx.memory().total(), start);
    Ok(())
}

#[test]
fn retained_results_are_accounted_until_dropped() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    assert_eq!(ctx.memory().total(), 0);

    let executed = generate(&ctx, 100, |i| i as u64).execute()?;
    assert_eq!(ctx.memory().total(), 100 * size_of::<u64>());

    let cached = generate(&ctx, 10, |i| i as u32).cache();
    assert_eq!(ctx.memory().total(), 100 * size_of::<u64>());
    cached.size()?;
    assert_eq!(
        ctx.memory().total(),
        100 * size_of::<u64>() + 10 * size_of::<u32>()
    );

    drop(executed);
    drop(cached);
    assert_eq!(ctx.memory().total(), 0);
    Ok(())
}

#[test]
fn context_managers_report_to_a_parent() -> anyhow::Result<()> {
    let root = Arc::new(Manager::new("process"));
    let a = Context::builder()
        .config(ContextConfig::default().with_workers(2).with_threads(1))
        .parent_manager(Arc::clone(&root))
        .build()?;
    let b = Context::builder()
        .config(ContextConfig::default().with_workers(3).with_threads(1))
        .parent_manager(Arc::clone(&root))
        .build()?;

    let x = generate(&a, 8, |i| i as u64).execute()?;
    let y = generate(&b, 4, |i| i as u64).execute()?;
    assert_eq!(a.memory().total(), 8 * size_of::<u64>());
    assert_eq!(b.memory().total(), 4 * size_of::<u64>());
    assert_eq!(root.total(), 12 * size_of::<u64>());
    assert!(Arc::ptr_eq(a.memory().parent().unwrap(), &root));

    drop(x);
    drop(y);
    assert_eq!(root.total(), 0);
    Ok(())
}

#[test]
fn shared_results_are_accounted_once() -> anyhow::Result<()> {
    let ctx = TestContext::new();
    let executed = generate(&ctx, 100, |i| i as u64).execute()?;
    let bytes = 100 * size_of::<u64>();
    assert_eq!(ctx.memory().total(), bytes);

    let cached = executed.collapse().cache();
    assert_eq!(cached.size()?, 100);
    let again = executed.collapse().execute()?;
    assert_eq!(ctx.memory().total(), bytes);

    drop(executed);
    assert_eq!(ctx.memory().total(), bytes);
    drop(cached);
    drop(again);
    assert_eq!(ctx.memory().total(), 0);
    Ok(())
}

/// Refuses every request while `starved` is set.
struct Starvable {
    starved: AtomicBool,
}

impl RawMemory for Starvable {
    fn alloc(&self, layout: Layout) -> *mut u8 {
        if self.starved.load(Ordering::SeqCst) {
            return std::ptr::null_mut();
        }
        SystemMemory.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { SystemMemory.dealloc(ptr, layout) }
    }
}

fn starved_memory() -> Arc<Starvable> {
    Arc::new(Starvable {
        starved: AtomicBool::new(true),
    })
}

fn histogram(ctx: &Context) -> anyhow::Result<usize> {
    generate(ctx, 40, |i| (i % 8, 1u64))
        .reduce_to_index(|p: &(usize, u64)| p.0, |a, b| (a.0, a.1 + b.1), 8)
        .size()
}

#[test]
fn exhausted_memory_fails_the_trigger() -> anyhow::Result<()> {
    let memory = starved_memory();
    let ctx = Context::builder()
        .config(ContextConfig::default().with_workers(2).with_threads(1))
        .memory(memory.clone())
        .build()?;

    let err = histogram(&ctx).unwrap_err();
    assert!(matches!(
        dia_error(&err),
        Some(DiaError::ResourceExhausted { .. })
    ));
    assert_eq!(ctx.memory().total(), 0);
    assert_eq!(ctx.memory().alloc_count(), 0);

    memory.starved.store(false, Ordering::SeqCst);
    assert_eq!(histogram(&ctx)?, 8);
    Ok(())
}

#[test]
fn low_memory_handler_lets_the_trigger_succeed() -> anyhow::Result<()> {
    let memory = starved_memory();
    let calls = Arc::new(AtomicUsize::new(0));
    let (relief, seen) = (memory.clone(), Arc::clone(&calls));
    let ctx = Context::builder()
        .config(ContextConfig::default().with_workers(2).with_threads(1))
        .memory(memory)
        .low_memory_handler(Arc::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
            relief.starved.store(false, Ordering::SeqCst);
            true
        }))
        .build()?;

    assert_eq!(histogram(&ctx)?, 8);
    assert!(calls.load(Ordering::SeqCst) >= 1);
    assert_eq!(ctx.memory().total(), 0);
    Ok(())
}
