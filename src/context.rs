use crate::channel::{Channel, LocalChannel};
use crate::config::ContextConfig;
use crate::error::DiaError;
use crate::index::IndexRange;
use crate::mem::{LowMemoryHandler, Manager, RawMemory, Reservation, TrackedAllocator};
use crate::metrics::ExecutionMetrics;
use crate::node::{DiaNode, NodeKind, NodeOp};
use crate::node_id::NodeId;
use crate::type_token::{Shards, TypeTag, vec_ops_for};
use anyhow::{Result, anyhow};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::debug;

/// The execution context every DIA belongs to.
///
/// Owns the compute pool, the channel between workers, the memory
/// [`Manager`] that tracked allocations of this context account against, and
/// the execution metrics. Cloning a context shares all of them.
#[derive(Clone)]
pub struct Context {
    pub(crate) inner: Arc<ContextInner>,
}

pub(crate) struct ContextInner {
    config: ContextConfig,
    pool: ThreadPool,
    channel: Arc<dyn Channel>,
    manager: Arc<Manager>,
    allocator: TrackedAllocator,
    metrics: ExecutionMetrics,
    next_id: AtomicU64,
    nodes: Mutex<Vec<Weak<DiaNode>>>,
    // Keyed by the address of the retained `Shards` allocation.
    reservations: Mutex<HashMap<usize, Weak<Reservation>>>,
    // One materialization at a time: the shuffle shares the channel.
    trigger: Mutex<()>,
}

/// Builder for contexts with a custom channel, memory primitive or low-memory
/// handler.
#[derive(Default)]
pub struct ContextBuilder {
    config: ContextConfig,
    channel: Option<Arc<dyn Channel>>,
    low_memory: Option<LowMemoryHandler>,
    manager: Option<Arc<Manager>>,
    memory: Option<Arc<dyn RawMemory>>,
}

impl ContextBuilder {
    #[must_use]
    pub fn config(mut self, config: ContextConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn channel(mut self, channel: Arc<dyn Channel>) -> Self {
        self.channel = Some(channel);
        self
    }

    #[must_use]
    pub fn low_memory_handler(mut self, handler: LowMemoryHandler) -> Self {
        self.low_memory = Some(handler);
        self
    }

    /// Primitive the context's tracked allocator draws from; the system
    /// allocator by default.
    #[must_use]
    pub fn memory(mut self, memory: Arc<dyn RawMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Account against a child of `parent` instead of a fresh root manager.
    #[must_use]
    pub fn parent_manager(mut self, parent: Arc<Manager>) -> Self {
        self.manager = Some(parent);
        self
    }

    /// # Errors
    ///
    /// A [`DiaError::Usage`] if the configuration is invalid or the channel
    /// connects a different number of workers; an error if the thread pool
    /// cannot be built.
    pub fn build(self) -> Result<Context> {
        self.config.validate()?;
        let channel = self
            .channel
            .unwrap_or_else(|| Arc::new(LocalChannel::new(self.config.workers)));
        if channel.workers() != self.config.workers {
            return Err(DiaError::usage(format!(
                "channel connects {} workers, context has {}",
                channel.workers(),
                self.config.workers
            ))
            .into());
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .thread_name(|i| format!("irondia-{i}"))
            .build()?;

        let manager = Arc::new(match self.manager {
            Some(parent) => Manager::with_parent("context", parent),
            None => Manager::new("context"),
        });
        let mut allocator = match self.memory {
            Some(memory) => TrackedAllocator::with_memory(Arc::clone(&manager), memory),
            None => TrackedAllocator::new(Arc::clone(&manager)),
        };
        if let Some(handler) = self.low_memory {
            allocator = allocator.with_low_memory_handler(handler);
        }

        debug!(
            workers = self.config.workers,
            threads = self.config.threads,
            "context created"
        );

        Ok(Context {
            inner: Arc::new(ContextInner {
                config: self.config,
                pool,
                channel,
                manager,
                allocator,
                metrics: ExecutionMetrics::default(),
                next_id: AtomicU64::new(0),
                nodes: Mutex::new(Vec::new()),
                reservations: Mutex::new(HashMap::new()),
                trigger: Mutex::new(()),
            }),
        })
    }
}

impl Context {
    /// A context with the in-process channel.
    ///
    /// # Errors
    ///
    /// See [`ContextBuilder::build`].
    pub fn new(config: ContextConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    #[must_use]
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    pub fn workers(&self) -> usize {
        self.inner.config.workers
    }

    /// The manager tracked allocations of this context account against.
    pub fn memory(&self) -> &Arc<Manager> {
        &self.inner.manager
    }

    /// Tracked allocation capability for data-sized structures.
    pub fn allocator(&self) -> &TrackedAllocator {
        &self.inner.allocator
    }

    pub fn metrics(&self) -> &ExecutionMetrics {
        &self.inner.metrics
    }

    /// Index range of `[0, n)` owned by `worker`.
    pub fn index_range(&self, n: usize, worker: usize) -> IndexRange {
        IndexRange::for_worker(n, self.workers(), worker)
    }

    /// Graph nodes still referenced by some handle.
    pub fn live_nodes(&self) -> usize {
        self.inner
            .nodes
            .lock()
            .map(|nodes| nodes.iter().filter(|n| n.strong_count() > 0).count())
            .unwrap_or(0)
    }

    pub fn same_as(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn pool(&self) -> &ThreadPool {
        &self.inner.pool
    }

    pub(crate) fn channel(&self) -> &dyn Channel {
        self.inner.channel.as_ref()
    }

    /// Account `bytes` for a retained result.
    ///
    /// Retained nodes that hold the same `Shards` allocation (a cache over an
    /// executed node, say) share one reservation, so the bytes count once.
    pub(crate) fn reserve_shards(&self, shards: &Shards, bytes: usize) -> Result<Arc<Reservation>> {
        let mut reservations = self
            .inner
            .reservations
            .lock()
            .map_err(|_| anyhow!(DiaError::usage("reservation table poisoned")))?;
        reservations.retain(|_, r| r.strong_count() > 0);
        let key = Arc::as_ptr(shards) as usize;
        if let Some(shared) = reservations.get(&key).and_then(Weak::upgrade) {
            return Ok(shared);
        }
        let reservation = Arc::new(Reservation::new(Arc::clone(&self.inner.manager), bytes));
        reservations.insert(key, Arc::downgrade(&reservation));
        Ok(reservation)
    }

    /// Claim the context for one materialization.
    ///
    /// A trigger issued from inside a user function of this context, i.e. on
    /// one of its pool threads or while this thread already holds the claim,
    /// can never be served and is a [`DiaError::Usage`].
    pub(crate) fn begin_trigger(&self) -> Result<TriggerGuard<'_>> {
        let key = Arc::as_ptr(&self.inner) as usize;
        let nested = self.inner.pool.current_thread_index().is_some()
            || ACTIVE_TRIGGERS.with_borrow(|active| active.contains(&key));
        if nested {
            return Err(anyhow!(DiaError::usage(
                "a DIA was triggered from inside a user function of the same context"
            )));
        }
        let lock = self
            .inner
            .trigger
            .lock()
            .map_err(|_| anyhow!(DiaError::usage("context poisoned by an earlier panic")))?;
        ACTIVE_TRIGGERS.with_borrow_mut(|active| active.push(key));
        Ok(TriggerGuard { _lock: lock, key })
    }

    pub(crate) fn insert_node<T: Send + Sync + 'static>(
        &self,
        kind: NodeKind,
        parents: Vec<Arc<DiaNode>>,
        op: NodeOp,
    ) -> Arc<DiaNode> {
        let id = NodeId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let node = Arc::new(DiaNode::new(
            id,
            kind,
            TypeTag::of::<T>(),
            vec_ops_for::<T>(),
            parents,
            op,
        ));
        if let Ok(mut nodes) = self.inner.nodes.lock() {
            nodes.retain(|n| n.strong_count() > 0);
            nodes.push(Arc::downgrade(&node));
        }
        node
    }
}

thread_local! {
    // Contexts whose trigger lock the current thread holds.
    static ACTIVE_TRIGGERS: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

pub(crate) struct TriggerGuard<'a> {
    _lock: MutexGuard<'a, ()>,
    key: usize,
}

impl Drop for TriggerGuard<'_> {
    fn drop(&mut self) {
        ACTIVE_TRIGGERS.with_borrow_mut(|active| active.retain(|k| *k != self.key));
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.inner.config)
            .field("memory", &self.inner.manager)
            .field("live_nodes", &self.live_nodes())
            .finish()
    }
}
