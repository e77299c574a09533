//! Thread-safe object pools with leak detection.
//!
//! A [`Pool<T>`] keeps reusable, expensive-to-construct instances around so a
//! frame loop never has to allocate them again. Callers take an instance with
//! [`Pool::get_or_create`] (never blocks, grows the pool on demand) or
//! [`Pool::get_or_wait`] (blocks until another caller returns one), and give it
//! back with [`Lease::release`].
//!
//! # Leak detection
//!
//! With leak tracking enabled, every lease captures the call stack that took
//! it. A lease dropped without being released is reported through the
//! `lilium::pool::leak` log target and the optional [`LeakHandler`]. Reports
//! are diagnostics only: they never change what the pool does.
//!
//! # Example
//!
//! ```
//! use lilium_core::pool::{Pool, PoolDescriptor, Poolable};
//!
//! #[derive(Debug, Default)]
//! struct Scratch {
//!     data: Vec<u8>,
//! }
//!
//! impl Poolable for Scratch {
//!     fn reset(&mut self) {
//!         self.data.clear();
//!     }
//! }
//!
//! let pool = Pool::new(PoolDescriptor::new("scratch"), Scratch::default);
//!
//! let mut scratch = pool.get_or_create().unwrap();
//! scratch.data.extend_from_slice(&[1, 2, 3]);
//! assert!(scratch.release());
//!
//! // The same instance comes back, cleared but with its allocation intact.
//! let scratch = pool.get_or_create().unwrap();
//! assert!(scratch.data.is_empty());
//! assert!(scratch.data.capacity() >= 3);
//! # scratch.release();
//! ```

mod lease;
mod leak;

pub use lease::{Lease, Poolable};
pub use leak::{LEAK_LOG_TARGET, LeakHandler, LeakReport};

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use leak::{LeakDiagnostics, LeakTracker};

/// Log target used for pool lifecycle events.
pub const POOL_LOG_TARGET: &str = "lilium::pool";

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(u64);

impl PoolId {
    fn next() -> Self {
        Self(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value of the id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool#{}", self.0)
    }
}

/// Descriptor for creating a [`Pool`].
#[derive(Clone)]
pub struct PoolDescriptor {
    /// Name used in log messages and leak reports. Empty means the pooled
    /// type's name.
    pub name: String,
    /// Number of instances created up front.
    pub initial_capacity: usize,
    /// Whether leases that are never returned get reported.
    pub track_leaks: bool,
    /// Extra sink for leak reports, in addition to the log.
    pub leak_handler: Option<LeakHandler>,
}

impl PoolDescriptor {
    /// Create a descriptor with the given name and default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the number of instances created up front.
    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    /// Enable or disable leak tracking.
    pub fn with_leak_tracking(mut self, track_leaks: bool) -> Self {
        self.track_leaks = track_leaks;
        self
    }

    /// Route leak reports to `handler` as well as the log.
    pub fn with_leak_handler(mut self, handler: LeakHandler) -> Self {
        self.leak_handler = Some(handler);
        self
    }
}

impl Default for PoolDescriptor {
    fn default() -> Self {
        Self {
            name: String::new(),
            initial_capacity: 0,
            track_leaks: true,
            leak_handler: None,
        }
    }
}

impl fmt::Debug for PoolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolDescriptor")
            .field("name", &self.name)
            .field("initial_capacity", &self.initial_capacity)
            .field("track_leaks", &self.track_leaks)
            .field("leak_handler", &self.leak_handler.is_some())
            .finish()
    }
}

/// Snapshot of a pool's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Instances currently waiting in the pool.
    pub available: usize,
    /// Instances produced by the factory so far.
    pub created: usize,
    /// Instances currently leased to callers.
    pub leased: usize,
    /// Leases reported as leaked.
    pub leaked: usize,
    /// Whether the pool has been disposed.
    pub disposed: bool,
}

type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;

/// A thread-safe pool of reusable instances.
///
/// Pools are always shared through an [`Arc`]; leases keep a weak reference
/// back so they can find their way home.
///
/// # Lifecycle
///
/// An instance is in exactly one place at a time: available in the pool,
/// leased to one caller, or disposed. Disposing the pool disposes every
/// available instance and turns away any lease returned afterwards; those
/// leases dispose their instance themselves.
///
/// # Thread Safety
///
/// All methods can be called concurrently. The pool does not hand out
/// instances in any particular order.
pub struct Pool<T: Poolable> {
    id: PoolId,
    type_name: &'static str,
    factory: Factory<T>,
    available: Mutex<VecDeque<T>>,
    available_changed: Condvar,
    diagnostics: Arc<LeakDiagnostics>,
    track_leaks: bool,
    created: AtomicUsize,
    leased: AtomicUsize,
}

impl<T: Poolable> Pool<T> {
    /// Create a pool that produces instances with `factory`.
    ///
    /// `descriptor.initial_capacity` instances are created immediately.
    pub fn new<F>(descriptor: PoolDescriptor, factory: F) -> Arc<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let type_name = short_type_name::<T>();
        let name = if descriptor.name.is_empty() {
            type_name.to_string()
        } else {
            descriptor.name
        };

        let pool = Self {
            id: PoolId::next(),
            type_name,
            factory: Box::new(factory),
            available: Mutex::new(VecDeque::with_capacity(descriptor.initial_capacity)),
            available_changed: Condvar::new(),
            diagnostics: Arc::new(LeakDiagnostics::new(name, descriptor.leak_handler)),
            track_leaks: descriptor.track_leaks,
            created: AtomicUsize::new(0),
            leased: AtomicUsize::new(0),
        };

        {
            let mut available = pool.available.lock();
            for _ in 0..descriptor.initial_capacity {
                available.push_back(pool.create_instance());
            }
        }

        Arc::new(pool)
    }

    /// Get the pool id.
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Get the pool name.
    pub fn name(&self) -> &str {
        &self.diagnostics.pool_name
    }

    /// Get the short name of the pooled type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check whether the pool has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.diagnostics.is_disposed()
    }

    /// Take an available instance, or create one if none is available.
    ///
    /// Never blocks and never fails for lack of capacity. Returns `None` only
    /// if the pool has been disposed.
    pub fn get_or_create(self: &Arc<Self>) -> Option<Lease<T>> {
        if self.is_disposed() {
            return None;
        }

        if let Some(instance) = self.available.lock().pop_front() {
            return Some(self.lease(instance));
        }

        if self.is_disposed() {
            return None;
        }

        let instance = self.create_instance();
        Some(self.lease(instance))
    }

    /// Take an available instance, blocking until one is returned.
    ///
    /// The factory is never invoked. With `timeout` set, gives up after that
    /// long; with `None`, waits indefinitely. A timeout too large to form a
    /// deadline also waits indefinitely. Returns `None` on timeout or when
    /// the pool is disposed while waiting.
    pub fn get_or_wait(self: &Arc<Self>, timeout: Option<Duration>) -> Option<Lease<T>> {
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let mut available = self.available.lock();

        loop {
            if self.is_disposed() {
                return None;
            }

            if let Some(instance) = available.pop_front() {
                drop(available);
                return Some(self.lease(instance));
            }

            match deadline {
                None => self.available_changed.wait(&mut available),
                Some(deadline) => {
                    if self
                        .available_changed
                        .wait_until(&mut available, deadline)
                        .timed_out()
                    {
                        let instance = available.pop_front()?;
                        drop(available);
                        return Some(self.lease(instance));
                    }
                }
            }
        }
    }

    /// Hand a lease back to the pool.
    ///
    /// The instance is reset and made available again. The lease is handed
    /// back untouched if it belongs to another pool or if this pool has been
    /// disposed.
    pub fn try_return(&self, mut lease: Lease<T>) -> Result<(), Lease<T>> {
        if !lease.is_from(self) || self.is_disposed() {
            return Err(lease);
        }

        lease.reset();

        let tracker = {
            let mut available = self.available.lock();
            // Disposal flips the flag under this lock, so nothing is pushed
            // into a drained pool.
            if self.is_disposed() {
                return Err(lease);
            }
            let (instance, tracker) = lease.take_parts();
            available.push_back(instance);
            tracker
        };
        self.available_changed.notify_one();

        if let Some(tracker) = tracker {
            tracker.defuse();
        }
        self.end_lease();

        log::trace!(
            target: POOL_LOG_TARGET,
            "'{}' instance returned to pool '{}'.",
            self.type_name,
            self.name()
        );
        Ok(())
    }

    /// Dispose the pool.
    ///
    /// Every available instance is disposed and waiters in
    /// [`get_or_wait`](Self::get_or_wait) are woken up. Leased instances stay
    /// valid; returning them later fails and they dispose themselves.
    /// Calling this more than once is a no-op.
    pub fn dispose(&self) {
        crate::profile_scope!("pool_dispose");

        let drained = {
            let mut available = self.available.lock();
            if self.diagnostics.disposed.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *available)
        };
        self.available_changed.notify_all();

        let count = drained.len();
        for mut instance in drained {
            instance.dispose();
        }

        log::debug!(
            target: POOL_LOG_TARGET,
            "Pool '{}' disposed ({} available instances released).",
            self.name(),
            count
        );
    }

    /// Get a snapshot of the pool's counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            available: self.available.lock().len(),
            created: self.created.load(Ordering::Relaxed),
            leased: self.leased.load(Ordering::Relaxed),
            leaked: self.diagnostics.leaked.load(Ordering::Relaxed),
            disposed: self.is_disposed(),
        }
    }

    fn create_instance(&self) -> T {
        let mut instance = (self.factory)();
        instance.initialize(self.id);
        self.created.fetch_add(1, Ordering::Relaxed);

        log::debug!(
            target: POOL_LOG_TARGET,
            "'{}' instance created by pool '{}'.",
            self.type_name,
            self.name()
        );
        instance
    }

    fn lease(self: &Arc<Self>, instance: T) -> Lease<T> {
        self.leased.fetch_add(1, Ordering::Relaxed);
        let tracker = self
            .track_leaks
            .then(|| LeakTracker::arm(&self.diagnostics, self.type_name));

        log::trace!(
            target: POOL_LOG_TARGET,
            "'{}' instance leased from pool '{}'.",
            self.type_name,
            self.name()
        );
        Lease::new(instance, Arc::downgrade(self), self.id, tracker)
    }

    pub(crate) fn end_lease(&self) {
        self.leased.fetch_sub(1, Ordering::Relaxed);
    }
}

impl<T: Poolable> Drop for Pool<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T: Poolable> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("type_name", &self.type_name)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Last path segment of `T`'s type name, without generic arguments.
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

static_assertions::assert_impl_all!(PoolDescriptor: Send, Sync);
static_assertions::assert_impl_all!(PoolStats: Send, Sync, Copy);
static_assertions::assert_impl_all!(LeakReport: Send, Sync);
