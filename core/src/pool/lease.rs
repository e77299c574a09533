//! The poolable resource contract and the lease handed to callers.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Weak;

use super::leak::LeakTracker;
use super::{Pool, PoolId};

/// Trait for objects that can live in a [`Pool`].
///
/// The same instance is handed to many unrelated callers over its lifetime,
/// so [`reset`](Poolable::reset) must bring it back to the state a freshly
/// constructed instance would have. Nothing else re-initializes a pooled
/// instance between leases.
pub trait Poolable: Send + 'static {
    /// Bind a freshly constructed instance to the pool that owns it.
    ///
    /// Called exactly once, right after the pool's factory produced the
    /// instance and before it is first handed out.
    fn initialize(&mut self, _pool: PoolId) {}

    /// Restore the instance to a clean state.
    ///
    /// Called by the pool when a lease is returned, before the instance is
    /// made available again. Implementations wrapping a native protocol must
    /// force-complete any unfinished step here.
    fn reset(&mut self);

    /// Release the instance for good.
    ///
    /// Called exactly once when the instance leaves circulation: the pool
    /// drains it on disposal, a lease could not be returned because the pool
    /// is gone, or a lease was dropped without being released.
    fn dispose(&mut self) {}
}

/// Exclusive, temporary ownership of a pooled instance.
///
/// A lease dereferences to the pooled value. It must be handed back with
/// [`release`](Lease::release); a lease that is simply dropped counts as a
/// leak. The leak is reported if the pool tracks leaks, and the instance is
/// disposed rather than reused.
pub struct Lease<T: Poolable> {
    value: Option<T>,
    pool: Weak<Pool<T>>,
    pool_id: PoolId,
    tracker: Option<LeakTracker>,
}

impl<T: Poolable> Lease<T> {
    pub(super) fn new(
        value: T,
        pool: Weak<Pool<T>>,
        pool_id: PoolId,
        tracker: Option<LeakTracker>,
    ) -> Self {
        Self {
            value: Some(value),
            pool,
            pool_id,
            tracker,
        }
    }

    /// Id of the pool this lease was taken from.
    pub fn pool_id(&self) -> PoolId {
        self.pool_id
    }

    /// Check whether this lease was taken from `pool`.
    pub fn is_from(&self, pool: &Pool<T>) -> bool {
        self.pool_id == pool.id()
    }

    /// Give the instance back.
    ///
    /// The instance is returned to its pool, which resets it. If that is not
    /// possible because the pool has been disposed or dropped, the instance
    /// is disposed instead so it is never silently lost.
    ///
    /// Returns `true` if the instance went back to the pool.
    pub fn release(self) -> bool {
        let Some(pool) = self.pool.upgrade() else {
            self.discard();
            return false;
        };

        match pool.try_return(self) {
            Ok(()) => true,
            Err(lease) => {
                lease.discard();
                false
            }
        }
    }

    /// Take the value and tracker out, leaving an empty lease whose drop is
    /// a no-op.
    pub(super) fn take_parts(&mut self) -> (T, Option<LeakTracker>) {
        match self.value.take() {
            Some(value) => (value, self.tracker.take()),
            None => unreachable!("lease accessed after release"),
        }
    }

    /// Dispose the instance without returning it. Not a leak.
    fn discard(mut self) {
        let (mut value, tracker) = self.take_parts();
        if let Some(tracker) = tracker {
            tracker.defuse();
        }
        if let Some(pool) = self.pool.upgrade() {
            pool.end_lease();
        }
        value.dispose();
    }
}

impl<T: Poolable> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.value {
            Some(value) => value,
            None => unreachable!("lease accessed after release"),
        }
    }
}

impl<T: Poolable> DerefMut for Lease<T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.value {
            Some(value) => value,
            None => unreachable!("lease accessed after release"),
        }
    }
}

impl<T: Poolable> Drop for Lease<T> {
    fn drop(&mut self) {
        let Some(mut value) = self.value.take() else {
            return;
        };

        let pool = self.pool.upgrade();
        if let Some(pool) = &pool {
            pool.end_lease();
        }

        match self.tracker.take() {
            // Reports unless the pool is already gone or disposed.
            Some(tracker) => drop(tracker),
            None => {
                if let Some(pool) = &pool {
                    log::debug!(
                        target: super::POOL_LOG_TARGET,
                        "'{}' instance dropped without being returned to pool '{}'.",
                        pool.type_name(),
                        pool.name()
                    );
                }
            }
        }

        value.dispose();
    }
}

impl<T: Poolable + fmt::Debug> fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("pool_id", &self.pool_id)
            .field("value", &self.value)
            .field("tracked", &self.tracker.is_some())
            .finish()
    }
}
