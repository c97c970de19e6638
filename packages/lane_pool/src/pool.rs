use std::any::type_name;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace};

use crate::{Error, LanePoolBuilder, Lanes, Lease, Result};

/// The largest capacity a pool may be created with on this platform.
///
/// This is the length limit of a slice of slot-sized cells, so slot indexing can never overflow.
/// Whether that much memory can actually be allocated is a separate matter.
#[expect(
    clippy::integer_division,
    reason = "exact division by the size of a pointer"
)]
pub const MAX_CAPACITY: usize = isize::MAX.unsigned_abs() / size_of::<usize>();

pub(crate) type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;
pub(crate) type CleanHook<T> = Box<dyn Fn(&mut T) + Send + Sync>;
pub(crate) type DisposeHook<T> = Box<dyn Fn(T) + Send + Sync>;

/// The caller-supplied logic a pool runs on its instances.
pub(crate) struct Hooks<T> {
    pub(crate) factory: Factory<T>,
    pub(crate) clean: Option<CleanHook<T>>,
    pub(crate) dispose: Option<DisposeHook<T>>,
}

struct PoolCore<T> {
    lanes: Lanes<T>,

    // Active -> Disposed is the only state transition a pool ever makes.
    disposed: AtomicBool,

    hooks: Hooks<T>,
}

impl<T> PoolCore<T> {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    #[cold]
    fn rent_slow(&self) -> Box<T> {
        if let Some(value) = self.lanes.claim_overflow() {
            return value;
        }

        trace!(
            capacity = self.lanes.capacity(),
            "no idle instance in pool, creating a new one"
        );

        Box::new((self.hooks.factory)())
    }

    /// Permanently drops an instance that the pool will not retain.
    fn discard(&self, value: Box<T>) {
        match &self.hooks.dispose {
            Some(dispose) => dispose(*value),
            None => drop(value),
        }
    }

    fn drain(&self) -> usize {
        self.lanes.drain(|value| self.discard(value))
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let drained = self.drain();

        debug!(
            drained,
            capacity = self.lanes.capacity(),
            "pool disposed"
        );
    }
}

impl<T> Drop for PoolCore<T> {
    fn drop(&mut self) {
        // Drain even if already disposed: a dispose hook that panicked part way through
        // dispose() leaves the rest of the instances in their slots.
        let was_disposed = self.disposed.swap(true, Ordering::SeqCst);
        let drained = self.drain();

        if !was_disposed {
            debug!(
                drained,
                capacity = self.lanes.capacity(),
                "pool disposed on drop"
            );
        }
    }
}

/// A bounded, lock-free pool of reusable heap-allocated instances.
///
/// The pool retains at most [`capacity()`][Self::capacity] idle instances. Renting takes an
/// idle instance if one is available and creates a new one with the factory otherwise, so
/// renting from an active pool never fails. Returning an instance stores it for reuse if
/// there is room and disposes of it otherwise.
///
/// No operation takes a lock or waits for another thread. Each storage slot is a single atomic
/// pointer and every slot transition is one compare-and-swap, so an instance is never handed to
/// two renters at once. A slot that loses a race is simply skipped.
///
/// This type is a cheap handle: clones refer to the same pool.
///
/// # Lifecycle
///
/// A pool starts active and becomes disposed when [`dispose()`][Self::dispose] is called or when
/// the last handle is dropped. Disposal runs the dispose hook on every idle instance. Instances
/// that are rented out at that point belong to their renters; if they are returned later, the
/// pool disposes of them right away instead of storing them.
///
/// # Thread safety
///
/// The pool is thread-safe if the instance type is [`Send`]. The factory and hooks may be called
/// from any thread, concurrently.
///
/// # Example
///
/// ```rust
/// use lane_pool::LanePool;
///
/// let pool = LanePool::builder()
///     .capacity(4)
///     .factory(|| Vec::<u8>::with_capacity(1024))
///     .clean(Vec::clear)
///     .build()
///     .unwrap();
///
/// let mut buffer = pool.rent().unwrap();
/// buffer.extend_from_slice(b"scratch");
/// pool.give_back(buffer);
///
/// // The same buffer comes back, already cleaned.
/// let buffer = pool.rent().unwrap();
/// assert!(buffer.is_empty());
/// assert!(buffer.capacity() >= 1024);
/// ```
pub struct LanePool<T> {
    core: Arc<PoolCore<T>>,
}

impl<T> LanePool<T> {
    /// Creates a pool with the given capacity that creates new instances with `factory`.
    ///
    /// Use [`LanePool::builder()`] to also specify clean and dispose hooks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapacity`] if `capacity` is zero or above [`MAX_CAPACITY`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use lane_pool::LanePool;
    ///
    /// let pool = LanePool::new(8, || String::with_capacity(256)).unwrap();
    /// assert_eq!(pool.capacity(), 8);
    /// ```
    pub fn new<F>(capacity: usize, factory: F) -> Result<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::builder().capacity(capacity).factory(factory).build()
    }

    /// Creates a pool with the given capacity that creates new instances with
    /// [`Default::default()`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapacity`] if `capacity` is zero or above [`MAX_CAPACITY`].
    pub fn with_default(capacity: usize) -> Result<Self>
    where
        T: Default + 'static,
    {
        Self::builder().capacity(capacity).default_factory().build()
    }

    /// Returns a builder for creating a pool with custom configuration.
    pub fn builder() -> LanePoolBuilder<T> {
        LanePoolBuilder::new()
    }

    pub(crate) fn from_parts(capacity: usize, hooks: Hooks<T>) -> Self {
        Self {
            core: Arc::new(PoolCore {
                lanes: Lanes::new(capacity),
                disposed: AtomicBool::new(false),
                hooks,
            }),
        }
    }

    /// Rents an instance from the pool.
    ///
    /// Takes an idle instance if one is available, otherwise creates a new one with the factory.
    /// Ownership of the instance passes to the caller; hand it back with
    /// [`give_back()`][Self::give_back] to make it available for reuse.
    ///
    /// A panic in the factory propagates to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the pool has been disposed.
    pub fn rent(&self) -> Result<Box<T>> {
        let core = &*self.core;

        if core.is_disposed() {
            return Err(Error::Disposed);
        }

        if let Some(value) = core.lanes.claim_fast() {
            return Ok(value);
        }

        Ok(core.rent_slow())
    }

    /// Returns an instance to the pool.
    ///
    /// The clean hook runs first, whatever happens next. If the pool has room, the instance is
    /// stored for reuse. If the pool is full or disposed, the dispose hook runs and the
    /// instance is dropped. Neither case is an error.
    ///
    /// A panic in the clean or dispose hook propagates to the caller.
    pub fn give_back(&self, mut value: Box<T>) {
        let core = &*self.core;

        if let Some(clean) = &core.hooks.clean {
            clean(&mut *value);
        }

        if core.is_disposed() {
            trace!("instance returned to disposed pool, disposing it");
            core.discard(value);
            return;
        }

        match core
            .lanes
            .store_fast(value)
            .or_else(|value| core.lanes.store_overflow(value))
        {
            Ok(()) => {
                // If dispose() drained the slots before our store landed, nobody else will
                // ever look at this slot again, so we finish the drain ourselves.
                if core.is_disposed() {
                    core.drain();
                }
            }
            Err(value) => {
                trace!(
                    capacity = core.lanes.capacity(),
                    "pool is full, disposing returned instance"
                );
                core.discard(value);
            }
        }
    }

    /// Returns an instance to the pool if there is one to return.
    ///
    /// Passing `None` does nothing. Otherwise this is the same as [`give_back()`][Self::give_back].
    pub fn give_back_opt(&self, value: Option<Box<T>>) {
        if let Some(value) = value {
            self.give_back(value);
        }
    }

    /// Rents an instance wrapped in a [`Lease`] that returns it to the pool when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the pool has been disposed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use lane_pool::LanePool;
    ///
    /// let pool = LanePool::<String>::with_default(2).unwrap();
    ///
    /// {
    ///     let mut text = pool.acquire().unwrap();
    ///     text.push_str("hello");
    /// } // Returned to the pool here.
    ///
    /// assert_eq!(pool.len(), 1);
    /// ```
    pub fn acquire(&self) -> Result<Lease<'_, T>> {
        Ok(Lease::new(self, self.rent()?))
    }

    /// Rents an instance, applies `action` to it and returns it to the pool.
    ///
    /// The instance is returned even if `action` panics.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the pool has been disposed.
    pub fn borrow(&self, action: impl FnOnce(&mut T)) -> Result<()> {
        self.borrow_with_result(action)
    }

    /// Rents an instance, applies `func` to it, returns the instance to the pool and
    /// then hands back whatever `func` returned.
    ///
    /// The instance is returned even if `func` panics.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the pool has been disposed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::fmt::Write;
    ///
    /// use lane_pool::LanePool;
    ///
    /// let pool = LanePool::builder()
    ///     .capacity(2)
    ///     .default_factory()
    ///     .clean(String::clear)
    ///     .build()
    ///     .unwrap();
    ///
    /// let greeting = pool
    ///     .borrow_with_result(|text: &mut String| {
    ///         write!(text, "hello {}", 42).unwrap();
    ///         text.clone()
    ///     })
    ///     .unwrap();
    ///
    /// assert_eq!(greeting, "hello 42");
    /// ```
    pub fn borrow_with_result<R>(&self, func: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut lease = self.acquire()?;
        Ok(func(&mut *lease))
    }

    /// Disposes of the pool.
    ///
    /// Every idle instance is claimed and passed to the dispose hook. Afterwards, renting fails
    /// and returned instances are disposed of immediately. Calling this more than once has no
    /// further effect.
    ///
    /// A panic in the dispose hook propagates to the caller. Instances not yet drained at that
    /// point are disposed of when the pool is dropped.
    pub fn dispose(&self) {
        self.core.dispose();
    }

    /// Whether the pool has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    /// The maximum number of idle instances the pool retains.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.core.lanes.capacity()
    }

    /// The number of idle instances in the pool.
    ///
    /// This is a best-effort count: slots are inspected one by one without synchronization,
    /// so under concurrent use the result may not match any single moment in time.
    #[must_use]
    pub fn len(&self) -> usize {
        self.core.lanes.occupied()
    }

    /// Whether the pool holds no idle instances.
    ///
    /// Best-effort in the same way as [`len()`][Self::len].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for LanePool<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> fmt::Debug for LanePool<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;
    use std::panic::{self, AssertUnwindSafe};
    use std::rc::Rc;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU32;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(LanePool<String>: Send, Sync, Clone, fmt::Debug);
    assert_impl_all!(LanePool<Cell<u32>>: Send, Sync);
    assert_not_impl_any!(LanePool<Rc<u32>>: Send, Sync);

    fn counting_pool(capacity: usize) -> (LanePool<u32>, Arc<Mutex<Vec<u32>>>) {
        let next = AtomicU32::new(1);
        let disposed = Arc::new(Mutex::new(Vec::new()));
        let disposed_clone = Arc::clone(&disposed);

        let pool = LanePool::builder()
            .capacity(capacity)
            .factory(move || next.fetch_add(1, Ordering::Relaxed))
            .dispose(move |value| disposed_clone.lock().unwrap().push(value))
            .build()
            .unwrap();

        (pool, disposed)
    }

    #[test]
    fn rent_from_empty_pool_uses_factory() {
        let (pool, _) = counting_pool(2);

        assert_eq!(*pool.rent().unwrap(), 1);
        assert_eq!(*pool.rent().unwrap(), 2);
    }

    #[test]
    fn returned_instance_is_reused() {
        let (pool, _) = counting_pool(2);

        let value = pool.rent().unwrap();
        pool.give_back(value);

        assert_eq!(pool.len(), 1);
        assert_eq!(*pool.rent().unwrap(), 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn fast_lane_is_preferred_for_return() {
        let (pool, _) = counting_pool(3);

        let value = pool.rent().unwrap();
        pool.give_back(value);

        assert_eq!(pool.core.lanes.claim_fast().as_deref(), Some(&1));
    }

    #[test]
    fn overflow_is_disposed_of() {
        let (pool, disposed) = counting_pool(2);

        let a = pool.rent().unwrap();
        let b = pool.rent().unwrap();
        let c = pool.rent().unwrap();

        pool.give_back(a);
        pool.give_back(b);
        pool.give_back(c);

        assert_eq!(pool.len(), 2);
        assert_eq!(*disposed.lock().unwrap(), vec![3]);
    }

    #[test]
    fn give_back_none_does_nothing() {
        let (pool, disposed) = counting_pool(1);

        pool.give_back_opt(None);

        assert!(pool.is_empty());
        assert!(disposed.lock().unwrap().is_empty());
    }

    #[test]
    fn give_back_some_stores() {
        let (pool, _) = counting_pool(1);

        pool.give_back_opt(Some(Box::new(99)));

        assert_eq!(*pool.rent().unwrap(), 99);
    }

    #[test]
    fn rent_after_dispose_fails() {
        let (pool, _) = counting_pool(1);

        pool.dispose();

        assert!(pool.is_disposed());
        assert!(matches!(pool.rent(), Err(Error::Disposed)));
        assert!(matches!(pool.acquire(), Err(Error::Disposed)));
    }

    #[test]
    fn dispose_drains_idle_instances_once() {
        let (pool, disposed) = counting_pool(3);

        let a = pool.rent().unwrap();
        let b = pool.rent().unwrap();
        pool.give_back(a);
        pool.give_back(b);

        pool.dispose();
        pool.dispose();

        let mut disposed = disposed.lock().unwrap().clone();
        disposed.sort_unstable();
        assert_eq!(disposed, vec![1, 2]);
        assert!(pool.is_empty());
    }

    #[test]
    fn return_after_dispose_cleans_then_disposes() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let clean_events = Arc::clone(&events);
        let dispose_events = Arc::clone(&events);

        let pool = LanePool::builder()
            .capacity(2)
            .factory(|| 5_u32)
            .clean(move |value: &mut u32| clean_events.lock().unwrap().push(("clean", *value)))
            .dispose(move |value| dispose_events.lock().unwrap().push(("dispose", value)))
            .build()
            .unwrap();

        let value = pool.rent().unwrap();
        pool.dispose();
        pool.give_back(value);

        assert_eq!(
            *events.lock().unwrap(),
            vec![("clean", 5), ("dispose", 5)]
        );
        assert!(pool.is_empty());
    }

    #[test]
    fn dropping_last_handle_disposes() {
        let (pool, disposed) = counting_pool(2);
        let other_handle = pool.clone();

        let value = pool.rent().unwrap();
        pool.give_back(value);

        drop(pool);
        assert!(disposed.lock().unwrap().is_empty());

        drop(other_handle);
        assert_eq!(*disposed.lock().unwrap(), vec![1]);
    }

    /// Builds a pool over 1, 2, 3, ... whose hooks panic on the given values.
    fn pool_panicking_on(
        capacity: usize,
        clean_panics_on: Option<u32>,
        dispose_panics_on: Option<u32>,
    ) -> (LanePool<u32>, Arc<Mutex<Vec<u32>>>) {
        let next = AtomicU32::new(1);
        let disposed = Arc::new(Mutex::new(Vec::new()));
        let disposed_clone = Arc::clone(&disposed);

        let pool = LanePool::builder()
            .capacity(capacity)
            .factory(move || next.fetch_add(1, Ordering::Relaxed))
            .clean(move |value: &mut u32| {
                assert_ne!(Some(*value), clean_panics_on, "intentional clean failure");
            })
            .dispose(move |value| {
                disposed_clone.lock().unwrap().push(value);
                assert_ne!(Some(value), dispose_panics_on, "intentional dispose failure");
            })
            .build()
            .unwrap();

        (pool, disposed)
    }

    #[test]
    fn drop_disposes_instances_left_by_panicking_dispose() {
        let (pool, disposed) = pool_panicking_on(3, None, Some(2));

        let first = pool.rent().unwrap();
        let second = pool.rent().unwrap();
        let third = pool.rent().unwrap();

        // 1 lands in the fast lane, 2 and 3 in the slot array, which is drained first.
        pool.give_back(first);
        pool.give_back(second);
        pool.give_back(third);

        let result = panic::catch_unwind(AssertUnwindSafe(|| pool.dispose()));
        assert!(result.is_err());
        assert_eq!(*disposed.lock().unwrap(), vec![2]);

        drop(pool);

        let mut disposed = disposed.lock().unwrap().clone();
        disposed.sort_unstable();
        assert_eq!(disposed, vec![1, 2, 3]);
    }

    #[test]
    fn panicking_clean_drops_instance_and_pool_stays_usable() {
        let (pool, disposed) = pool_panicking_on(2, Some(1), None);

        let first = pool.rent().unwrap();
        let result = panic::catch_unwind(AssertUnwindSafe(|| pool.give_back(first)));

        assert!(result.is_err());
        assert!(pool.is_empty());
        assert!(disposed.lock().unwrap().is_empty());

        let second = pool.rent().unwrap();
        assert_eq!(*second, 2);
        pool.give_back(second);

        assert_eq!(pool.len(), 1);
        assert_eq!(*pool.rent().unwrap(), 2);
    }

    #[test]
    fn panicking_dispose_on_overflow_keeps_retained_instance() {
        let (pool, disposed) = pool_panicking_on(1, None, Some(2));

        let first = pool.rent().unwrap();
        let second = pool.rent().unwrap();
        pool.give_back(first);

        let result = panic::catch_unwind(AssertUnwindSafe(|| pool.give_back(second)));

        assert!(result.is_err());
        assert_eq!(*disposed.lock().unwrap(), vec![2]);
        assert_eq!(pool.len(), 1);
        assert_eq!(*pool.rent().unwrap(), 1);

        drop(pool);
        assert_eq!(*disposed.lock().unwrap(), vec![2]);
    }

    #[test]
    fn clones_share_storage() {
        let (pool, _) = counting_pool(2);
        let other_handle = pool.clone();

        let value = pool.rent().unwrap();
        other_handle.give_back(value);

        assert_eq!(pool.len(), 1);

        other_handle.dispose();
        assert!(pool.is_disposed());
    }

    #[test]
    fn borrow_returns_instance() {
        let pool = LanePool::<Vec<u8>>::with_default(1).unwrap();

        pool.borrow(|buffer| buffer.push(1)).unwrap();

        assert_eq!(pool.len(), 1);
        assert_eq!(*pool.rent().unwrap(), vec![1]);
    }

    #[test]
    fn borrow_with_result_propagates_value() {
        let (pool, _) = counting_pool(1);

        let doubled = pool.borrow_with_result(|value| *value * 2).unwrap();

        assert_eq!(doubled, 2);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn borrow_after_dispose_does_not_run_action() {
        let (pool, _) = counting_pool(1);
        pool.dispose();

        let result = pool.borrow(|_| panic!("action must not run"));

        assert!(matches!(result, Err(Error::Disposed)));
    }

    #[test]
    fn debug_reports_state() {
        let (pool, _) = counting_pool(2);

        let text = format!("{pool:?}");

        assert!(text.contains("capacity: 2"));
        assert!(text.contains("disposed: false"));
    }

    #[test]
    fn max_capacity_fits_a_slot_array() {
        assert!(MAX_CAPACITY >= 1);
        assert!(MAX_CAPACITY.checked_mul(size_of::<usize>()).is_some());
    }
}
