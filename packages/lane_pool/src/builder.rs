use std::any::type_name;
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::num::NonZero;
use std::thread;

use crate::{CleanHook, DisposeHook, Error, Factory, Hooks, LanePool, MAX_CAPACITY, Result};

/// Builder for creating an instance of [`LanePool`].
///
/// A factory is mandatory, whereas the capacity and the clean and dispose hooks are optional.
///
/// If no capacity is set, the pool retains up to twice as many instances as there are
/// processors available to the process.
///
/// # Examples
///
/// ```
/// use lane_pool::LanePool;
///
/// let pool = LanePool::builder()
///     .capacity(16)
///     .factory(|| String::with_capacity(128))
///     .clean(String::clear)
///     .dispose(|text| println!("discarding {} bytes", text.capacity()))
///     .build()
///     .unwrap();
///
/// assert_eq!(pool.capacity(), 16);
/// ```
///
/// # Thread safety
///
/// The builder is thread-mobile ([`Send`]) and can be safely transferred between threads,
/// allowing pool configuration to happen on different threads than where the pool is used.
/// However, it is not thread-safe ([`Sync`]) as it contains mutable configuration state.
#[must_use]
pub struct LanePoolBuilder<T> {
    capacity: Option<usize>,
    factory: Option<Factory<T>>,
    clean: Option<CleanHook<T>>,
    dispose: Option<DisposeHook<T>>,

    // Prevents Sync while allowing Send - builders are thread-mobile but not thread-safe
    _not_sync: PhantomData<Cell<()>>,
}

impl<T> LanePoolBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            capacity: None,
            factory: None,
            clean: None,
            dispose: None,
            _not_sync: PhantomData,
        }
    }

    /// Sets the maximum number of idle instances the pool retains.
    ///
    /// The value is validated when the pool is built.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Sets the function that creates a new instance whenever the pool has no idle one to hand out.
    ///
    /// The factory may be called from any thread, including concurrently.
    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.factory = Some(Box::new(factory));
        self
    }

    /// Uses [`Default::default()`] as the factory.
    pub fn default_factory(self) -> Self
    where
        T: Default + 'static,
    {
        self.factory(T::default)
    }

    /// Sets the function that resets an instance when it is returned, before it can be
    /// rented again.
    ///
    /// The clean hook runs on every returned instance, including ones that end up disposed.
    pub fn clean<F>(mut self, clean: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        self.clean = Some(Box::new(clean));
        self
    }

    /// Sets the function that receives every instance the pool permanently discards, either
    /// because the pool was full or because it was disposed.
    ///
    /// Without a dispose hook, discarded instances are simply dropped.
    pub fn dispose<F>(mut self, dispose: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.dispose = Some(Box::new(dispose));
        self
    }

    /// Builds the pool with the specified configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingFactory`] if no factory was set and [`Error::InvalidCapacity`]
    /// if the capacity is zero or above [`MAX_CAPACITY`].
    pub fn build(self) -> Result<LanePool<T>> {
        let capacity = self.capacity.unwrap_or_else(default_capacity);

        if !(1..=MAX_CAPACITY).contains(&capacity) {
            return Err(Error::InvalidCapacity {
                capacity,
                max: MAX_CAPACITY,
            });
        }

        let factory = self.factory.ok_or(Error::MissingFactory)?;

        Ok(LanePool::from_parts(
            capacity,
            Hooks {
                factory,
                clean: self.clean,
                dispose: self.dispose,
            },
        ))
    }
}

/// Pool sizes roughly proportional to the level of concurrency work best, so by default we
/// allow two idle instances per processor.
fn default_capacity() -> usize {
    thread::available_parallelism()
        .map_or(1, NonZero::get)
        .saturating_mul(2)
        .min(MAX_CAPACITY)
}

impl<T> fmt::Debug for LanePoolBuilder<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("capacity", &self.capacity)
            .field("has_factory", &self.factory.is_some())
            .field("has_clean", &self.clean.is_some())
            .field("has_dispose", &self.dispose.is_some())
            .finish()
    }
}
