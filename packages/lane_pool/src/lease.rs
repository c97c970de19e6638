use std::any::type_name;
use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::LanePool;

const ERR_RELEASED: &str = "lease was already released and no longer holds an instance";

/// An instance rented from a [`LanePool`] that is returned to the pool when the lease is dropped.
///
/// The instance is accessed through [`Deref`] and [`DerefMut`]. Returning happens at most once:
/// [`release()`][Self::release] can be called early and any later release (including the one
/// performed on drop) does nothing. This makes the return happen exactly once on every exit
/// path, including early returns and unwinding.
///
/// # Example
///
/// ```rust
/// use lane_pool::LanePool;
///
/// let pool = LanePool::<Vec<u32>>::with_default(1).unwrap();
///
/// let mut numbers = pool.acquire().unwrap();
/// numbers.push(42);
/// assert_eq!(numbers.len(), 1);
///
/// numbers.release();
/// numbers.release(); // No effect.
///
/// assert_eq!(pool.len(), 1);
/// ```
pub struct Lease<'a, T> {
    pool: &'a LanePool<T>,

    // `None` once the instance has been released or detached.
    item: Option<Box<T>>,
}

impl<'a, T> Lease<'a, T> {
    pub(crate) fn new(pool: &'a LanePool<T>, item: Box<T>) -> Self {
        Self {
            pool,
            item: Some(item),
        }
    }

    /// Returns the instance to the pool.
    ///
    /// Only the first call has any effect. After release, the lease no longer gives access to
    /// the instance.
    pub fn release(&mut self) {
        self.pool.give_back_opt(self.item.take());
    }

    /// Whether the instance has already been returned to the pool (or detached).
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.item.is_none()
    }

    /// Detaches the instance from the pool, taking permanent ownership of it.
    ///
    /// The instance is never returned to the pool, so neither the clean nor the dispose hook
    /// runs for it. Returns `None` if the lease was already released.
    #[must_use]
    pub fn into_inner(mut self) -> Option<Box<T>> {
        self.item.take()
    }
}

impl<T> Deref for Lease<'_, T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the lease has already been released.
    fn deref(&self) -> &T {
        self.item.as_deref().expect(ERR_RELEASED)
    }
}

impl<T> DerefMut for Lease<'_, T> {
    /// # Panics
    ///
    /// Panics if the lease has already been released.
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_deref_mut().expect(ERR_RELEASED)
    }
}

impl<T> Drop for Lease<'_, T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> fmt::Debug for Lease<'_, T>
where
    T: fmt::Debug,
{
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("item", &self.item)
            .field("pool", self.pool)
            .finish()
    }
}
