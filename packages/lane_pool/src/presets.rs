//! Ready-made pools for the most common kinds of reusable scratch objects.

use crate::{LanePool, Result};

/// Creates a pool of [`String`] builders that are cleared when returned.
///
/// Returned strings keep their allocated capacity, so repeatedly formatting text of similar
/// size stops allocating once the pool is warm.
///
/// # Errors
///
/// Returns [`Error::InvalidCapacity`][crate::Error::InvalidCapacity] if `capacity` is zero or
/// above [`MAX_CAPACITY`][crate::MAX_CAPACITY].
///
/// # Example
///
/// ```rust
/// use std::fmt::Write;
///
/// use lane_pool::presets::string_pool;
///
/// let pool = string_pool(4).unwrap();
///
/// let message = pool
///     .borrow_with_result(|text| {
///         write!(text, "{} + {} = {}", 1, 2, 1 + 2).unwrap();
///         text.clone()
///     })
///     .unwrap();
///
/// assert_eq!(message, "1 + 2 = 3");
/// ```
pub fn string_pool(capacity: usize) -> Result<LanePool<String>> {
    LanePool::builder()
        .capacity(capacity)
        .default_factory()
        .clean(String::clear)
        .build()
}

/// Creates a pool of byte buffers that are cleared when returned.
///
/// A returned buffer whose allocation grew beyond `max_retained_bytes` is shrunk back down so
/// that one unusually large payload does not keep a large allocation alive inside the pool.
///
/// # Errors
///
/// Returns [`Error::InvalidCapacity`][crate::Error::InvalidCapacity] if `capacity` is zero or
/// above [`MAX_CAPACITY`][crate::MAX_CAPACITY].
///
/// # Example
///
/// ```rust
/// use lane_pool::presets::buffer_pool;
///
/// let pool = buffer_pool(4, 4096).unwrap();
///
/// let mut buffer = pool.rent().unwrap();
/// buffer.resize(1024 * 1024, 0);
/// pool.give_back(buffer);
///
/// let buffer = pool.rent().unwrap();
/// assert!(buffer.is_empty());
/// assert!(buffer.capacity() <= 4096);
/// ```
pub fn buffer_pool(capacity: usize, max_retained_bytes: usize) -> Result<LanePool<Vec<u8>>> {
    LanePool::builder()
        .capacity(capacity)
        .default_factory()
        .clean(move |buffer: &mut Vec<u8>| {
            buffer.clear();
            buffer.shrink_to(max_retained_bytes);
        })
        .build()
}
