use thiserror::Error;

/// Errors that can occur when constructing or renting from a [`LanePool`][crate::LanePool].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The requested capacity is zero or larger than [`MAX_CAPACITY`][crate::MAX_CAPACITY].
    #[error("invalid pool capacity {capacity}: must be between 1 and {max} inclusive")]
    InvalidCapacity {
        /// The capacity that was requested.
        capacity: usize,

        /// The largest capacity a pool may have on this platform.
        max: usize,
    },

    /// The pool was built without a factory to create new instances with.
    #[error("pool requires a factory to create new instances but none was provided")]
    MissingFactory,

    /// An instance was requested from a pool that has already been disposed.
    #[error("cannot rent from a pool that has been disposed")]
    Disposed,
}

/// A specialized `Result` type for pool operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
