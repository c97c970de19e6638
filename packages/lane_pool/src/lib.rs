#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A bounded, lock-free pool of reusable heap-allocated objects.
//!
//! This crate provides [`LanePool`], a fixed-capacity cache of instances that are expensive to
//! create (string builders, scratch buffers and the like). Threads rent instances from the pool
//! and give them back when done, so the same few allocations get reused instead of being created
//! and dropped over and over.
//!
//! # Key features
//!
//! - **Lock-free**: every storage slot is a single atomic pointer, claimed and filled with one
//!   compare-and-swap. No operation ever waits for another thread.
//! - **Fast lane**: one dedicated slot serves the common rent-then-return cycle with a single
//!   atomic operation. The remaining slots are only scanned when the fast lane is busy.
//! - **Never fails to rent**: if no idle instance is available, the factory creates a new one.
//! - **Bounded**: at most `capacity` idle instances are retained. Surplus returns are passed to
//!   the dispose hook (if any) and dropped.
//! - **Hooks**: an optional clean hook resets instances before reuse and an optional dispose hook
//!   sees every instance the pool permanently discards.
//! - **Scoped leases**: [`Lease`] returns its instance exactly once when dropped, on every exit
//!   path including unwinding. [`LanePool::borrow()`] and [`LanePool::borrow_with_result()`] wrap
//!   the rent-use-return pattern in one call.
//!
//! # Example
//!
//! ```rust
//! use lane_pool::LanePool;
//!
//! let pool = LanePool::builder()
//!     .capacity(8)
//!     .factory(|| String::with_capacity(256))
//!     .clean(String::clear)
//!     .build()
//!     .unwrap();
//!
//! {
//!     let mut text = pool.acquire().unwrap();
//!     text.push_str("hello, world");
//!     assert_eq!(text.as_str(), "hello, world");
//! } // The string goes back into the pool here.
//!
//! let text = pool.rent().unwrap();
//! assert!(text.is_empty());
//! assert!(text.capacity() >= 256);
//! pool.give_back(text);
//! ```
//!
//! # Disposal
//!
//! [`LanePool::dispose()`] (or dropping the last pool handle) moves the pool into its final,
//! disposed state. Idle instances are drained through the dispose hook, renting fails with
//! [`Error::Disposed`] and instances returned afterwards are cleaned and disposed of instead of
//! being stored.
//!
//! # Ordering
//!
//! The pool is neither FIFO nor LIFO. Which idle instance a renter receives is unspecified.

mod builder;
mod error;
mod lanes;
mod lease;
mod pool;
pub mod presets;
mod slot;

pub use builder::*;
pub use error::*;
pub(crate) use lanes::*;
pub use lease::*;
pub use pool::*;
pub(crate) use pool::{CleanHook, DisposeHook, Factory, Hooks};
pub(crate) use slot::*;
