#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing, benchmarks and examples of the `lane_pool` package.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

const ERR_POISONED_LOCK: &str = "poisoned lock - a test thread panicked while holding it";

/// Runs a test with a timeout to prevent infinite hangs.
///
/// The timeout is 10 seconds under normal conditions and 60 seconds under
/// Miri, where thread synchronization primitives are significantly slower.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the watchdog
/// is disabled and the test function is executed directly. This allows mutation
/// testing to properly detect hanging mutations.
///
/// # Panics
///
/// Panics if the test exceeds the timeout (when not in mutation testing mode) and
/// resumes the panic of the test itself if it panicked.
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    let test_handle = thread::spawn(move || {
        // If sending fails, the receiver has already timed out.
        drop(tx.send(test_fn()));
    });

    let timeout = if cfg!(miri) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(10)
    };

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_handle.join().expect("test thread should not panic");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test exceeded {timeout:?} timeout");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_handle.join() {
            Ok(()) => panic!("test thread disconnected unexpectedly"),
            Err(e) => std::panic::resume_unwind(e),
        },
    }
}

/// A pooled test object carrying a unique tag and a log of what was done to it.
#[derive(Debug)]
pub struct Tagged {
    /// Unique per instance created by a [`TagFactory`].
    pub tag: u64,

    /// Free-form marks appended by hooks and test code.
    pub marks: Vec<&'static str>,
}

/// Creates [`Tagged`] instances with tags 1, 2, 3 and so on, from any thread.
#[derive(Debug, Default)]
pub struct TagFactory {
    next: AtomicU64,
}

impl TagFactory {
    /// Creates a factory whose first instance has tag 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the next instance.
    pub fn create(&self) -> Tagged {
        let tag = self.next.fetch_add(1, Ordering::Relaxed).wrapping_add(1);

        Tagged {
            tag,
            marks: Vec::new(),
        }
    }

    /// How many instances have been created so far.
    #[must_use]
    pub fn created(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

/// Records the tags of disposed instances so tests can check for loss and double disposal.
#[derive(Clone, Debug, Default)]
pub struct DisposalLedger {
    tags: Arc<Mutex<Vec<u64>>>,
}

impl DisposalLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that the instance with this tag was disposed of.
    ///
    /// # Panics
    ///
    /// Panics if the lock was poisoned by a panicking test thread.
    pub fn record(&self, tag: u64) {
        self.tags.lock().expect(ERR_POISONED_LOCK).push(tag);
    }

    /// The recorded tags in ascending order, duplicates included.
    ///
    /// # Panics
    ///
    /// Panics if the lock was poisoned by a panicking test thread.
    #[must_use]
    pub fn sorted_tags(&self) -> Vec<u64> {
        let mut tags = self.tags.lock().expect(ERR_POISONED_LOCK).clone();
        tags.sort_unstable();
        tags
    }

    /// Number of disposals recorded, duplicates included.
    ///
    /// # Panics
    ///
    /// Panics if the lock was poisoned by a panicking test thread.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.lock().expect(ERR_POISONED_LOCK).len()
    }

    /// Whether nothing has been disposed of yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Asserts that no tag was disposed of more than once.
    ///
    /// # Panics
    ///
    /// Panics if some tag was recorded twice.
    pub fn assert_no_duplicates(&self) {
        let tags = self.sorted_tags();

        for pair in tags.windows(2) {
            assert_ne!(pair.first(), pair.get(1), "instance disposed of twice");
        }
    }
}

/// Tracks which tags are currently held by renters, failing loudly if one is held twice.
#[derive(Debug, Default)]
pub struct HeldTags {
    held: Mutex<HashSet<u64>>,
}

impl HeldTags {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a tag as held.
    ///
    /// # Panics
    ///
    /// Panics if the tag is already held by someone else.
    pub fn hold(&self, tag: u64) {
        let newly_held = self.held.lock().expect(ERR_POISONED_LOCK).insert(tag);
        assert!(newly_held, "instance {tag} handed to two renters at once");
    }

    /// Marks a tag as no longer held.
    ///
    /// # Panics
    ///
    /// Panics if the tag was not held.
    pub fn release(&self, tag: u64) {
        let was_held = self.held.lock().expect(ERR_POISONED_LOCK).remove(&tag);
        assert!(was_held, "instance {tag} released without being held");
    }
}
