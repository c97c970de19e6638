use std::iter;

use crate::Slot;

/// The storage behind a pool: one fast-lane slot plus an array of overflow slots.
///
/// The fast lane serves the common case of one rent followed by one return with a single CAS.
/// The overflow slots absorb whatever the fast lane cannot, scanned linearly from index 0.
/// Neither path retries a slot that lost a race; the caller falls back to the factory (on rent)
/// or to disposal (on return) instead.
pub(crate) struct Lanes<T> {
    fast_lane: Slot<T>,
    overflow: Box<[Slot<T>]>,
}

impl<T> Lanes<T> {
    /// Creates storage for `capacity` instances in total.
    ///
    /// `capacity` must be at least 1, which the pool validates before we get here.
    pub(crate) fn new(capacity: usize) -> Self {
        debug_assert!(capacity >= 1);

        Self {
            fast_lane: Slot::new(),
            overflow: (1..capacity).map(|_| Slot::new()).collect(),
        }
    }

    /// Total number of instances this storage can hold.
    pub(crate) fn capacity(&self) -> usize {
        // Cannot overflow: the overflow array was sized as `capacity - 1`.
        self.overflow.len().wrapping_add(1)
    }

    #[inline]
    pub(crate) fn claim_fast(&self) -> Option<Box<T>> {
        self.fast_lane.try_claim()
    }

    #[inline]
    pub(crate) fn store_fast(&self, value: Box<T>) -> Result<(), Box<T>> {
        self.fast_lane.try_store(value)
    }

    /// Scans the overflow slots and takes the first instance we manage to claim.
    pub(crate) fn claim_overflow(&self) -> Option<Box<T>> {
        self.overflow.iter().find_map(Slot::try_claim)
    }

    /// Scans the overflow slots and stores the instance into the first one that accepts it.
    ///
    /// If every slot is occupied (or lost its race), the instance is handed back.
    pub(crate) fn store_overflow(&self, mut value: Box<T>) -> Result<(), Box<T>> {
        for slot in &self.overflow {
            match slot.try_store(value) {
                Ok(()) => return Ok(()),
                Err(rejected) => value = rejected,
            }
        }

        Err(value)
    }

    /// Claims every instance still held, overflow slots first and the fast lane last,
    /// passing each to `f`. Returns how many instances were claimed.
    ///
    /// Concurrent callers may drain at the same time; each instance is claimed by exactly one.
    pub(crate) fn drain(&self, mut f: impl FnMut(Box<T>)) -> usize {
        let mut drained: usize = 0;

        for value in self
            .overflow
            .iter()
            .chain(iter::once(&self.fast_lane))
            .filter_map(Slot::try_claim)
        {
            f(value);
            drained = drained.wrapping_add(1);
        }

        drained
    }

    /// Number of occupied slots, observed one slot at a time without synchronization.
    ///
    /// Under concurrent rent/return this is only an approximation.
    pub(crate) fn occupied(&self) -> usize {
        usize::from(self.fast_lane.is_occupied())
            .wrapping_add(self.overflow.iter().filter(|slot| slot.is_occupied()).count())
    }
}
