use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// A storage cell that holds at most one boxed instance.
///
/// The cell is a single atomic pointer, null when empty. Every transition is one
/// compare-and-swap attempt; losing a race is reported to the caller, who is expected
/// to move on to a different slot rather than retry this one.
///
/// All accesses use `SeqCst`. Disposal of the pool is a store to a separate flag followed by
/// loads of every slot, while a return is a store to a slot followed by a load of the flag.
/// Only sequential consistency guarantees that at least one side observes the other.
pub(crate) struct Slot<T> {
    item: AtomicPtr<T>,

    // We own the boxed `T` behind the pointer, which also makes us `Send` only if `T` is.
    _owns: PhantomData<Box<T>>,
}

// SAFETY: The slot only ever moves a `T` between threads (one holder at a time, enforced by
// the CAS transitions), it never shares references to the `T`. Therefore `T: Send` is enough.
unsafe impl<T: Send> Sync for Slot<T> {}

impl<T> Slot<T> {
    pub(crate) const fn new() -> Self {
        Self {
            item: AtomicPtr::new(ptr::null_mut()),
            _owns: PhantomData,
        }
    }

    /// Takes the instance out of the slot if it holds one and no other thread got to it first.
    #[inline]
    pub(crate) fn try_claim(&self) -> Option<Box<T>> {
        let observed = self.item.load(Ordering::SeqCst);

        if observed.is_null() {
            return None;
        }

        self.item
            .compare_exchange(observed, ptr::null_mut(), Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|claimed| {
                // SAFETY: Every non-null pointer in the slot came from `Box::into_raw` in
                // `try_store` and our successful CAS removed it from the slot, so we are now
                // the only holder of that allocation.
                unsafe { Box::from_raw(claimed) }
            })
    }

    /// Places the instance into the slot if the slot is empty.
    ///
    /// On failure the instance is handed back so the caller can try elsewhere.
    #[inline]
    pub(crate) fn try_store(&self, value: Box<T>) -> Result<(), Box<T>> {
        if !self.item.load(Ordering::SeqCst).is_null() {
            return Err(value);
        }

        let raw = Box::into_raw(value);

        match self
            .item
            .compare_exchange(ptr::null_mut(), raw, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => Ok(()),
            Err(_) => {
                // SAFETY: The CAS failed so the pointer never became visible to anyone else.
                // It is still the unique pointer we got from `Box::into_raw` above.
                Err(unsafe { Box::from_raw(raw) })
            }
        }
    }

    /// Whether the slot held an instance at the moment of the check.
    ///
    /// The answer may be stale by the time the caller looks at it.
    #[inline]
    pub(crate) fn is_occupied(&self) -> bool {
        !self.item.load(Ordering::Relaxed).is_null()
    }
}

impl<T> Drop for Slot<T> {
    fn drop(&mut self) {
        let remaining = *self.item.get_mut();

        if !remaining.is_null() {
            // SAFETY: We have exclusive access and the pointer came from `Box::into_raw`.
            drop(unsafe { Box::from_raw(remaining) });
        }
    }
}
