use core::{
    cell::UnsafeCell,
    fmt,
    mem::MaybeUninit,
    sync::atomic::{AtomicBool, AtomicU8, Ordering},
};

/// 0 = EMPTY, 1 = WRITING, 2 = PUBLISHED
const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const PUBLISHED: u8 = 2;

/// Write-once slot for sealed boot state.
///
/// The first [`publish`](Self::publish) wins; every later one gets its value
/// handed back. Readers see the value only once it is completely written.
/// The value is never dropped.
pub struct SealedCell<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Default for SealedCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SealedCell<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Returns `Some(&T)` once published.
    #[inline]
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        if self.state.load(Ordering::Acquire) == PUBLISHED {
            // SAFETY: PUBLISHED guarantees the write is done
            Some(unsafe { &*(*self.value.get()).as_ptr() })
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.state.load(Ordering::Acquire) == PUBLISHED
    }

    /// Store `value` unless something was stored before.
    ///
    /// # Errors
    /// Returns `value` if the cell is already published or being written.
    pub fn publish(&self, value: T) -> Result<&T, T> {
        if self
            .state
            .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(value);
        }

        // SAFETY: WRITING is held by this call only
        unsafe {
            (*self.value.get()).write(value);
        }
        // Publish value before marking PUBLISHED
        self.state.store(PUBLISHED, Ordering::Release);
        // SAFETY: just wrote it
        Ok(unsafe { &*(*self.value.get()).as_ptr() })
    }
}

impl<T: fmt::Debug> fmt::Debug for SealedCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("SealedCell").field(value).finish(),
            None => f.write_str("SealedCell(<empty>)"),
        }
    }
}

// Safety: shared after PUBLISHED; publication is single-writer.
unsafe impl<T: Sync + Send> Sync for SealedCell<T> {}
unsafe impl<T: Send> Send for SealedCell<T> {}

/// Storage handed out mutably exactly once.
///
/// Keeps large tables in a `static` next to the sealed state that borrows
/// them.
pub struct ClaimCell<T> {
    claimed: AtomicBool,
    value: UnsafeCell<T>,
}

impl<T: Default> Default for ClaimCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> ClaimCell<T> {
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self {
            claimed: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// The storage, to the first caller only.
    #[allow(clippy::mut_from_ref)]
    pub fn claim(&self) -> Option<&mut T> {
        if self.claimed.swap(true, Ordering::AcqRel) {
            return None;
        }
        // SAFETY: the flag never resets, so this is the only reference
        Some(unsafe { &mut *self.value.get() })
    }

    #[inline]
    #[must_use]
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}

impl<T> fmt::Debug for ClaimCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimCell")
            .field("claimed", &self.is_claimed())
            .finish_non_exhaustive()
    }
}

// Safety: the single claimant may be on any thread, like a `Mutex<T>`.
unsafe impl<T: Send> Sync for ClaimCell<T> {}
