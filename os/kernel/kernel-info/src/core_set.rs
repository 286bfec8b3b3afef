//! # Core Sets
//!
//! A [`CoreSet`] is a fixed-size bitmap with one bit per core, a cached
//! population count and an *explicit* flag. Domain declarations must mark
//! their set explicit; an implicitly empty set is never mistaken for a
//! deliberate choice.

use crate::ids::CoreId;
use crate::limits::{CORE_SET_WORDS, MAX_CORES};

/// Bitmap of cores.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct CoreSet {
    words: [u64; CORE_SET_WORDS],
    count: u16,
    explicit: bool,
}

/// Error returned when a core id does not fit into a [`CoreSet`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreSetError {
    #[error("{0} exceeds the core set capacity of {max}", max = MAX_CORES)]
    OutOfRange(CoreId),
}

impl CoreSet {
    /// An empty set that has not been declared.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            words: [0; CORE_SET_WORDS],
            count: 0,
            explicit: false,
        }
    }

    /// Build an explicitly declared set from the given cores.
    ///
    /// # Errors
    /// Returns [`CoreSetError::OutOfRange`] for the first core beyond [`MAX_CORES`].
    pub fn declared<I>(cores: I) -> Result<Self, CoreSetError>
    where
        I: IntoIterator<Item = CoreId>,
    {
        let mut set = Self::new();
        for core in cores {
            set.insert(core)?;
        }
        set.explicit = true;
        Ok(set)
    }

    /// All cores `0..count`, explicit. `count` is clamped to [`MAX_CORES`].
    #[must_use]
    pub fn first_n(count: usize) -> Self {
        let count = count.min(MAX_CORES);
        let mut set = Self::new();
        for (i, word) in set.words.iter_mut().enumerate() {
            let lo = i * 64;
            if count >= lo + 64 {
                *word = u64::MAX;
            } else if count > lo {
                *word = (1u64 << (count - lo)) - 1;
            }
        }
        #[allow(clippy::cast_possible_truncation)]
        {
            set.count = count as u16;
        }
        set.explicit = true;
        set
    }

    /// Add a core. Returns whether it was newly inserted.
    ///
    /// # Errors
    /// Returns [`CoreSetError::OutOfRange`] if `core` is beyond [`MAX_CORES`].
    pub fn insert(&mut self, core: CoreId) -> Result<bool, CoreSetError> {
        let (word, bit) = Self::slot(core).ok_or(CoreSetError::OutOfRange(core))?;
        let mask = 1u64 << bit;
        if self.words[word] & mask != 0 {
            return Ok(false);
        }
        self.words[word] |= mask;
        self.count += 1;
        Ok(true)
    }

    /// Remove a core. Returns whether it was present.
    pub fn remove(&mut self, core: CoreId) -> bool {
        let Some((word, bit)) = Self::slot(core) else {
            return false;
        };
        let mask = 1u64 << bit;
        if self.words[word] & mask == 0 {
            return false;
        }
        self.words[word] &= !mask;
        self.count -= 1;
        true
    }

    #[inline]
    #[must_use]
    pub const fn is_explicit(&self) -> bool {
        self.explicit
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, core: CoreId) -> bool {
        let index = core.index();
        if index >= MAX_CORES {
            return false;
        }
        self.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count as usize
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether any core is in both sets.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// Add every core of `other` to this set.
    pub fn union_with(&mut self, other: &Self) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a |= *b;
        }
        self.recount();
    }

    /// Lowest core in the set.
    #[must_use]
    pub fn first(&self) -> Option<CoreId> {
        self.iter().next()
    }

    /// Cores in ascending order.
    #[must_use]
    pub const fn iter(&self) -> CoreSetIter {
        CoreSetIter {
            words: self.words,
            word: 0,
        }
    }

    fn recount(&mut self) {
        let ones: u32 = self.words.iter().map(|w| w.count_ones()).sum();
        #[allow(clippy::cast_possible_truncation)]
        {
            self.count = ones as u16;
        }
    }

    const fn slot(core: CoreId) -> Option<(usize, usize)> {
        let index = core.index();
        if index >= MAX_CORES {
            None
        } else {
            Some((index / 64, index % 64))
        }
    }
}

impl IntoIterator for &CoreSet {
    type Item = CoreId;
    type IntoIter = CoreSetIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Ascending iterator over the cores of a [`CoreSet`].
#[derive(Clone, Debug)]
pub struct CoreSetIter {
    words: [u64; CORE_SET_WORDS],
    word: usize,
}

impl Iterator for CoreSetIter {
    type Item = CoreId;

    fn next(&mut self) -> Option<CoreId> {
        while self.word < CORE_SET_WORDS {
            let bits = self.words[self.word];
            if bits != 0 {
                let bit = bits.trailing_zeros() as usize;
                self.words[self.word] &= bits - 1;
                return CoreId::from_index(self.word * 64 + bit);
            }
            self.word += 1;
        }
        None
    }
}
