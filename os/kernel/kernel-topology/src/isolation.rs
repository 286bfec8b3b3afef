//! Pairwise cache isolation.

use core::fmt;
use kernel_info::CacheDomainId;
use kernel_info::limits::MAX_CORES;

/// Deepest cache level up to which two cores are private.
///
/// `None` means the cores share their L1. `Full` means they share no cache
/// at all. A core is `Full`-isolated from itself by convention.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u8)]
pub enum CacheIsolation {
    None = 0,
    L1 = 1,
    L2 = 2,
    L3 = 3,
    Full = 4,
}

impl CacheIsolation {
    /// Decode a stored level. Anything unknown reads as `None`, the least
    /// isolated level.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Self::L1,
            2 => Self::L2,
            3 => Self::L3,
            4 => Self::Full,
            _ => Self::None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::L3 => "L3",
            Self::Full => "FULL",
        }
    }
}

impl fmt::Display for CacheIsolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cache level, for "who shares my Lx" queries.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum CacheLevel {
    L1,
    L2,
    L3,
    /// Memory-side cache.
    L4,
}

impl CacheLevel {
    /// Two cores share this level iff their isolation is below the bound.
    /// `None` for the memory-side cache, which has no isolation level of
    /// its own; compare the [`CacheDomains`] instead.
    #[must_use]
    pub const fn sharing_bound(self) -> Option<CacheIsolation> {
        match self {
            Self::L1 => Some(CacheIsolation::L1),
            Self::L2 => Some(CacheIsolation::L2),
            Self::L3 => Some(CacheIsolation::L3),
            Self::L4 => None,
        }
    }
}

/// Cache-domain ids of one core, one per level. Cores with equal ids at a
/// level share that cache instance.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CacheDomains {
    pub l1: CacheDomainId,
    pub l2: CacheDomainId,
    pub l3: CacheDomainId,
    /// Memory-side cache, if the platform has one.
    pub l4: Option<CacheDomainId>,
}

impl CacheDomains {
    #[must_use]
    pub const fn new(l1: u32, l2: u32, l3: u32) -> Self {
        Self {
            l1: CacheDomainId::new(l1),
            l2: CacheDomainId::new(l2),
            l3: CacheDomainId::new(l3),
            l4: None,
        }
    }

    #[must_use]
    pub const fn with_l4(mut self, l4: u32) -> Self {
        self.l4 = Some(CacheDomainId::new(l4));
        self
    }

    /// Both cores report the same memory-side cache.
    #[must_use]
    pub fn shares_l4(&self, other: &Self) -> bool {
        self.l4.is_some() && self.l4 == other.l4
    }

    /// Scan from L1 outward and stop at the first shared level.
    #[must_use]
    pub fn isolation_from(&self, other: &Self) -> CacheIsolation {
        if self.l1 == other.l1 {
            CacheIsolation::None
        } else if self.l2 == other.l2 {
            CacheIsolation::L1
        } else if self.l3 == other.l3 {
            CacheIsolation::L2
        } else if self.shares_l4(other) {
            CacheIsolation::L3
        } else {
            CacheIsolation::Full
        }
    }
}

/// Core pairs `a < b` of a `MAX_CORES` machine.
const PAIRS: usize = MAX_CORES * (MAX_CORES - 1) / 2;

/// Symmetric `MAX_CORES × MAX_CORES` lookup table.
///
/// Only the upper triangle is stored, one nibble per pair; the diagonal is
/// `Full` and needs no storage.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IsolationMatrix {
    nibbles: [u8; PAIRS.div_ceil(2)],
}

impl IsolationMatrix {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nibbles: [0; PAIRS.div_ceil(2)],
        }
    }

    /// Reset every pair to `None`.
    pub fn clear(&mut self) {
        self.nibbles.fill(0);
    }

    /// Fill the first `count` rows and columns. `count ≤ MAX_CORES`.
    pub fn build(&mut self, count: usize, caches: impl Fn(usize) -> CacheDomains) {
        let count = count.min(MAX_CORES);
        for a in 0..count {
            let ca = caches(a);
            for b in (a + 1)..count {
                self.set(a, b, ca.isolation_from(&caches(b)));
            }
        }
    }

    /// Caller guarantees both indices are below `MAX_CORES`.
    #[inline]
    #[must_use]
    pub const fn get(&self, a: usize, b: usize) -> CacheIsolation {
        if a == b {
            return CacheIsolation::Full;
        }
        let pair = Self::pair(a, b);
        let byte = self.nibbles[pair / 2];
        let bits = if pair.is_multiple_of(2) { byte & 0x0F } else { byte >> 4 };
        CacheIsolation::from_bits(bits)
    }

    fn set(&mut self, a: usize, b: usize, level: CacheIsolation) {
        let pair = Self::pair(a, b);
        let byte = &mut self.nibbles[pair / 2];
        let bits = level as u8;
        *byte = if pair.is_multiple_of(2) {
            (*byte & 0xF0) | bits
        } else {
            (*byte & 0x0F) | (bits << 4)
        };
    }

    /// Row-major position of the unordered pair in the upper triangle.
    const fn pair(a: usize, b: usize) -> usize {
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        lo * (2 * MAX_CORES - lo - 1) / 2 + (hi - lo - 1)
    }
}

impl Default for IsolationMatrix {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolation_is_the_deepest_private_level() {
        let a = CacheDomains::new(0, 0, 0);
        assert_eq!(a.isolation_from(&CacheDomains::new(0, 0, 0)), CacheIsolation::None);
        assert_eq!(a.isolation_from(&CacheDomains::new(1, 0, 0)), CacheIsolation::L1);
        assert_eq!(a.isolation_from(&CacheDomains::new(1, 1, 0)), CacheIsolation::L2);
        assert_eq!(a.isolation_from(&CacheDomains::new(1, 1, 1)), CacheIsolation::Full);
    }

    #[test]
    fn shared_memory_side_cache_caps_at_l3() {
        let a = CacheDomains::new(0, 0, 0).with_l4(7);
        let b = CacheDomains::new(1, 1, 1).with_l4(7);
        let c = CacheDomains::new(2, 2, 2).with_l4(8);
        assert_eq!(a.isolation_from(&b), CacheIsolation::L3);
        assert_eq!(a.isolation_from(&c), CacheIsolation::Full);
        assert_eq!(
            CacheDomains::new(3, 3, 3).isolation_from(&CacheDomains::new(4, 4, 4)),
            CacheIsolation::Full
        );
    }

    #[test]
    fn sharing_bounds_follow_levels() {
        assert_eq!(CacheLevel::L1.sharing_bound(), Some(CacheIsolation::L1));
        assert_eq!(CacheLevel::L3.sharing_bound(), Some(CacheIsolation::L3));
        assert_eq!(CacheLevel::L4.sharing_bound(), None);
    }

    #[test]
    fn missing_memory_side_cache_is_never_shared() {
        let a = CacheDomains::new(0, 0, 0);
        assert!(!a.shares_l4(&CacheDomains::new(0, 0, 0)));
        assert!(a.with_l4(1).shares_l4(&CacheDomains::new(2, 2, 2).with_l4(1)));
    }

    #[test]
    fn packed_matrix_is_symmetric_at_the_far_corner() {
        let last = MAX_CORES - 1;
        let mut matrix = IsolationMatrix::new();
        matrix.build(MAX_CORES, |i| {
            #[allow(clippy::cast_possible_truncation)]
            let id = i as u32;
            if i + 1 >= last {
                CacheDomains::new(id, 500, 0)
            } else {
                CacheDomains::new(id, id, id)
            }
        });
        assert_eq!(matrix.get(last - 1, last), CacheIsolation::L1);
        assert_eq!(matrix.get(last, last - 1), CacheIsolation::L1);
        assert_eq!(matrix.get(0, last), CacheIsolation::L2);
        assert_eq!(matrix.get(1, last), CacheIsolation::Full);
        assert_eq!(matrix.get(0, 1), CacheIsolation::Full);
        assert_eq!(matrix.get(last, last), CacheIsolation::Full);
        assert!(size_of::<IsolationMatrix>() <= 16 * 1024);
    }
}
