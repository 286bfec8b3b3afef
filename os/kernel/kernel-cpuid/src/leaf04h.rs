use crate::{CpuidRanges, CpuidResult, CpuidSource};
use bitfield_struct::bitfield;
use kernel_facts::{CacheKind, CacheLevelInfo, CpuVendor};

pub const LEAF_04H: u32 = 0x04;

/// AMD's equivalent of leaf 04H, same register layout.
pub const LEAF_8000_001DH: u32 = 0x8000_001D;

/// Subleaves probed before giving up on finding the terminating null entry.
const MAX_SUBLEAVES: u32 = 8;

/// CPUID.04H: deterministic cache parameters, one subleaf per cache.
///
/// Also used for CPUID.8000001DH on AMD processors.
///
/// Reference: Intel SDM Vol. 2A, CPUID leaf 04H; AMD APM Vol. 3, E.4.15.
#[derive(Copy, Clone, Debug)]
pub struct Leaf04h {
    pub eax: Leaf4Eax,
    pub ebx: Leaf4Ebx,
    /// Number of sets minus one.
    pub sets_minus_one: u32,
    pub edx: Leaf4Edx,
}

impl Leaf04h {
    #[must_use]
    pub const fn from_regs(r: CpuidResult) -> Self {
        Self {
            eax: Leaf4Eax::from_bits(r.eax),
            ebx: Leaf4Ebx::from_bits(r.ebx),
            sets_minus_one: r.ecx,
            edx: Leaf4Edx::from_bits(r.edx),
        }
    }

    /// Every cache the processor describes, in subleaf order. Empty if the
    /// vendor's cache leaf is unsupported.
    pub fn read_all<S: CpuidSource + ?Sized>(
        source: &S,
        ranges: &CpuidRanges,
    ) -> impl Iterator<Item = Self> {
        let leaf = match ranges.vendor {
            CpuVendor::Amd if ranges.has_ext(LEAF_8000_001DH) => Some(LEAF_8000_001DH),
            _ if ranges.has_basic(LEAF_04H) => Some(LEAF_04H),
            _ => None,
        };
        leaf.into_iter()
            .flat_map(move |leaf| {
                (0..MAX_SUBLEAVES).map(move |subleaf| Self::from_regs(source.cpuid(leaf, subleaf)))
            })
            .take_while(|leaf| leaf.kind().is_some())
    }

    /// `None` for the null entry that terminates the list.
    #[must_use]
    pub const fn kind(&self) -> Option<CacheKind> {
        match self.eax.cache_type() {
            1 => Some(CacheKind::Data),
            2 => Some(CacheKind::Instruction),
            3 => Some(CacheKind::Unified),
            _ => None,
        }
    }

    #[must_use]
    pub const fn ways(&self) -> u32 {
        self.ebx.ways_minus_one() as u32 + 1
    }

    #[must_use]
    pub const fn line_size(&self) -> u32 {
        self.ebx.line_size_minus_one() as u32 + 1
    }

    #[must_use]
    pub const fn partitions(&self) -> u32 {
        self.ebx.partitions_minus_one() as u32 + 1
    }

    #[must_use]
    pub const fn sets(&self) -> u64 {
        self.sets_minus_one as u64 + 1
    }

    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.ways() as u64 * self.partitions() as u64 * self.line_size() as u64 * self.sets()
    }

    /// Logical processors sharing this cache.
    #[must_use]
    pub const fn shared_by(&self) -> u32 {
        self.eax.max_sharing_minus_one() as u32 + 1
    }

    /// Descriptor for the boot facts. `None` for the null entry.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_level_info(&self) -> Option<CacheLevelInfo> {
        Some(CacheLevelInfo {
            level: self.eax.level(),
            kind: self.kind()?,
            size_kb: u32::try_from(self.size_bytes() / 1024).unwrap_or(u32::MAX),
            line_size: self.line_size() as u16,
            ways: self.ways() as u16,
            shared_by: u16::try_from(self.shared_by()).unwrap_or(u16::MAX),
        })
    }
}

/// CPUID.04H:EAX.
#[bitfield(u32)]
pub struct Leaf4Eax {
    /// 0 = null, 1 = data, 2 = instruction, 3 = unified.
    #[bits(5)]
    pub cache_type: u8,
    #[bits(3)]
    pub level: u8,
    pub self_initializing: bool,
    pub fully_associative: bool,
    #[bits(4)]
    _rsv: u8,
    /// Bits 25:14.
    #[bits(12)]
    pub max_sharing_minus_one: u16,
    /// Bits 31:26.
    #[bits(6)]
    pub max_cores_minus_one: u8,
}

/// CPUID.04H:EBX.
#[bitfield(u32)]
pub struct Leaf4Ebx {
    #[bits(12)]
    pub line_size_minus_one: u16,
    #[bits(10)]
    pub partitions_minus_one: u16,
    #[bits(10)]
    pub ways_minus_one: u16,
}

/// CPUID.04H:EDX.
#[bitfield(u32)]
pub struct Leaf4Edx {
    pub wbinvd_not_inclusive: bool,
    pub inclusive: bool,
    pub complex_indexing: bool,
    #[bits(29)]
    _rsv: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_l3_descriptor() {
        // 11-way, 64 byte lines, 57344 sets: 39424 KiB, shared by 64 threads.
        let leaf = Leaf04h::from_regs(CpuidResult::new(0x3c0f_c163, 0x0280_003f, 0x0000_dfff, 0x0000_0004));
        assert_eq!(leaf.kind(), Some(CacheKind::Unified));
        assert_eq!(leaf.eax.level(), 3);
        assert_eq!(leaf.ways(), 11);
        assert_eq!(leaf.line_size(), 64);
        assert_eq!(leaf.sets(), 57_344);
        assert_eq!(leaf.shared_by(), 64);
        assert!(leaf.edx.complex_indexing());

        let info = leaf.to_level_info().unwrap();
        assert_eq!(info.size_kb, 39_424);
        assert_eq!(info.ways, 11);
    }

    #[test]
    fn null_entry_has_no_descriptor() {
        let leaf = Leaf04h::from_regs(CpuidResult::default());
        assert_eq!(leaf.kind(), None);
        assert!(leaf.to_level_info().is_none());
    }
}
