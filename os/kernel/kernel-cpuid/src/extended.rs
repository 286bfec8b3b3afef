//! Extended leaves (`0x8000_xxxx`).

use crate::{CpuidRanges, CpuidSource};
use bitfield_struct::bitfield;
use kernel_facts::CpuBrand;

pub const LEAF_8000_0001H: u32 = 0x8000_0001;
pub const LEAF_BRAND_FIRST: u32 = 0x8000_0002;
pub const LEAF_BRAND_LAST: u32 = 0x8000_0004;
pub const LEAF_8000_001EH: u32 = 0x8000_001E;

/// CPUID.80000001H:EDX.
#[bitfield(u32)]
pub struct Ext1Edx {
    #[bits(20)]
    _rsv0: u32,
    /// Execute disable (bit 20).
    pub nx: bool,
    #[bits(11)]
    _rsv21: u16,
}

impl Ext1Edx {
    pub fn read<S: CpuidSource + ?Sized>(source: &S, ranges: &CpuidRanges) -> Option<Self> {
        ranges
            .has_ext(LEAF_8000_0001H)
            .then(|| Self::from_bits(source.cpuid(LEAF_8000_0001H, 0).edx))
    }
}

/// The processor brand string from leaves `0x8000_0002..=0x8000_0004`, with
/// leading and trailing padding removed. `None` if the leaves are absent.
pub fn read_brand<S: CpuidSource + ?Sized>(source: &S, ranges: &CpuidRanges) -> Option<CpuBrand> {
    if !ranges.has_ext(LEAF_BRAND_LAST) {
        return None;
    }

    let mut raw = [0u8; 48];
    for (chunk, leaf) in raw
        .chunks_exact_mut(16)
        .zip(LEAF_BRAND_FIRST..=LEAF_BRAND_LAST)
    {
        let r = source.cpuid(leaf, 0);
        for (dst, reg) in chunk.chunks_exact_mut(4).zip([r.eax, r.ebx, r.ecx, r.edx]) {
            dst.copy_from_slice(&reg.to_le_bytes());
        }
    }

    let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let text = core::str::from_utf8(&raw[..len]).ok()?;
    let mut brand = CpuBrand::new();
    brand.push_str(text.trim()).ok()?;
    Some(brand)
}

/// CPUID.8000001EH:ECX, AMD node identifiers.
#[bitfield(u32)]
pub struct Ext1EEcx {
    #[bits(8)]
    pub node_id: u8,
    /// Bits 10:8.
    #[bits(3)]
    pub nodes_per_processor_minus_one: u8,
    #[bits(21)]
    _rsv: u32,
}

impl Ext1EEcx {
    pub fn read<S: CpuidSource + ?Sized>(source: &S, ranges: &CpuidRanges) -> Option<Self> {
        ranges
            .has_ext(LEAF_8000_001EH)
            .then(|| Self::from_bits(source.cpuid(LEAF_8000_001EH, 0).ecx))
    }

    #[must_use]
    pub const fn nodes_per_processor(self) -> u32 {
        self.nodes_per_processor_minus_one() as u32 + 1
    }
}
