use crate::{CpuidRanges, CpuidResult, CpuidSource};
use bitfield_struct::bitfield;

pub const LEAF_07H: u32 = 0x07;

/// CPUID.(EAX=07H, ECX=0): structured extended feature flags.
///
/// Reference: Intel SDM Vol. 2A, CPUID leaf 07H, subleaf 0.
#[derive(Copy, Clone, Debug)]
pub struct Leaf07h {
    pub ebx: Leaf7Ebx,
    pub ecx: Leaf7Ecx,
    pub edx: Leaf7Edx,
}

impl Leaf07h {
    #[inline]
    pub fn read<S: CpuidSource + ?Sized>(source: &S, ranges: &CpuidRanges) -> Option<Self> {
        ranges
            .has_basic(LEAF_07H)
            .then(|| Self::from_regs(source.cpuid(LEAF_07H, 0)))
    }

    #[must_use]
    pub const fn from_regs(r: CpuidResult) -> Self {
        Self {
            ebx: Leaf7Ebx::from_bits(r.ebx),
            ecx: Leaf7Ecx::from_bits(r.ecx),
            edx: Leaf7Edx::from_bits(r.edx),
        }
    }
}

/// CPUID.07H.0:EBX.
#[bitfield(u32)]
pub struct Leaf7Ebx {
    #[bits(7)]
    _rsv0: u8,
    /// Supervisor-mode execution prevention (bit 7).
    pub smep: bool,
    #[bits(7)]
    _rsv8: u8,
    /// Resource Director Technology allocation (bit 15).
    pub rdt_a: bool,
    #[bits(2)]
    _rsv16: u8,
    /// RDSEED (bit 18).
    pub rdseed: bool,
    _rsv19: bool,
    /// Supervisor-mode access prevention (bit 20).
    pub smap: bool,
    #[bits(2)]
    _rsv21: u8,
    /// CLFLUSHOPT (bit 23).
    pub clflushopt: bool,
    /// CLWB (bit 24).
    pub clwb: bool,
    #[bits(7)]
    _rsv25: u8,
}

/// CPUID.07H.0:ECX.
#[bitfield(u32)]
pub struct Leaf7Ecx {
    #[bits(3)]
    _rsv0: u8,
    /// Protection keys for user-mode pages (bit 3).
    pub pku: bool,
    #[bits(9)]
    _rsv4: u16,
    /// Total memory encryption (bit 13).
    pub tme: bool,
    #[bits(18)]
    _rsv14: u32,
}

/// CPUID.07H.0:EDX.
#[bitfield(u32)]
pub struct Leaf7Edx {
    #[bits(10)]
    _rsv0: u16,
    /// `VERW` flushes microarchitectural buffers (bit 10).
    pub md_clear: bool,
    #[bits(15)]
    _rsv11: u16,
    /// IBRS and IBPB (bit 26).
    pub ibrs_ibpb: bool,
    /// STIBP (bit 27).
    pub stibp: bool,
    #[bits(3)]
    _rsv28: u8,
    /// SSBD (bit 31).
    pub ssbd: bool,
}
