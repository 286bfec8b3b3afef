use crate::{CpuidRanges, CpuidResult, CpuidSource};
use bitfield_struct::bitfield;

pub const LEAF_0BH: u32 = 0x0B;

/// Level type reported in CPUID.0BH:ECX[15:8].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TopologyLevel {
    Invalid,
    Smt,
    Core,
    Other(u8),
}

/// CPUID.0BH: extended topology enumeration, one subleaf per level.
#[derive(Copy, Clone, Debug)]
pub struct Leaf0Bh {
    pub eax: Leaf0BEax,
    pub ebx: Leaf0BEbx,
    pub ecx: Leaf0BEcx,
    pub x2apic_id: u32,
}

impl Leaf0Bh {
    /// Query one level; `None` if the leaf is absent or the level is invalid.
    pub fn read<S: CpuidSource + ?Sized>(
        source: &S,
        ranges: &CpuidRanges,
        subleaf: u32,
    ) -> Option<Self> {
        if !ranges.has_basic(LEAF_0BH) {
            return None;
        }
        let leaf = Self::from_regs(source.cpuid(LEAF_0BH, subleaf));
        (leaf.level_type() != TopologyLevel::Invalid).then_some(leaf)
    }

    #[must_use]
    pub const fn from_regs(r: CpuidResult) -> Self {
        Self {
            eax: Leaf0BEax::from_bits(r.eax),
            ebx: Leaf0BEbx::from_bits(r.ebx),
            ecx: Leaf0BEcx::from_bits(r.ecx),
            x2apic_id: r.edx,
        }
    }

    #[must_use]
    pub const fn level_type(&self) -> TopologyLevel {
        match self.ecx.level_type() {
            0 => TopologyLevel::Invalid,
            1 => TopologyLevel::Smt,
            2 => TopologyLevel::Core,
            other => TopologyLevel::Other(other),
        }
    }

    /// Logical processors at this level and below.
    #[must_use]
    pub const fn logical_processors(&self) -> u16 {
        self.ebx.logical_processors()
    }
}

/// CPUID.0BH:EAX.
#[bitfield(u32)]
pub struct Leaf0BEax {
    /// Shift of the x2APIC id to reach the next level.
    #[bits(5)]
    pub shift: u8,
    #[bits(27)]
    _rsv: u32,
}

/// CPUID.0BH:EBX.
#[bitfield(u32)]
pub struct Leaf0BEbx {
    #[bits(16)]
    pub logical_processors: u16,
    #[bits(16)]
    _rsv: u16,
}

/// CPUID.0BH:ECX.
#[bitfield(u32)]
pub struct Leaf0BEcx {
    #[bits(8)]
    pub level_number: u8,
    #[bits(8)]
    pub level_type: u8,
    #[bits(16)]
    _rsv: u16,
}
