use crate::{CpuidRanges, CpuidSource};
use bitfield_struct::bitfield;

pub const LEAF_10H: u32 = 0x10;

/// Subleaf describing L3 cache allocation.
const L3_CAT_SUBLEAF: u32 = 1;

/// CPUID.10H: Intel RDT allocation enumeration.
///
/// Subleaf 0 lists the allocatable resources; subleaf 1 details L3 CAT
/// including Code and Data Prioritization.
#[derive(Copy, Clone, Debug)]
pub struct Leaf10h {
    pub resources: Leaf10Resources,
    pub l3: Leaf10L3Ecx,
}

impl Leaf10h {
    /// `None` if the leaf is absent or leaf 07H does not advertise RDT-A.
    pub fn read<S: CpuidSource + ?Sized>(
        source: &S,
        ranges: &CpuidRanges,
        rdt_a: bool,
    ) -> Option<Self> {
        if !rdt_a || !ranges.has_basic(LEAF_10H) {
            return None;
        }
        let resources = Leaf10Resources::from_bits(source.cpuid(LEAF_10H, 0).ebx);
        let l3 = if resources.l3_cat() {
            Leaf10L3Ecx::from_bits(source.cpuid(LEAF_10H, L3_CAT_SUBLEAF).ecx)
        } else {
            Leaf10L3Ecx::new()
        };
        Some(Self { resources, l3 })
    }

    #[must_use]
    pub const fn cat(&self) -> bool {
        self.resources.l3_cat() || self.resources.l2_cat()
    }

    #[must_use]
    pub const fn cdp(&self) -> bool {
        self.resources.l3_cat() && self.l3.cdp()
    }
}

/// CPUID.10H.0:EBX, resource bitmap.
#[bitfield(u32)]
pub struct Leaf10Resources {
    _rsv0: bool,
    /// L3 cache allocation (bit 1).
    pub l3_cat: bool,
    /// L2 cache allocation (bit 2).
    pub l2_cat: bool,
    /// Memory bandwidth allocation (bit 3).
    pub mba: bool,
    #[bits(28)]
    _rsv4: u32,
}

/// CPUID.10H.1:ECX.
#[bitfield(u32)]
pub struct Leaf10L3Ecx {
    #[bits(2)]
    _rsv0: u8,
    /// Code and Data Prioritization (bit 2).
    pub cdp: bool,
    #[bits(29)]
    _rsv3: u32,
}
