use crate::CpuidSource;
use kernel_facts::CpuVendor;

const LEAF_00H: u32 = 0x00;
const LEAF_MAX_EXTENDED: u32 = 0x8000_0000;

/// Highest basic and extended leaves plus the vendor, from `cpuid(0)` and
/// `cpuid(0x8000_0000)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CpuidRanges {
    pub max_basic: u32,
    pub max_extended: u32,
    pub vendor: CpuVendor,
}

impl CpuidRanges {
    pub fn read<S: CpuidSource + ?Sized>(source: &S) -> Self {
        let b0 = source.cpuid(LEAF_00H, 0);

        // e.g. "GenuineIntel", "AuthenticAMD"
        let mut vendor = [0u8; 12];
        vendor[0..4].copy_from_slice(&b0.ebx.to_le_bytes());
        vendor[4..8].copy_from_slice(&b0.edx.to_le_bytes());
        vendor[8..12].copy_from_slice(&b0.ecx.to_le_bytes());

        let e0 = source.cpuid(LEAF_MAX_EXTENDED, 0);
        let max_extended = if e0.eax >= LEAF_MAX_EXTENDED {
            e0.eax
        } else {
            0
        };

        Self {
            max_basic: b0.eax,
            max_extended,
            vendor: CpuVendor::from_vendor_string(&vendor),
        }
    }

    #[inline]
    #[must_use]
    pub const fn has_basic(&self, leaf: u32) -> bool {
        leaf <= self.max_basic
    }

    #[inline]
    #[must_use]
    pub const fn has_ext(&self, leaf: u32) -> bool {
        leaf >= LEAF_MAX_EXTENDED && leaf <= self.max_extended
    }
}
