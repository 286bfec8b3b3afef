use crate::{CpuidRanges, CpuidResult, CpuidSource};
use bitfield_struct::bitfield;

pub const LEAF_01H: u32 = 0x01;

/// CPUID.01H: version information and the classic feature flags.
///
/// Reference: Intel SDM Vol. 2A, "CPUID—CPU Identification", leaf 01H.
#[derive(Copy, Clone, Debug)]
pub struct Leaf01h {
    pub eax: Leaf1Eax,
    pub ebx: Leaf1Ebx,
    pub ecx: Leaf1Ecx,
    pub edx: Leaf1Edx,
}

impl Leaf01h {
    /// Query CPUID.01H if supported; `None` if `ranges` says leaf 1 is absent.
    #[inline]
    pub fn read<S: CpuidSource + ?Sized>(source: &S, ranges: &CpuidRanges) -> Option<Self> {
        ranges
            .has_basic(LEAF_01H)
            .then(|| Self::from_regs(source.cpuid(LEAF_01H, 0)))
    }

    #[must_use]
    pub const fn from_regs(r: CpuidResult) -> Self {
        Self {
            eax: Leaf1Eax::from_bits(r.eax),
            ebx: Leaf1Ebx::from_bits(r.ebx),
            ecx: Leaf1Ecx::from_bits(r.ecx),
            edx: Leaf1Edx::from_bits(r.edx),
        }
    }

    #[inline]
    #[must_use]
    pub fn family(&self) -> u16 {
        self.eax.effective_family()
    }

    #[inline]
    #[must_use]
    pub const fn model(&self) -> u8 {
        self.eax.effective_model()
    }

    #[inline]
    #[must_use]
    pub const fn stepping(&self) -> u8 {
        self.eax.stepping()
    }

    /// Logical processors per package, valid only if HTT is set.
    #[inline]
    #[must_use]
    pub const fn logical_cpus_legacy(&self) -> u8 {
        if self.edx.htt() {
            self.ebx.logical_processor_count()
        } else {
            1
        }
    }
}

/// CPUID.01H:EAX, version information.
#[bitfield(u32)]
pub struct Leaf1Eax {
    /// Bits 3:0.
    #[bits(4)]
    pub stepping: u8,
    /// Bits 7:4.
    #[bits(4)]
    pub model: u8,
    /// Bits 11:8.
    #[bits(4)]
    pub family: u8,
    #[bits(4)]
    _rsv1: u8,
    /// Bits 19:16.
    #[bits(4)]
    pub ext_model: u8,
    /// Bits 27:20.
    #[bits(8)]
    pub ext_family: u16,
    #[bits(4)]
    _rsv2: u8,
}

impl Leaf1Eax {
    /// Base family, plus the extended family if the base is `0x0F`.
    #[inline]
    #[must_use]
    pub fn effective_family(self) -> u16 {
        let fam = u16::from(self.family());
        if fam == 0x0F {
            fam + self.ext_family()
        } else {
            fam
        }
    }

    /// Base model, extended by `ext_model` for families `0x06` and `0x0F`.
    #[inline]
    #[must_use]
    pub const fn effective_model(self) -> u8 {
        let fam = self.family();
        let base = self.model();
        if fam == 0x06 || fam == 0x0F {
            base | (self.ext_model() << 4)
        } else {
            base
        }
    }
}

/// CPUID.01H:EBX.
#[bitfield(u32)]
pub struct Leaf1Ebx {
    #[bits(8)]
    pub brand_index: u8,
    /// CLFLUSH line size in 8-byte units.
    #[bits(8)]
    pub clflush_line_size_8b: u8,
    /// Logical processors per package (legacy).
    #[bits(8)]
    pub logical_processor_count: u8,
    #[bits(8)]
    pub initial_apic_id: u8,
}

/// CPUID.01H:ECX, the flags the trust core looks at.
#[bitfield(u32)]
pub struct Leaf1Ecx {
    #[bits(25)]
    _rsv3: u32,
    /// AES-NI (bit 25).
    pub aesni: bool,
    #[bits(4)]
    _rsv4: u8,
    /// RDRAND (bit 30).
    pub rdrand: bool,
    /// Running under a hypervisor (bit 31).
    pub hypervisor: bool,
}

/// CPUID.01H:EDX, the flags the trust core looks at.
#[bitfield(u32)]
pub struct Leaf1Edx {
    #[bits(19)]
    _rsv5: u32,
    /// CLFLUSH (bit 19).
    pub clfsh: bool,
    #[bits(8)]
    _rsv6: u8,
    /// Hyper-threading / multi-core package (bit 28).
    pub htt: bool,
    #[bits(3)]
    _rsv7: u8,
}
