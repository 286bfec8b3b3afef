//! The boundary to the architecture-specific hardware prober.

use crate::features::{CacheControl, ConstantTimeSupport, MemoryProtection, SideChannelMitigation};
use crate::identity::{CacheLevels, CpuIdentity};

/// One method per boot-wide hardware fact.
///
/// Every method is a side-effect free read. A fact that could not be
/// determined is `None` (or `false` for plain flags); implementations never
/// panic. [`BootFacts::probe`](crate::BootFacts::probe) decides whether a
/// missing fact is fatal or a downgrade.
pub trait CapabilityProvider {
    fn cpu_identity(&self) -> Option<CpuIdentity>;

    /// Data and unified cache levels, innermost first.
    fn cache_levels(&self) -> Option<CacheLevels>;

    /// Logical processors available to the kernel.
    fn core_count(&self) -> Option<u32>;

    fn numa_node_count(&self) -> Option<u32>;

    fn threads_per_core(&self) -> Option<u8>;

    fn constant_time(&self) -> Option<ConstantTimeSupport>;

    fn cache_control(&self) -> Option<CacheControl>;

    fn memory_protection(&self) -> Option<MemoryProtection>;

    fn side_channel_mitigation(&self) -> Option<SideChannelMitigation>;

    /// A hardware true random number generator is present.
    fn trng_available(&self) -> bool;

    fn total_memory_mb(&self) -> Option<u64>;

    fn uefi_boot(&self) -> bool;

    fn secure_boot_enabled(&self) -> bool;
}

impl<P: CapabilityProvider + ?Sized> CapabilityProvider for &P {
    fn cpu_identity(&self) -> Option<CpuIdentity> {
        (**self).cpu_identity()
    }

    fn cache_levels(&self) -> Option<CacheLevels> {
        (**self).cache_levels()
    }

    fn core_count(&self) -> Option<u32> {
        (**self).core_count()
    }

    fn numa_node_count(&self) -> Option<u32> {
        (**self).numa_node_count()
    }

    fn threads_per_core(&self) -> Option<u8> {
        (**self).threads_per_core()
    }

    fn constant_time(&self) -> Option<ConstantTimeSupport> {
        (**self).constant_time()
    }

    fn cache_control(&self) -> Option<CacheControl> {
        (**self).cache_control()
    }

    fn memory_protection(&self) -> Option<MemoryProtection> {
        (**self).memory_protection()
    }

    fn side_channel_mitigation(&self) -> Option<SideChannelMitigation> {
        (**self).side_channel_mitigation()
    }

    fn trng_available(&self) -> bool {
        (**self).trng_available()
    }

    fn total_memory_mb(&self) -> Option<u64> {
        (**self).total_memory_mb()
    }

    fn uefi_boot(&self) -> bool {
        (**self).uefi_boot()
    }

    fn secure_boot_enabled(&self) -> bool {
        (**self).secure_boot_enabled()
    }
}

/// A provider backed by already-collected values, e.g. facts handed over by
/// the loader or a recorded machine description.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FactTable {
    pub identity: Option<CpuIdentity>,
    pub caches: Option<CacheLevels>,
    pub cores: Option<u32>,
    pub numa_nodes: Option<u32>,
    pub threads_per_core: Option<u8>,
    pub constant_time: Option<ConstantTimeSupport>,
    pub cache_control: Option<CacheControl>,
    pub memory_protection: Option<MemoryProtection>,
    pub side_channel: Option<SideChannelMitigation>,
    pub trng: bool,
    pub total_memory_mb: Option<u64>,
    pub uefi_boot: bool,
    pub secure_boot: bool,
}

impl CapabilityProvider for FactTable {
    fn cpu_identity(&self) -> Option<CpuIdentity> {
        self.identity.clone()
    }

    fn cache_levels(&self) -> Option<CacheLevels> {
        self.caches.clone()
    }

    fn core_count(&self) -> Option<u32> {
        self.cores
    }

    fn numa_node_count(&self) -> Option<u32> {
        self.numa_nodes
    }

    fn threads_per_core(&self) -> Option<u8> {
        self.threads_per_core
    }

    fn constant_time(&self) -> Option<ConstantTimeSupport> {
        self.constant_time
    }

    fn cache_control(&self) -> Option<CacheControl> {
        self.cache_control
    }

    fn memory_protection(&self) -> Option<MemoryProtection> {
        self.memory_protection
    }

    fn side_channel_mitigation(&self) -> Option<SideChannelMitigation> {
        self.side_channel
    }

    fn trng_available(&self) -> bool {
        self.trng
    }

    fn total_memory_mb(&self) -> Option<u64> {
        self.total_memory_mb
    }

    fn uefi_boot(&self) -> bool {
        self.uefi_boot
    }

    fn secure_boot_enabled(&self) -> bool {
        self.secure_boot
    }
}
