//! Boot facts from CPUID.

use crate::extended::{Ext1EEcx, Ext1Edx, read_brand};
use crate::leaf01h::Leaf01h;
use crate::leaf04h::Leaf04h;
use crate::leaf07h::Leaf07h;
use crate::leaf0bh::{Leaf0Bh, TopologyLevel};
use crate::leaf10h::Leaf10h;
use crate::{CpuidRanges, CpuidSource};
use kernel_facts::{
    CacheControl, CacheKind, CacheLevels, CapabilityProvider, ConstantTimeSupport, CpuIdentity,
    CpuVendor, MemoryProtection, SideChannelMitigation,
};
use log::{debug, warn};

/// Facts CPUID cannot know. Handed over by the loader (UEFI, ACPI).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PlatformFacts {
    pub total_memory_mb: Option<u64>,
    /// NUMA node count from the firmware's affinity tables, if parsed.
    pub numa_nodes: Option<u32>,
    pub uefi_boot: bool,
    pub secure_boot: bool,
}

/// [`CapabilityProvider`] for x86-64 processors.
pub struct CpuidProvider<S> {
    source: S,
    ranges: CpuidRanges,
    platform: PlatformFacts,
}

impl<S: CpuidSource> CpuidProvider<S> {
    #[must_use]
    pub fn new(source: S, platform: PlatformFacts) -> Self {
        let ranges = CpuidRanges::read(&source);
        debug!(
            "cpuid: vendor {}, max basic leaf {:#x}, max extended leaf {:#x}",
            ranges.vendor, ranges.max_basic, ranges.max_extended
        );
        Self {
            source,
            ranges,
            platform,
        }
    }

    #[must_use]
    pub const fn ranges(&self) -> &CpuidRanges {
        &self.ranges
    }

    fn leaf01h(&self) -> Option<Leaf01h> {
        Leaf01h::read(&self.source, &self.ranges)
    }

    fn leaf07h(&self) -> Option<Leaf07h> {
        Leaf07h::read(&self.source, &self.ranges)
    }

    fn rdseed(&self) -> bool {
        self.leaf07h().is_some_and(|l| l.ebx.rdseed())
    }
}

impl<S: CpuidSource> CapabilityProvider for CpuidProvider<S> {
    fn cpu_identity(&self) -> Option<CpuIdentity> {
        let leaf1 = self.leaf01h()?;
        Some(CpuIdentity {
            vendor: self.ranges.vendor,
            family: leaf1.family(),
            model: leaf1.model(),
            stepping: leaf1.stepping(),
            brand: read_brand(&self.source, &self.ranges).unwrap_or_default(),
        })
    }

    fn cache_levels(&self) -> Option<CacheLevels> {
        let mut levels = CacheLevels::new();
        for leaf in Leaf04h::read_all(&self.source, &self.ranges) {
            let Some(info) = leaf.to_level_info() else {
                continue;
            };
            if info.kind == CacheKind::Instruction {
                continue;
            }
            if levels.push(info).is_err() {
                warn!("cpuid: ignoring L{} cache beyond the descriptor capacity", info.level);
            }
        }
        levels.sort_unstable_by_key(|info| info.level);
        (!levels.is_empty()).then_some(levels)
    }

    fn core_count(&self) -> Option<u32> {
        let count = Leaf0Bh::read(&self.source, &self.ranges, 1)
            .filter(|l| l.level_type() == TopologyLevel::Core)
            .map(|l| u32::from(l.logical_processors()))
            .or_else(|| self.leaf01h().map(|l| u32::from(l.logical_cpus_legacy())))?;
        (count > 0).then_some(count)
    }

    fn numa_node_count(&self) -> Option<u32> {
        if let Some(nodes) = self.platform.numa_nodes {
            return Some(nodes);
        }
        match self.ranges.vendor {
            CpuVendor::Amd => {
                Ext1EEcx::read(&self.source, &self.ranges).map(Ext1EEcx::nodes_per_processor)
            }
            _ => None,
        }
    }

    fn threads_per_core(&self) -> Option<u8> {
        if let Some(smt) = Leaf0Bh::read(&self.source, &self.ranges, 0)
            .filter(|l| l.level_type() == TopologyLevel::Smt)
        {
            return u8::try_from(smt.logical_processors()).ok();
        }
        // Without the topology leaf, only "no HTT" is conclusive.
        self.leaf01h().filter(|l| !l.edx.htt()).map(|_| 1)
    }

    fn constant_time(&self) -> Option<ConstantTimeSupport> {
        let leaf1 = self.leaf01h()?;
        Some(
            ConstantTimeSupport::new()
                .with_aes_ni(leaf1.ecx.aesni())
                .with_rdrand(leaf1.ecx.rdrand())
                .with_rdseed(self.rdseed()),
        )
    }

    fn cache_control(&self) -> Option<CacheControl> {
        let leaf1 = self.leaf01h()?;
        let leaf7 = self.leaf07h();
        let rdt = Leaf10h::read(
            &self.source,
            &self.ranges,
            leaf7.is_some_and(|l| l.ebx.rdt_a()),
        );
        Some(
            CacheControl::new()
                .with_clflush(leaf1.edx.clfsh())
                .with_clflushopt(leaf7.is_some_and(|l| l.ebx.clflushopt()))
                .with_clwb(leaf7.is_some_and(|l| l.ebx.clwb()))
                .with_cat(rdt.is_some_and(|r| r.cat()))
                .with_cdp(rdt.is_some_and(|r| r.cdp())),
        )
    }

    fn memory_protection(&self) -> Option<MemoryProtection> {
        let ext1 = Ext1Edx::read(&self.source, &self.ranges);
        let leaf7 = self.leaf07h();
        if ext1.is_none() && leaf7.is_none() {
            return None;
        }
        Some(
            MemoryProtection::new()
                .with_nx(ext1.is_some_and(|e| e.nx()))
                .with_smep(leaf7.is_some_and(|l| l.ebx.smep()))
                .with_smap(leaf7.is_some_and(|l| l.ebx.smap()))
                .with_pku(leaf7.is_some_and(|l| l.ecx.pku()))
                .with_tme(leaf7.is_some_and(|l| l.ecx.tme())),
        )
    }

    fn side_channel_mitigation(&self) -> Option<SideChannelMitigation> {
        let leaf7 = self.leaf07h()?;
        Some(
            SideChannelMitigation::new()
                .with_ibrs(leaf7.edx.ibrs_ibpb())
                .with_stibp(leaf7.edx.stibp())
                .with_ssbd(leaf7.edx.ssbd())
                .with_md_clear(leaf7.edx.md_clear()),
        )
    }

    fn trng_available(&self) -> bool {
        self.leaf01h().is_some_and(|l| l.ecx.rdrand()) || self.rdseed()
    }

    fn total_memory_mb(&self) -> Option<u64> {
        self.platform.total_memory_mb
    }

    fn uefi_boot(&self) -> bool {
        self.platform.uefi_boot
    }

    fn secure_boot_enabled(&self) -> bool {
        self.platform.secure_boot
    }
}
