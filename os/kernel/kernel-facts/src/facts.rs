//! # Boot Facts
//!
//! Lifecycle: `Empty → Probed → Validated → Sealed`. The first three phases
//! live on [`BootFacts<Open>`]; [`BootFacts::seal`] turns it into a
//! [`BootFacts<Sealed>`] that only offers reads.

use crate::features::{
    CacheControl, Capabilities, ConstantTimeSupport, MemoryProtection, SideChannelMitigation,
};
use crate::identity::{CacheLevelInfo, CacheLevels, CpuIdentity};
use crate::provider::CapabilityProvider;
use core::marker::PhantomData;
use kernel_info::limits::{BOOT_FINDINGS_CAPACITY, MAX_CORES, MAX_NUMA_NODES, MIN_CORES};
use kernel_validation::{
    Finding, Open, SealRejected, SealState, Sealed, Severity, Validation, ValidationContext,
};
use log::{debug, info, warn};

/// Fatal probing failures.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BootFactsError {
    #[error("boot facts were already probed")]
    AlreadyProbed,
    #[error("CPU detection failed")]
    CpuDetectionFailed,
    #[error("cache detection failed")]
    CacheDetectionFailed,
    #[error("no cores detected")]
    NoCores,
    #[error("{0} cores exceed the supported maximum of {max}", max = MAX_CORES)]
    TooManyCores(u32),
    #[error("{0} NUMA nodes exceed the supported maximum of {max}", max = MAX_NUMA_NODES)]
    TooManyNumaNodes(u32),
}

/// Findings of a boot facts validation pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BootFinding {
    #[error("boot facts were never probed")]
    NotProbed,
    #[error("too few cores ({found} < {min})", min = MIN_CORES)]
    TooFewCores { found: u32 },
    #[error("no cache levels detected")]
    NoCache,
    #[error("no NUMA node detected")]
    NoNuma,
    #[error("constant-time operations not fully supported")]
    ConstantTimeUnsupported,
    #[error("hardware TRNG not available")]
    NoTrng,
    #[error("SMT is enabled ({threads_per_core} threads per core)")]
    SmtEnabled { threads_per_core: u8 },
    #[error("secure boot is disabled")]
    SecureBootDisabled,
}

impl Finding for BootFinding {
    fn severity(&self) -> Severity {
        match self {
            Self::NotProbed | Self::TooFewCores { .. } | Self::NoCache | Self::NoNuma => {
                Severity::HardFail
            }
            Self::ConstantTimeUnsupported
            | Self::NoTrng
            | Self::SmtEnabled { .. }
            | Self::SecureBootDisabled => Severity::Warn,
        }
    }
}

/// Result of [`BootFacts::validate`].
pub type BootReport = ValidationContext<BootFinding, BOOT_FINDINGS_CAPACITY>;

/// Immutable snapshot of the machine, once sealed.
#[derive(Clone, Debug)]
pub struct BootFacts<S: SealState = Sealed> {
    identity: CpuIdentity,
    caches: CacheLevels,
    core_count: u32,
    numa_nodes: u32,
    threads_per_core: u8,
    constant_time: Option<ConstantTimeSupport>,
    cache_control: Option<CacheControl>,
    memory_protection: Option<MemoryProtection>,
    side_channel: Option<SideChannelMitigation>,
    trng: bool,
    total_memory_mb: Option<u64>,
    uefi_boot: bool,
    secure_boot: bool,
    capabilities: Capabilities,
    probed: bool,
    validation: Validation,
    _state: PhantomData<S>,
}

impl Default for BootFacts<Open> {
    fn default() -> Self {
        Self::new()
    }
}

impl BootFacts<Open> {
    /// Empty, unprobed facts.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            identity: CpuIdentity::empty(),
            caches: heapless::Vec::new(),
            core_count: 0,
            numa_nodes: 0,
            threads_per_core: 0,
            constant_time: None,
            cache_control: None,
            memory_protection: None,
            side_channel: None,
            trng: false,
            total_memory_mb: None,
            uefi_boot: false,
            secure_boot: false,
            capabilities: Capabilities::new(),
            probed: false,
            validation: Validation::Pending,
            _state: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_probed(&self) -> bool {
        self.probed
    }

    /// Query the provider fact by fact.
    ///
    /// Nothing is stored unless every mandatory fact was found.
    ///
    /// # Errors
    /// See [`BootFactsError`]. Missing optional capabilities are not errors;
    /// they are recorded as absent and logged.
    pub fn probe<P>(&mut self, provider: &P) -> Result<(), BootFactsError>
    where
        P: CapabilityProvider + ?Sized,
    {
        if self.probed {
            return Err(BootFactsError::AlreadyProbed);
        }

        let identity = provider
            .cpu_identity()
            .ok_or(BootFactsError::CpuDetectionFailed)?;
        info!("boot: CPU {identity}");

        let caches = provider
            .cache_levels()
            .filter(|levels| !levels.is_empty())
            .ok_or(BootFactsError::CacheDetectionFailed)?;
        for cache in &caches {
            debug!(
                "boot: L{} {:?} cache, {} KiB, {}-way, {} byte lines, shared by {}",
                cache.level, cache.kind, cache.size_kb, cache.ways, cache.line_size, cache.shared_by
            );
        }

        let core_count = match provider.core_count() {
            None | Some(0) => return Err(BootFactsError::NoCores),
            Some(n) if n as usize > MAX_CORES => return Err(BootFactsError::TooManyCores(n)),
            Some(n) => n,
        };
        info!("boot: {core_count} cores");

        let numa_nodes = match provider.numa_node_count() {
            None | Some(0) => {
                warn!("boot: no NUMA topology detected, assuming a single node");
                1
            }
            Some(n) if n as usize > MAX_NUMA_NODES => {
                return Err(BootFactsError::TooManyNumaNodes(n));
            }
            Some(n) => n,
        };

        let threads_per_core = provider.threads_per_core().unwrap_or(1).max(1);

        let constant_time = provider.constant_time();
        if constant_time.is_none() {
            warn!("boot: constant-time support detection failed");
        }
        let cache_control = provider.cache_control();
        if cache_control.is_none() {
            warn!("boot: cache control detection failed");
        }
        let memory_protection = provider.memory_protection();
        if memory_protection.is_none() {
            warn!("boot: memory protection detection failed");
        }
        let side_channel = provider.side_channel_mitigation();
        if side_channel.is_none() {
            warn!("boot: side-channel mitigation detection failed");
        }

        let trng = provider.trng_available();
        let total_memory_mb = provider.total_memory_mb();
        let uefi_boot = provider.uefi_boot();
        let secure_boot = provider.secure_boot_enabled();

        let capabilities =
            Capabilities::derive(constant_time, cache_control, memory_protection, side_channel)
                .with_trng(trng)
                .with_secure_boot(secure_boot)
                .with_smt(threads_per_core > 1)
                .with_uefi_boot(uefi_boot);

        *self = Self {
            identity,
            caches,
            core_count,
            numa_nodes,
            threads_per_core,
            constant_time,
            cache_control,
            memory_protection,
            side_channel,
            trng,
            total_memory_mb,
            uefi_boot,
            secure_boot,
            capabilities,
            probed: true,
            validation: Validation::Pending,
            _state: PhantomData,
        };

        info!(
            "boot: {numa_nodes} NUMA node(s), {threads_per_core} thread(s) per core, memory {:?} MiB",
            total_memory_mb
        );
        Ok(())
    }

    /// Check the probed facts against the minimum the trust core needs.
    pub fn validate(&mut self) -> BootReport {
        let mut report = BootReport::new();

        if !self.probed {
            report.record(BootFinding::NotProbed);
            self.validation = Validation::Done(report.verdict());
            return report;
        }

        if self.core_count < MIN_CORES {
            report.record(BootFinding::TooFewCores {
                found: self.core_count,
            });
        }
        if self.caches.is_empty() {
            report.record(BootFinding::NoCache);
        }
        if self.numa_nodes == 0 {
            report.record(BootFinding::NoNuma);
        }
        if !self.capabilities.constant_time() {
            report.record(BootFinding::ConstantTimeUnsupported);
        }
        if !self.trng {
            report.record(BootFinding::NoTrng);
        }
        if self.threads_per_core > 1 {
            report.record(BootFinding::SmtEnabled {
                threads_per_core: self.threads_per_core,
            });
        }
        if !self.secure_boot {
            report.record(BootFinding::SecureBootDisabled);
        }

        self.validation = Validation::Done(report.verdict());
        report
    }

    /// Freeze the facts.
    ///
    /// # Errors
    /// Hands the facts back if the last validation is missing or failed.
    pub fn seal(self) -> Result<BootFacts<Sealed>, SealRejected<Self>> {
        let verdict = match self.validation.permits_seal() {
            Ok(verdict) => verdict,
            Err(reason) => return Err(SealRejected::new(self, reason)),
        };
        info!("boot: facts sealed ({verdict})");
        Ok(BootFacts {
            identity: self.identity,
            caches: self.caches,
            core_count: self.core_count,
            numa_nodes: self.numa_nodes,
            threads_per_core: self.threads_per_core,
            constant_time: self.constant_time,
            cache_control: self.cache_control,
            memory_protection: self.memory_protection,
            side_channel: self.side_channel,
            trng: self.trng,
            total_memory_mb: self.total_memory_mb,
            uefi_boot: self.uefi_boot,
            secure_boot: self.secure_boot,
            capabilities: self.capabilities,
            probed: self.probed,
            validation: self.validation,
            _state: PhantomData,
        })
    }
}

impl BootFacts<Sealed> {
    #[inline]
    #[must_use]
    pub const fn cpu_identity(&self) -> &CpuIdentity {
        &self.identity
    }

    /// Data and unified cache levels, innermost first.
    #[inline]
    #[must_use]
    pub fn cache_levels(&self) -> &[CacheLevelInfo] {
        &self.caches
    }

    #[inline]
    #[must_use]
    pub fn cache_level_count(&self) -> usize {
        self.caches.len()
    }

    #[inline]
    #[must_use]
    pub const fn core_count(&self) -> u32 {
        self.core_count
    }

    #[inline]
    #[must_use]
    pub const fn numa_node_count(&self) -> u32 {
        self.numa_nodes
    }

    #[inline]
    #[must_use]
    pub const fn threads_per_core(&self) -> u8 {
        self.threads_per_core
    }

    #[inline]
    #[must_use]
    pub const fn smt_enabled(&self) -> bool {
        self.capabilities.smt()
    }

    #[inline]
    #[must_use]
    pub const fn constant_time(&self) -> Option<ConstantTimeSupport> {
        self.constant_time
    }

    #[inline]
    #[must_use]
    pub const fn cache_control(&self) -> Option<CacheControl> {
        self.cache_control
    }

    #[inline]
    #[must_use]
    pub const fn memory_protection(&self) -> Option<MemoryProtection> {
        self.memory_protection
    }

    #[inline]
    #[must_use]
    pub const fn side_channel_mitigation(&self) -> Option<SideChannelMitigation> {
        self.side_channel
    }

    #[inline]
    #[must_use]
    pub const fn trng_available(&self) -> bool {
        self.trng
    }

    #[inline]
    #[must_use]
    pub const fn total_memory_mb(&self) -> Option<u64> {
        self.total_memory_mb
    }

    #[inline]
    #[must_use]
    pub const fn uefi_boot(&self) -> bool {
        self.uefi_boot
    }

    #[inline]
    #[must_use]
    pub const fn secure_boot_enabled(&self) -> bool {
        self.secure_boot
    }

    /// Summary flags derived at probe time.
    #[inline]
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Verdict of the validation pass that allowed sealing.
    #[must_use]
    pub const fn verdict(&self) -> Severity {
        match self.validation {
            Validation::Done(verdict) => verdict,
            Validation::Pending => Severity::HardFail,
        }
    }
}
