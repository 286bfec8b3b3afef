//! Security-relevant capability feature sets.
//!
//! Each set is a packed `u8` so a provider can hand it over by value. A set
//! that could not be detected is `None` at the provider boundary; a set that
//! was detected but lacks a bit genuinely lacks the feature.

use bitfield_struct::bitfield;

/// Instructions that allow constant-time cryptography.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct ConstantTimeSupport {
    /// AES-NI instructions.
    pub aes_ni: bool,
    /// `RDRAND` instruction.
    pub rdrand: bool,
    /// `RDSEED` instruction.
    pub rdseed: bool,
    #[bits(5)]
    _rsv: u8,
}

/// Cache maintenance and partitioning controls.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct CacheControl {
    pub clflush: bool,
    pub clflushopt: bool,
    pub clwb: bool,
    /// Cache Allocation Technology.
    pub cat: bool,
    /// Code and Data Prioritization.
    pub cdp: bool,
    #[bits(3)]
    _rsv: u8,
}

/// Memory protection features.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct MemoryProtection {
    /// No-execute pages.
    pub nx: bool,
    /// Supervisor mode execution prevention.
    pub smep: bool,
    /// Supervisor mode access prevention.
    pub smap: bool,
    /// Protection keys for user pages.
    pub pku: bool,
    /// Total memory encryption.
    pub tme: bool,
    #[bits(3)]
    _rsv: u8,
}

/// Speculative-execution mitigations.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct SideChannelMitigation {
    /// Indirect branch restricted speculation.
    pub ibrs: bool,
    /// Single thread indirect branch predictors.
    pub stibp: bool,
    /// Speculative store bypass disable.
    pub ssbd: bool,
    /// `VERW` clears microarchitectural buffers.
    pub md_clear: bool,
    #[bits(4)]
    _rsv: u8,
}

/// Summary derived from the individual feature sets at probe time.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct Capabilities {
    /// AES-NI and `RDRAND`.
    pub constant_time: bool,
    /// CAT or CDP.
    pub cache_partitioning: bool,
    /// TME.
    pub memory_encryption: bool,
    /// IBRS and STIBP.
    pub side_channel_mitigations: bool,
    pub trng: bool,
    pub secure_boot: bool,
    /// More than one hardware thread per core.
    pub smt: bool,
    pub uefi_boot: bool,
}

impl Capabilities {
    /// Reduce the probed feature sets to the summary flags. Absent sets count
    /// as all-clear.
    #[must_use]
    pub fn derive(
        constant_time: Option<ConstantTimeSupport>,
        cache_control: Option<CacheControl>,
        memory_protection: Option<MemoryProtection>,
        side_channel: Option<SideChannelMitigation>,
    ) -> Self {
        let ct = constant_time.unwrap_or_default();
        let cc = cache_control.unwrap_or_default();
        let mp = memory_protection.unwrap_or_default();
        let sc = side_channel.unwrap_or_default();

        Self::new()
            .with_constant_time(ct.aes_ni() && ct.rdrand())
            .with_cache_partitioning(cc.cat() || cc.cdp())
            .with_memory_encryption(mp.tme())
            .with_side_channel_mitigations(sc.ibrs() && sc.stibp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_requires_both_constant_time_instructions() {
        let only_aes = ConstantTimeSupport::new().with_aes_ni(true);
        let caps = Capabilities::derive(Some(only_aes), None, None, None);
        assert!(!caps.constant_time());

        let both = only_aes.with_rdrand(true);
        let caps = Capabilities::derive(Some(both), None, None, None);
        assert!(caps.constant_time());
    }

    #[test]
    fn either_partitioning_technology_counts() {
        let cdp = CacheControl::new().with_cdp(true);
        let caps = Capabilities::derive(None, Some(cdp), None, None);
        assert!(caps.cache_partitioning());
        assert!(!caps.memory_encryption());
    }

    #[test]
    fn side_channel_summary_needs_ibrs_and_stibp() {
        let sc = SideChannelMitigation::new()
            .with_ibrs(true)
            .with_ssbd(true);
        assert!(!Capabilities::derive(None, None, None, Some(sc)).side_channel_mitigations());
        let sc = sc.with_stibp(true);
        assert!(Capabilities::derive(None, None, None, Some(sc)).side_channel_mitigations());
    }

    #[test]
    fn packed_layout_is_stable() {
        let mp = MemoryProtection::new().with_nx(true).with_tme(true);
        assert_eq!(mp.into_bits(), 0b1_0001);
    }
}
