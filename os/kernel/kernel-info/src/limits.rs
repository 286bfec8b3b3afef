//! # Capacities
//!
//! Every structure of the trust core is fixed-capacity. These constants bound
//! the probing, validation and query work so that all of it runs in bounded
//! time with interrupts disabled.

/// Number of logical cores the topology can describe.
///
/// Core sets are bitmaps of this many bits.
pub const MAX_CORES: usize = 256;

/// Number of cache level descriptors recorded in the boot facts.
pub const MAX_CACHE_LEVELS: usize = 4;

/// Number of NUMA nodes the topology can describe.
pub const MAX_NUMA_NODES: usize = 8;

/// Number of security domains a domain graph can hold.
pub const MAX_DOMAINS: usize = 64;

/// Number of dependencies a single domain may declare.
pub const MAX_DEPENDENCIES: usize = 32;

/// Maximum length of a domain name in bytes.
pub const MAX_DOMAIN_NAME_LEN: usize = 64;

/// Length of the CPU brand string (three CPUID leaves of 16 bytes).
pub const CPU_BRAND_LEN: usize = 48;

/// Highest security level a domain may declare. Levels start at 1.
pub const MAX_SECURITY_LEVEL: u8 = 8;

/// Fewest cores a machine must have for a partition to make sense.
pub const MIN_CORES: u32 = 2;

/// Findings kept per boot facts validation pass.
pub const BOOT_FINDINGS_CAPACITY: usize = 32;

/// Findings kept per topology validation pass.
pub const TOPOLOGY_FINDINGS_CAPACITY: usize = 64;

/// Findings kept per domain graph validation pass.
pub const DOMAIN_FINDINGS_CAPACITY: usize = 64;

/// Number of 64-bit words backing a core set.
pub const CORE_SET_WORDS: usize = MAX_CORES / 64;

const _: () = {
    assert!(MAX_CORES.is_multiple_of(64));
    assert!(MAX_CORES <= u16::MAX as usize);
    // Reachability queries track visited domains in a single u64.
    assert!(MAX_DOMAINS <= 64);
    // Domain indices are stored as u8 in the core ownership map.
    assert!(MAX_DOMAINS < u8::MAX as usize);
    assert!(MAX_NUMA_NODES > 0);
    assert!(MAX_SECURITY_LEVEL > 0);
    assert!(MIN_CORES as usize <= MAX_CORES);
};
