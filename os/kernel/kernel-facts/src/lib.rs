//! # Boot Facts
//!
//! The ground-truth hardware snapshot everything else in the trust core is
//! checked against: CPU identity, cache levels, core and NUMA node counts and
//! the security-relevant capability sets.
//!
//! Facts come from a [`CapabilityProvider`] injected into
//! [`BootFacts::probe`]. There is no fallback provider; an architecture
//! without one does not compile. [`FactTable`] serves facts that were
//! collected elsewhere.
//!
//! ```rust
//! use kernel_facts::{BootFacts, FactTable};
//!
//! let mut facts = BootFacts::new();
//! // A table without a CPU identity cannot be probed.
//! assert!(facts.probe(&FactTable::default()).is_err());
//! ```
//!
//! Reads only exist once the facts are sealed:
//!
//! ```compile_fail
//! use kernel_facts::BootFacts;
//!
//! let facts = BootFacts::new();
//! let _ = facts.core_count();
//! ```
//!
//! and probing a sealed snapshot is impossible:
//!
//! ```compile_fail
//! use kernel_facts::{BootFacts, FactTable};
//! use kernel_validation::Sealed;
//!
//! fn reprobe(facts: &mut BootFacts<Sealed>) {
//!     let _ = facts.probe(&FactTable::default());
//! }
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod facts;
mod features;
mod identity;
mod provider;

pub use facts::{BootFacts, BootFactsError, BootFinding, BootReport};
pub use features::{
    CacheControl, Capabilities, ConstantTimeSupport, MemoryProtection, SideChannelMitigation,
};
pub use identity::{CacheKind, CacheLevelInfo, CacheLevels, CpuBrand, CpuIdentity, CpuVendor};
pub use provider::{CapabilityProvider, FactTable};
