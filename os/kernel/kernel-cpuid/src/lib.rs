//! # x86-64 CPUID
//!
//! Decoders for the CPUID leaves the trust core needs, and a
//! [`CapabilityProvider`](kernel_facts::CapabilityProvider) built on them.
//!
//! Decoding is separated from execution: every leaf is parsed from a plain
//! [`CpuidResult`], and the provider reads through a [`CpuidSource`]. With the
//! `native` feature on x86-64, [`NativeCpuid`] executes the instruction; a
//! [`CpuidTable`] replays a recorded dump.
//!
//! ```rust
//! use kernel_cpuid::{CpuidProvider, CpuidResult, CpuidTable, PlatformFacts};
//! use kernel_facts::{CapabilityProvider, CpuVendor};
//!
//! let mut table = CpuidTable::<8>::new();
//! // "GenuineIntel", max basic leaf 1
//! table.insert(0, 0, CpuidResult::new(1, 0x756e_6547, 0x6c65_746e, 0x4965_6e69)).unwrap();
//! table.insert(1, 0, CpuidResult::new(0x0005_0654, 0, 0, 0)).unwrap();
//!
//! let provider = CpuidProvider::new(&table, PlatformFacts::default());
//! let identity = provider.cpu_identity().unwrap();
//! assert_eq!(identity.vendor, CpuVendor::Intel);
//! assert_eq!(identity.model, 0x55);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod extended;
mod leaf01h;
mod leaf04h;
mod leaf07h;
mod leaf0bh;
mod leaf10h;
mod provider;
mod ranges;
mod source;

pub use extended::{Ext1EEcx, Ext1Edx, read_brand};
pub use leaf01h::{Leaf01h, Leaf1Eax, Leaf1Ebx, Leaf1Ecx, Leaf1Edx};
pub use leaf04h::{Leaf04h, Leaf4Eax, Leaf4Ebx, Leaf4Edx};
pub use leaf07h::{Leaf07h, Leaf7Ebx, Leaf7Ecx, Leaf7Edx};
pub use leaf0bh::{Leaf0BEax, Leaf0BEbx, Leaf0BEcx, Leaf0Bh, TopologyLevel};
pub use leaf10h::{Leaf10L3Ecx, Leaf10Resources, Leaf10h};
pub use provider::{CpuidProvider, PlatformFacts};
pub use ranges::CpuidRanges;
#[cfg(all(target_arch = "x86_64", feature = "native"))]
pub use source::NativeCpuid;
pub use source::{CpuidResult, CpuidSource, CpuidTable};
