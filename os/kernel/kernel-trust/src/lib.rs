//! # Trust Core
//!
//! Runs the boot-time pipeline of the trust core and keeps its sealed
//! results for the rest of the boot:
//!
//! ```text
//! CapabilityProvider ─► BootFacts ─► Topology ─► DomainGraph ─► Scheduler
//!                           │            │            │
//!                           └────────────┴────────────┴─► TrustAnchor
//! ```
//!
//! Each stage is probed, validated, logged and sealed before the next one
//! starts. A sealed stage goes into a write-once [`SealedCell`] of the
//! [`TrustAnchor`]; later stages and the scheduler borrow from there. The
//! tables behind the topology and the domain graph sit in [`ClaimCell`]s of
//! the same anchor, so a `static` anchor keeps them off the boot stack.
//!
//! ```rust
//! use kernel_trust::TrustAnchor;
//!
//! static ANCHOR: TrustAnchor<'static> = TrustAnchor::new();
//!
//! // Before the pipeline ran, every decision fails closed.
//! assert!(!ANCHOR.is_established());
//! assert!(!ANCHOR.scheduler().is_bound());
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod anchor;
#[allow(unsafe_code)]
mod sealed_cell;

pub use anchor::{TrustAnchor, TrustError};
pub use sealed_cell::{ClaimCell, SealedCell};
