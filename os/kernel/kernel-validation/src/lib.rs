//! # Validation Primitives
//!
//! Shared vocabulary for every validate-then-seal structure of the trust
//! core.
//!
//! * [`Severity`]: the three-level verdict (`ACCEPT`, `WARN`, `HARD_FAIL`).
//! * [`ValidationContext`]: an append-only, fixed-capacity log of typed
//!   [`Finding`]s whose verdict is the worst severity recorded.
//! * [`Open`] / [`Sealed`]: type-state markers. Structures generic over a
//!   [`SealState`] expose mutation only while `Open` and queries only once
//!   `Sealed`.
//!
//! ```rust
//! use core::fmt;
//! use kernel_validation::{Finding, Severity, ValidationContext};
//!
//! struct TooHot;
//!
//! impl fmt::Display for TooHot {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         f.write_str("too hot")
//!     }
//! }
//!
//! impl Finding for TooHot {
//!     fn severity(&self) -> Severity {
//!         Severity::Warn
//!     }
//! }
//!
//! let mut ctx = ValidationContext::<TooHot, 8>::new();
//! ctx.record(TooHot);
//! assert_eq!(ctx.verdict(), Severity::Warn);
//! assert!(ctx.allows_boot());
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod context;
mod severity;
mod state;

pub use context::{Finding, ValidationContext};
pub use severity::Severity;
pub use state::{Open, SealError, SealRejected, SealState, Sealed, Validation};
