//! # Trust Core Configuration
//!
//! This crate is the single source of truth for the capacities, identifiers
//! and core-set representation shared by every layer of the boot-time trust
//! core: boot facts, topology, security domains and the scheduler.
//!
//! ## Overview
//!
//! The trust core never allocates. Each structure is sized at compile time
//! from the constants in [`limits`], and every relationship between those
//! constants is checked by a `const` assertion, so an inconsistent
//! configuration fails the build instead of the boot.
//!
//! ```text
//!  kernel-info ──► kernel-validation ──► kernel-facts ──► kernel-topology
//!                                                              │
//!                         kernel-sched ◄── kernel-domains ◄────┘
//! ```
//!
//! ## Modules
//!
//! * [`limits`]: capacities such as [`MAX_CORES`](limits::MAX_CORES) and
//!   [`MAX_DOMAINS`](limits::MAX_DOMAINS).
//! * [`ids`]: newtypes for cores, domains, NUMA nodes, cache domains,
//!   sockets and tasks.
//! * [`core_set`]: the [`CoreSet`] bitmap used for domain ownership claims
//!   and topology queries.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_info::{CoreId, CoreSet};
//!
//! let set = CoreSet::declared([CoreId::new(0), CoreId::new(3)]).unwrap();
//! assert!(set.is_explicit());
//! assert_eq!(set.len(), 2);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod core_set;
pub mod ids;
pub mod limits;

pub use core_set::{CoreSet, CoreSetError, CoreSetIter};
pub use ids::{CacheDomainId, CoreId, DomainId, NumaNodeId, SocketId, TaskId};
