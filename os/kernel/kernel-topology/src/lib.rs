//! # Topology Engine
//!
//! Probes the geometry of every core, derives the pairwise cache isolation
//! matrix, checks the result for contradictions and freezes it.
//!
//! Geometry comes from a [`CoreProbe`]; [`CoreTable`] serves geometry that
//! firmware already tabulated. The isolation level of two cores is the
//! deepest cache level at which both are still private:
//!
//! | shared cache | isolation |
//! |--------------|-----------|
//! | L1           | `NONE`    |
//! | L2           | `L1`      |
//! | L3           | `L2`      |
//! | L4 (memory side) | `L3`  |
//! | none         | `FULL`    |
//!
//! Queries only exist on a sealed topology:
//!
//! ```compile_fail
//! use kernel_facts::BootFacts;
//! use kernel_info::CoreId;
//! use kernel_topology::{Topology, TopologyTables};
//! use kernel_validation::Sealed;
//!
//! fn peek(facts: &BootFacts<Sealed>, tables: &mut TopologyTables) {
//!     let topology = Topology::new(facts, tables);
//!     let _ = topology.core(CoreId::new(0));
//! }
//! ```
//!
//! and a sealed topology cannot be probed again:
//!
//! ```compile_fail
//! use kernel_info::CoreId;
//! use kernel_topology::{CoreTable, Topology};
//!
//! fn reprobe(topology: &mut Topology<'_>) {
//!     let _ = topology.probe_core(&CoreTable::new(), CoreId::new(0));
//! }
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod geometry;
mod isolation;
mod topology;

pub use geometry::{CoreGeometry, CoreProbe, CoreTable, LOCAL_NUMA_DISTANCE};
pub use isolation::{CacheDomains, CacheIsolation, CacheLevel, IsolationMatrix};
pub use topology::{Topology, TopologyError, TopologyFinding, TopologyReport, TopologyTables};
