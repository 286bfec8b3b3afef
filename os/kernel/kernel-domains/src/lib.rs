//! # Domain Validator
//!
//! Checks a set of [`SecurityDomain`] declarations against a sealed topology
//! and against each other, then freezes them into a [`DomainGraph`].
//!
//! Validation is holistic. [`DomainGraph::validate`] runs every step in a
//! fixed order and accumulates all findings:
//!
//! 1. every field explicitly set, ids unique
//! 2. every claimed core exists
//! 3. no core claimed twice
//! 4. each isolation requirement satisfiable by the cache matrix
//! 5. NUMA-local domains on one node
//! 6. every dependency exists and is not the domain itself
//! 7. the dependency relation is acyclic
//! 8. unused cores and an asymmetric topology are warnings
//!
//! Only a sealed graph answers queries:
//!
//! ```compile_fail
//! use kernel_domains::{DomainGraph, DomainTable};
//! use kernel_info::DomainId;
//! use kernel_topology::Topology;
//!
//! fn lookup<'a>(topology: &'a Topology<'a>, table: &'a mut DomainTable) {
//!     let graph = DomainGraph::new(topology, table);
//!     let _ = graph.get(DomainId::new(1));
//! }
//! ```
//!
//! and a sealed graph takes no further domains:
//!
//! ```compile_fail
//! use kernel_domains::{DomainGraph, SecurityDomain};
//!
//! fn extend(graph: &mut DomainGraph<'_>) {
//!     let _ = graph.add(SecurityDomain::default());
//! }
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod domain;
mod finding;
mod graph;

pub use domain::{
    DependencySet, DomainError, DomainField, DomainName, IsolationRequirement, MemoryDomainType,
    NumaLocality, PreemptionPolicy, SecurityDomain, SecurityLevel,
};
pub use finding::{DomainFinding, DomainReport};
pub use graph::{DomainGraph, DomainTable};
