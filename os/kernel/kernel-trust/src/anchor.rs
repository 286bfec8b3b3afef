//! Boot pipeline: facts, topology, domains, scheduler.

use crate::{ClaimCell, SealedCell};
use kernel_domains::{DomainError, DomainGraph, DomainTable, SecurityDomain};
use kernel_facts::{BootFacts, BootFactsError, CapabilityProvider};
use kernel_sched::{SchedError, Scheduler};
use kernel_topology::{CoreProbe, Topology, TopologyError, TopologyTables};
use kernel_validation::{SealError, Sealed};
use log::info;

/// Why the trust core could not be established.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrustError {
    #[error("trust anchor is already established")]
    AlreadyEstablished,
    #[error("boot facts: {0}")]
    BootFacts(#[from] BootFactsError),
    #[error("boot facts not sealed: {0}")]
    BootFactsRejected(SealError),
    #[error("topology: {0}")]
    Topology(#[from] TopologyError),
    #[error("topology not sealed: {0}")]
    TopologyRejected(SealError),
    #[error("domains: {0}")]
    Domains(#[from] DomainError),
    #[error("domain graph not sealed: {0}")]
    DomainsRejected(SealError),
    #[error("scheduler: {0}")]
    Scheduler(#[from] SchedError),
}

/// Boot-lifetime home of the sealed state.
///
/// Meant to live in a `static`. [`TrustAnchor::establish`] fills every cell
/// exactly once; readers on other cores see a cell only once it is complete.
#[derive(Debug, Default)]
pub struct TrustAnchor<'a> {
    facts: SealedCell<BootFacts<Sealed>>,
    topology_tables: ClaimCell<TopologyTables>,
    topology: SealedCell<Topology<'a>>,
    domain_table: ClaimCell<DomainTable>,
    graph: SealedCell<DomainGraph<'a>>,
}

impl<'a> TrustAnchor<'a> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            facts: SealedCell::new(),
            topology_tables: ClaimCell::new(TopologyTables::new()),
            topology: SealedCell::new(),
            domain_table: ClaimCell::new(DomainTable::new()),
            graph: SealedCell::new(),
        }
    }

    /// Probe, validate and seal boot facts, topology and domain graph in
    /// that order, publishing each as soon as it is sealed.
    ///
    /// Every validation report is written to the log. A failure leaves the
    /// stages published so far in place; the boot is expected to stop.
    ///
    /// # Errors
    /// The first failing stage, see [`TrustError`].
    pub fn establish<P, C, D>(
        &'a self,
        provider: &P,
        probe: &C,
        declarations: D,
    ) -> Result<Scheduler<'a>, TrustError>
    where
        P: CapabilityProvider + ?Sized,
        C: CoreProbe + ?Sized,
        D: IntoIterator<Item = SecurityDomain>,
    {
        if self.facts.is_published() {
            return Err(TrustError::AlreadyEstablished);
        }

        let mut facts = BootFacts::new();
        facts.probe(provider)?;
        facts.validate().log("boot");
        let facts = facts
            .seal()
            .map_err(|rejected| TrustError::BootFactsRejected(rejected.reason()))?;
        let facts = self
            .facts
            .publish(facts)
            .map_err(|_| TrustError::AlreadyEstablished)?;

        let tables = self
            .topology_tables
            .claim()
            .ok_or(TrustError::AlreadyEstablished)?;
        let mut topology = Topology::new(facts, tables);
        topology.probe_all_cores(probe)?;
        topology.build_cache_isolation_matrix()?;
        topology.validate().log("topology");
        let topology = topology
            .seal()
            .map_err(|rejected| TrustError::TopologyRejected(rejected.reason()))?;
        let topology = self
            .topology
            .publish(topology)
            .map_err(|_| TrustError::AlreadyEstablished)?;

        let table = self
            .domain_table
            .claim()
            .ok_or(TrustError::AlreadyEstablished)?;
        let mut graph = DomainGraph::new(topology, table);
        for domain in declarations {
            graph.add(domain)?;
        }
        graph.validate().log("domains");
        let graph = graph
            .seal()
            .map_err(|rejected| TrustError::DomainsRejected(rejected.reason()))?;
        let graph = self
            .graph
            .publish(graph)
            .map_err(|_| TrustError::AlreadyEstablished)?;

        let scheduler = Scheduler::new(topology, graph)?;
        info!(
            "trust: established, {} cores, {} domain(s)",
            topology.core_count(),
            graph.len()
        );
        Ok(scheduler)
    }

    /// A scheduler over the published state; unbound until every stage is
    /// published.
    #[must_use]
    pub fn scheduler(&'a self) -> Scheduler<'a> {
        match (self.topology.get(), self.graph.get()) {
            (Some(topology), Some(graph)) => {
                Scheduler::new(topology, graph).unwrap_or_else(|_| Scheduler::unbound())
            }
            _ => Scheduler::unbound(),
        }
    }

    #[must_use]
    pub fn boot_facts(&self) -> Option<&BootFacts<Sealed>> {
        self.facts.get()
    }

    #[must_use]
    pub fn topology(&self) -> Option<&Topology<'a>> {
        self.topology.get()
    }

    #[must_use]
    pub fn domain_graph(&self) -> Option<&DomainGraph<'a>> {
        self.graph.get()
    }

    #[must_use]
    pub fn is_established(&self) -> bool {
        self.graph.is_published()
    }
}
