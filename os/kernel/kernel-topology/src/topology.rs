//! # Topology
//!
//! Lifecycle: `Uninitialized → Probing → Probed → Validated → Sealed`.
//!
//! Probing, matrix construction and validation happen on
//! [`Topology<Open>`]. [`Topology::seal`] consumes it and yields a
//! [`Topology<Sealed>`] that only answers queries.
//!
//! The per-core tables and the isolation matrix live in a caller-owned
//! [`TopologyTables`]; the topology itself only borrows them.

use crate::geometry::{CoreGeometry, CoreProbe};
use crate::isolation::{CacheDomains, CacheIsolation, CacheLevel, IsolationMatrix};
use core::marker::PhantomData;
use kernel_facts::BootFacts;
use kernel_info::limits::{MAX_CORES, MAX_NUMA_NODES, TOPOLOGY_FINDINGS_CAPACITY};
use kernel_info::{CoreId, CoreSet, NumaNodeId};
use kernel_validation::{
    Finding, Open, SealRejected, SealState, Sealed, Severity, Validation, ValidationContext,
};
use log::{debug, info};

/// Failed topology operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("topology was already probed")]
    AlreadyProbed,
    #[error("{0} is not present on this machine")]
    CoreNotPresent(CoreId),
    #[error("no geometry available for {0}")]
    ProbeFailed(CoreId),
    #[error("not every core has been probed")]
    NotProbed,
    #[error("the cache isolation matrix was already built")]
    MatrixAlreadyBuilt,
    #[error("{0} is not present on this machine")]
    NumaNodeNotPresent(NumaNodeId),
}

/// Findings of a topology validation pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyFinding {
    #[error("{0} was never probed")]
    CoreNotProbed(CoreId),
    #[error("cache isolation matrix was not built")]
    MatrixNotBuilt,
    #[error("{0} is offline")]
    CoreOffline(CoreId),
    #[error("{core} reports {node}, beyond the {count} node(s) in the boot facts")]
    NumaNodeOutOfRange {
        core: CoreId,
        node: NumaNodeId,
        count: u32,
    },
    #[error("{0} reports an invalid NUMA distance row")]
    NumaDistanceInvalid(CoreId),
    #[error("{core} reports {sibling} as SMT sibling, which is out of range, itself or not reciprocal")]
    SmtSiblingInvalid { core: CoreId, sibling: CoreId },
    #[error("{a} and {b} share a cache below {level:?} but report different {level:?} domains")]
    CacheHierarchyInconsistent {
        a: CoreId,
        b: CoreId,
        level: CacheLevel,
    },
    #[error("{0} has frequency scaling enabled")]
    FrequencyScalingEnabled(CoreId),
    #[error("no two cores are isolatable at any cache level")]
    NoIsolatableCores,
    #[error("{0} differs in cache, NUMA, SMT or frequency shape from core#0")]
    AsymmetricTopology(CoreId),
    #[error("SMT is enabled")]
    SmtEnabled,
    #[error("{node} has {cores} core(s), node#0 has {expected}")]
    NumaAsymmetric {
        node: NumaNodeId,
        cores: usize,
        expected: usize,
    },
}

impl Finding for TopologyFinding {
    fn severity(&self) -> Severity {
        match self {
            Self::AsymmetricTopology(_) | Self::SmtEnabled | Self::NumaAsymmetric { .. } => {
                Severity::Warn
            }
            _ => Severity::HardFail,
        }
    }
}

const UNKNOWN_CACHES: CacheDomains = CacheDomains::new(u32::MAX, u32::MAX, u32::MAX);

/// Result of [`Topology::validate`].
pub type TopologyReport = ValidationContext<TopologyFinding, TOPOLOGY_FINDINGS_CAPACITY>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Phase {
    Uninitialized,
    Probing,
    Probed,
}

/// Backing storage of a [`Topology`].
///
/// Too large for a boot stack; keep it in a `static` or other long-lived
/// storage.
#[derive(Debug)]
pub struct TopologyTables {
    cores: [Option<CoreGeometry>; MAX_CORES],
    numa: [CoreSet; MAX_NUMA_NODES],
    matrix: IsolationMatrix,
}

impl TopologyTables {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cores: [None; MAX_CORES],
            numa: [CoreSet::new(); MAX_NUMA_NODES],
            matrix: IsolationMatrix::new(),
        }
    }

    fn clear(&mut self) {
        self.cores.fill(None);
        self.numa.fill(CoreSet::new());
        self.matrix.clear();
    }
}

impl Default for TopologyTables {
    fn default() -> Self {
        Self::new()
    }
}

/// Physical layout of the machine.
#[derive(Debug)]
pub struct Topology<'f, S: SealState = Sealed> {
    facts: &'f BootFacts<Sealed>,
    tables: &'f mut TopologyTables,
    matrix_built: bool,
    phase: Phase,
    symmetric: bool,
    smt: bool,
    validation: Validation,
    _state: PhantomData<S>,
}

impl<'f> Topology<'f, Open> {
    /// An unprobed topology for the machine described by `facts`, backed
    /// by `tables`. Whatever `tables` held before is cleared.
    #[must_use]
    pub fn new(facts: &'f BootFacts<Sealed>, tables: &'f mut TopologyTables) -> Self {
        tables.clear();
        Self {
            facts,
            tables,
            matrix_built: false,
            phase: Phase::Uninitialized,
            symmetric: false,
            smt: false,
            validation: Validation::Pending,
            _state: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_probed(&self) -> bool {
        self.phase == Phase::Probed
    }

    /// Record the geometry of one core.
    ///
    /// # Errors
    /// [`TopologyError::CoreNotPresent`] if `core` is not below the boot
    /// facts' core count, [`TopologyError::AlreadyProbed`] if it (or every
    /// core) was already probed, [`TopologyError::ProbeFailed`] if the probe
    /// knows nothing about it.
    pub fn probe_core<P>(&mut self, probe: &P, core: CoreId) -> Result<(), TopologyError>
    where
        P: CoreProbe + ?Sized,
    {
        if self.phase == Phase::Probed {
            return Err(TopologyError::AlreadyProbed);
        }
        let index = core.index();
        if index >= self.core_count() {
            return Err(TopologyError::CoreNotPresent(core));
        }
        if self.tables.cores[index].is_some() {
            return Err(TopologyError::AlreadyProbed);
        }

        let geometry = probe
            .probe_core(core)
            .ok_or(TopologyError::ProbeFailed(core))?;
        debug!(
            "topology: {core} socket {} {} L1 {} L2 {} L3 {} smt {:?}",
            geometry.socket.as_u32(),
            geometry.numa_node,
            geometry.caches.l1.as_u32(),
            geometry.caches.l2.as_u32(),
            geometry.caches.l3.as_u32(),
            geometry.smt_sibling
        );

        if let Some(node) = self.tables.numa.get_mut(geometry.numa_node.index()) {
            // `index` is below MAX_CORES, checked above.
            let _ = node.insert(core);
        }
        self.tables.cores[index] = Some(geometry);
        self.validation = Validation::Pending;

        let probed = self.tables.cores[..self.core_count()]
            .iter()
            .filter(|c| c.is_some())
            .count();
        self.phase = if probed == self.core_count() {
            Phase::Probed
        } else {
            Phase::Probing
        };
        Ok(())
    }

    /// Probe every core not probed yet, in ascending order.
    ///
    /// # Errors
    /// [`TopologyError::AlreadyProbed`] once every core is probed, otherwise
    /// the first per-core failure. On failure all cores probed so far,
    /// including those probed one by one before, are discarded.
    pub fn probe_all_cores<P>(&mut self, probe: &P) -> Result<(), TopologyError>
    where
        P: CoreProbe + ?Sized,
    {
        if self.phase == Phase::Probed {
            return Err(TopologyError::AlreadyProbed);
        }
        for index in 0..self.core_count() {
            if self.tables.cores[index].is_some() {
                continue;
            }
            let core = CoreId::from_index(index).ok_or(TopologyError::NotProbed)?;
            if let Err(e) = self.probe_core(probe, core) {
                self.discard();
                return Err(e);
            }
        }
        info!("topology: probed {} cores", self.core_count());
        Ok(())
    }

    fn discard(&mut self) {
        self.tables.clear();
        self.phase = Phase::Uninitialized;
        self.validation = Validation::Pending;
    }

    /// Compute the isolation level of every core pair.
    ///
    /// # Errors
    /// [`TopologyError::NotProbed`] unless every core was probed,
    /// [`TopologyError::MatrixAlreadyBuilt`] on a second call.
    pub fn build_cache_isolation_matrix(&mut self) -> Result<(), TopologyError> {
        if self.phase != Phase::Probed {
            return Err(TopologyError::NotProbed);
        }
        if self.matrix_built {
            return Err(TopologyError::MatrixAlreadyBuilt);
        }

        // Every core below `count` is probed at this point.
        let count = self.core_count();
        let TopologyTables { cores, matrix, .. } = &mut *self.tables;
        matrix.build(count, |i| cores[i].map_or(UNKNOWN_CACHES, |g| g.caches));
        self.matrix_built = true;
        self.validation = Validation::Pending;
        info!("topology: cache isolation matrix built for {count} cores");
        Ok(())
    }

    /// Check the probed geometry for contradictions and unsuitable hardware.
    pub fn validate(&mut self) -> TopologyReport {
        let mut report = TopologyReport::new();
        let count = self.core_count();
        let nodes = self.facts.numa_node_count();

        for index in 0..count {
            if self.tables.cores[index].is_none() {
                report.record(TopologyFinding::CoreNotProbed(core_at(index)));
            }
        }
        if !self.matrix_built {
            report.record(TopologyFinding::MatrixNotBuilt);
        }

        for (index, geometry) in self.probed() {
            let core = core_at(index);
            if !geometry.online {
                report.record(TopologyFinding::CoreOffline(core));
            }
            if geometry.numa_node.index() >= nodes as usize {
                report.record(TopologyFinding::NumaNodeOutOfRange {
                    core,
                    node: geometry.numa_node,
                    count: nodes,
                });
            } else if !geometry.numa_distance_valid(nodes as usize) {
                report.record(TopologyFinding::NumaDistanceInvalid(core));
            }
            if let Some(sibling) = geometry.smt_sibling
                && !self.sibling_valid(core, sibling)
            {
                report.record(TopologyFinding::SmtSiblingInvalid { core, sibling });
            }
            if geometry.freq_scaling {
                report.record(TopologyFinding::FrequencyScalingEnabled(core));
            }
        }

        self.check_cache_hierarchy(&mut report);

        let smt = self.probed().any(|(_, g)| g.smt_sibling.is_some());
        self.smt = smt;
        self.symmetric = false;
        if self.matrix_built {
            if !self.any_isolatable_pair() {
                report.record(TopologyFinding::NoIsolatableCores);
            }
            if let Some(core) = self.first_asymmetric_core() {
                report.record(TopologyFinding::AsymmetricTopology(core));
            } else {
                self.symmetric = true;
            }
        }
        if self.smt {
            report.record(TopologyFinding::SmtEnabled);
        }
        self.check_numa_balance(&mut report);

        self.validation = Validation::Done(report.verdict());
        report
    }

    /// Freeze the topology.
    ///
    /// # Errors
    /// Hands the topology back if the last validation is missing or failed.
    pub fn seal(self) -> Result<Topology<'f, Sealed>, SealRejected<Self>> {
        let verdict = match self.validation.permits_seal() {
            Ok(verdict) => verdict,
            Err(reason) => return Err(SealRejected::new(self, reason)),
        };
        info!(
            "topology: sealed ({verdict}), {} cores, {} NUMA node(s), symmetric {}, SMT {}",
            self.core_count(),
            self.facts.numa_node_count(),
            self.symmetric,
            self.smt
        );
        Ok(Topology {
            facts: self.facts,
            tables: self.tables,
            matrix_built: self.matrix_built,
            phase: self.phase,
            symmetric: self.symmetric,
            smt: self.smt,
            validation: self.validation,
            _state: PhantomData,
        })
    }

    fn sibling_valid(&self, core: CoreId, sibling: CoreId) -> bool {
        sibling != core
            && sibling.index() < self.core_count()
            && self.tables.cores[sibling.index()].is_some_and(|g| g.smt_sibling == Some(core))
    }

    /// Within a socket, sharing an inner level implies sharing every outer
    /// level. One finding per offending core at most.
    fn check_cache_hierarchy(&self, report: &mut TopologyReport) {
        for (a, ga) in self.probed() {
            let inconsistent = self.probed().skip_while(|(b, _)| *b <= a).find_map(|(b, gb)| {
                if ga.socket != gb.socket {
                    return None;
                }
                let (ca, cb) = (ga.caches, gb.caches);
                let level = if ca.l1 == cb.l1 && ca.l2 != cb.l2 {
                    CacheLevel::L2
                } else if ca.l2 == cb.l2 && ca.l3 != cb.l3 {
                    CacheLevel::L3
                } else if ca.l3 == cb.l3 && ca.l4 != cb.l4 {
                    CacheLevel::L4
                } else {
                    return None;
                };
                Some((b, level))
            });
            if let Some((b, level)) = inconsistent {
                report.record(TopologyFinding::CacheHierarchyInconsistent {
                    a: core_at(a),
                    b: core_at(b),
                    level,
                });
            }
        }
    }

    fn any_isolatable_pair(&self) -> bool {
        let count = self.core_count();
        (0..count).any(|a| ((a + 1)..count).any(|b| self.tables.matrix.get(a, b) > CacheIsolation::None))
    }

    fn first_asymmetric_core(&self) -> Option<CoreId> {
        let reference = self.shape(0)?;
        (1..self.core_count())
            .find(|&index| self.shape(index).is_some_and(|shape| shape != reference))
            .map(core_at)
    }

    /// Sharing counts per cache level, NUMA node size, SMT presence and clock.
    fn shape(&self, index: usize) -> Option<([usize; 4], usize, bool, u32, u32)> {
        let geometry = self.tables.cores[index]?;
        let mut sharers = [0usize; 4];
        for other in 0..self.core_count() {
            if other == index {
                continue;
            }
            for (slot, level) in sharers.iter_mut().zip([
                CacheLevel::L1,
                CacheLevel::L2,
                CacheLevel::L3,
                CacheLevel::L4,
            ]) {
                if self.shares(index, other, level) {
                    *slot += 1;
                }
            }
        }
        let node_size = self
            .tables
            .numa
            .get(geometry.numa_node.index())
            .map_or(0, CoreSet::len);
        Some((
            sharers,
            node_size,
            geometry.smt_sibling.is_some(),
            geometry.base_freq_mhz,
            geometry.max_freq_mhz,
        ))
    }

    fn check_numa_balance(&self, report: &mut TopologyReport) {
        let nodes = (self.facts.numa_node_count() as usize).min(MAX_NUMA_NODES);
        let numa = &self.tables.numa;
        let expected = numa[0].len();
        if let Some(node) = (1..nodes).find(|&n| numa[n].len() != expected) {
            report.record(TopologyFinding::NumaAsymmetric {
                node: numa_at(node),
                cores: numa[node].len(),
                expected,
            });
        }
    }
}

impl<'f> Topology<'f, Sealed> {
    /// The boot facts this topology was probed against.
    #[inline]
    #[must_use]
    pub const fn boot_facts(&self) -> &'f BootFacts<Sealed> {
        self.facts
    }

    /// Geometry of one core.
    ///
    /// # Errors
    /// [`TopologyError::CoreNotPresent`] for ids outside the machine.
    pub fn core(&self, core: CoreId) -> Result<&CoreGeometry, TopologyError> {
        self.tables
            .cores
            .get(core.index())
            .filter(|_| core.index() < self.core_count())
            .and_then(Option::as_ref)
            .ok_or(TopologyError::CoreNotPresent(core))
    }

    #[must_use]
    pub fn contains_core(&self, core: CoreId) -> bool {
        self.core(core).is_ok()
    }

    /// Every core of the machine.
    #[must_use]
    pub fn all_cores(&self) -> CoreSet {
        CoreSet::first_n(self.core_count())
    }

    /// Isolation level between two cores, `FULL` for a core with itself.
    ///
    /// # Errors
    /// [`TopologyError::CoreNotPresent`] if either core is unknown.
    pub fn isolation(&self, a: CoreId, b: CoreId) -> Result<CacheIsolation, TopologyError> {
        self.core(a)?;
        self.core(b)?;
        Ok(self.tables.matrix.get(a.index(), b.index()))
    }

    /// Whether the pair is isolated at least to `level`.
    ///
    /// # Errors
    /// [`TopologyError::CoreNotPresent`] if either core is unknown.
    pub fn can_isolate_cores(
        &self,
        a: CoreId,
        b: CoreId,
        level: CacheIsolation,
    ) -> Result<bool, TopologyError> {
        Ok(self.isolation(a, b)? >= level)
    }

    /// # Errors
    /// [`TopologyError::CoreNotPresent`] if the core is unknown.
    pub fn numa_node(&self, core: CoreId) -> Result<NumaNodeId, TopologyError> {
        Ok(self.core(core)?.numa_node)
    }

    /// # Errors
    /// [`TopologyError::CoreNotPresent`] if either core is unknown.
    pub fn same_numa_node(&self, a: CoreId, b: CoreId) -> Result<bool, TopologyError> {
        Ok(self.numa_node(a)? == self.numa_node(b)?)
    }

    /// SLIT distance between the nodes of two cores.
    ///
    /// # Errors
    /// [`TopologyError::CoreNotPresent`] if either core is unknown.
    pub fn numa_distance(&self, a: CoreId, b: CoreId) -> Result<u8, TopologyError> {
        let from = self.core(a)?;
        let to = self.numa_node(b)?;
        from.numa_distance
            .get(to.index())
            .copied()
            .ok_or(TopologyError::NumaNodeNotPresent(to))
    }

    /// # Errors
    /// [`TopologyError::CoreNotPresent`] if the core is unknown.
    pub fn has_smt_sibling(&self, core: CoreId) -> Result<bool, TopologyError> {
        Ok(self.core(core)?.smt_sibling.is_some())
    }

    /// Other cores sharing the given cache level with `core`. Does not
    /// include `core` itself.
    ///
    /// # Errors
    /// [`TopologyError::CoreNotPresent`] if the core is unknown.
    pub fn cache_sharing_cores(
        &self,
        core: CoreId,
        level: CacheLevel,
    ) -> Result<CoreSet, TopologyError> {
        self.core(core)?;
        let mut set = CoreSet::new();
        for other in 0..self.core_count() {
            if other != core.index() && self.shares(core.index(), other, level) {
                let _ = set.insert(core_at(other));
            }
        }
        Ok(set)
    }

    /// Cores on one NUMA node.
    ///
    /// # Errors
    /// [`TopologyError::NumaNodeNotPresent`] if the node is unknown.
    pub fn numa_cores(&self, node: NumaNodeId) -> Result<&CoreSet, TopologyError> {
        if node.index() >= self.facts.numa_node_count() as usize {
            return Err(TopologyError::NumaNodeNotPresent(node));
        }
        self.tables
            .numa
            .get(node.index())
            .ok_or(TopologyError::NumaNodeNotPresent(node))
    }

    #[inline]
    #[must_use]
    pub const fn numa_node_count(&self) -> u32 {
        self.facts.numa_node_count()
    }

    /// Every core has the same cache, SMT and clock shape.
    #[inline]
    #[must_use]
    pub const fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    #[inline]
    #[must_use]
    pub const fn smt_present(&self) -> bool {
        self.smt
    }

    /// Verdict of the validation pass that allowed sealing.
    #[must_use]
    pub const fn verdict(&self) -> Severity {
        match self.validation {
            Validation::Done(verdict) => verdict,
            Validation::Pending => Severity::HardFail,
        }
    }
}

impl<S: SealState> Topology<'_, S> {
    /// Number of cores, as reported by the boot facts.
    #[inline]
    #[must_use]
    pub fn core_count(&self) -> usize {
        (self.facts.core_count() as usize).min(MAX_CORES)
    }

    /// Both cores are probed and share the cache at `level`.
    fn shares(&self, a: usize, b: usize, level: CacheLevel) -> bool {
        match level.sharing_bound() {
            Some(bound) => self.tables.matrix.get(a, b) < bound,
            None => match (&self.tables.cores[a], &self.tables.cores[b]) {
                (Some(ga), Some(gb)) => ga.caches.shares_l4(&gb.caches),
                _ => false,
            },
        }
    }

    fn probed(&self) -> impl Iterator<Item = (usize, &CoreGeometry)> {
        self.tables.cores[..self.core_count()]
            .iter()
            .enumerate()
            .filter_map(|(index, geometry)| geometry.as_ref().map(|g| (index, g)))
    }
}

/// `index` is below `MAX_CORES`, which fits a `u32`.
#[allow(clippy::cast_possible_truncation)]
const fn core_at(index: usize) -> CoreId {
    CoreId::new(index as u32)
}

#[allow(clippy::cast_possible_truncation)]
const fn numa_at(index: usize) -> NumaNodeId {
    NumaNodeId::new(index as u32)
}
