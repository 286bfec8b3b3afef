//! # Domain Graph
//!
//! Lifecycle: `Init → Populated → Validated → Sealed`.
//!
//! Domains are added to a [`DomainGraph<Open>`]; nothing is checked until
//! [`DomainGraph::validate`], because overlap and cycles only show on the
//! whole set. Sealing builds the core ownership map and yields the read-only
//! [`DomainGraph<Sealed>`].
//!
//! Declarations and the ownership map are kept in a caller-owned
//! [`DomainTable`].

use crate::domain::{DomainError, NumaLocality, SecurityDomain};
use crate::finding::{DomainFinding, DomainReport};
use core::marker::PhantomData;
use kernel_facts::BootFacts;
use kernel_info::limits::{MAX_CORES, MAX_DOMAINS};
use kernel_info::{CoreId, CoreSet, DomainId};
use kernel_topology::{CacheIsolation, Topology};
use kernel_validation::{Open, SealRejected, SealState, Sealed, Severity, Validation};
use log::{debug, info};

/// Backing storage of a [`DomainGraph`].
#[derive(Debug)]
pub struct DomainTable {
    domains: heapless::Vec<SecurityDomain, MAX_DOMAINS>,
    /// Index into `domains` of each core's owner. Filled at seal.
    owners: [Option<u8>; MAX_CORES],
}

impl DomainTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            domains: heapless::Vec::new(),
            owners: [None; MAX_CORES],
        }
    }
}

impl Default for DomainTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Security policy of the machine.
#[derive(Debug)]
pub struct DomainGraph<'a, S: SealState = Sealed> {
    topology: &'a Topology<'a, Sealed>,
    table: &'a mut DomainTable,
    validation: Validation,
    _state: PhantomData<S>,
}

impl<'a> DomainGraph<'a, Open> {
    /// An empty graph checked against `topology` and its boot facts, backed
    /// by `table`. Whatever `table` held before is cleared.
    #[must_use]
    pub fn new(topology: &'a Topology<'a, Sealed>, table: &'a mut DomainTable) -> Self {
        table.domains.clear();
        table.owners.fill(None);
        Self {
            topology,
            table,
            validation: Validation::Pending,
            _state: PhantomData,
        }
    }

    /// Append a declaration. Invalidates any earlier validation.
    ///
    /// # Errors
    /// [`DomainError::GraphFull`] at capacity; the graph is unchanged.
    pub fn add(&mut self, domain: SecurityDomain) -> Result<(), DomainError> {
        let id = domain.id;
        self.table
            .domains
            .push(domain)
            .map_err(|_| DomainError::GraphFull)?;
        self.validation = Validation::Pending;
        debug!("domains: added {id} ({} total)", self.len());
        Ok(())
    }

    /// Check the complete policy against the topology and against itself.
    ///
    /// Every step visits domains in ascending id order and every finding is
    /// kept, so two passes over the same graph report the same findings.
    pub fn validate(&mut self) -> DomainReport {
        let mut report = DomainReport::new();
        let order = self.ascending();

        self.check_fields(&order, &mut report);
        self.check_cores_exist(&order, &mut report);
        let claimed = self.check_overlap(&order, &mut report);
        self.check_isolation(&order, &mut report);
        self.check_numa(&order, &mut report);
        self.check_dependencies_exist(&order, &mut report);
        self.check_acyclic(&order, &mut report);

        let unused = self
            .topology
            .all_cores()
            .iter()
            .filter(|&core| !claimed.contains(core))
            .count();
        if unused > 0 {
            report.record(DomainFinding::UnusedCores(unused));
        }
        if !self.topology.is_symmetric() {
            report.record(DomainFinding::AsymmetricTopology);
        }

        self.validation = Validation::Done(report.verdict());
        report
    }

    /// Freeze the policy and record which domain owns which core.
    ///
    /// # Errors
    /// Hands the graph back if it was not validated since the last `add`,
    /// or if that validation failed.
    pub fn seal(mut self) -> Result<DomainGraph<'a, Sealed>, SealRejected<Self>> {
        let verdict = match self.validation.permits_seal() {
            Ok(verdict) => verdict,
            Err(reason) => return Err(SealRejected::new(self, reason)),
        };

        let DomainTable { domains, owners } = &mut *self.table;
        owners.fill(None);
        for (index, domain) in domains.iter().enumerate() {
            for core in &domain.cores {
                if let Some(slot) = owners.get_mut(core.index()) {
                    // `index` is below MAX_DOMAINS, which fits a u8.
                    *slot = u8::try_from(index).ok();
                }
            }
        }
        info!(
            "domains: graph sealed ({verdict}), {} domain(s)",
            self.len()
        );

        Ok(DomainGraph {
            topology: self.topology,
            table: self.table,
            validation: self.validation,
            _state: PhantomData,
        })
    }

    /// Positions into `domains`, by ascending id then insertion order.
    fn ascending(&self) -> heapless::Vec<u8, MAX_DOMAINS> {
        let mut order: heapless::Vec<u8, MAX_DOMAINS> = (0..self.len())
            .filter_map(|i| u8::try_from(i).ok())
            .collect();
        order.sort_unstable_by_key(|&i| (self.at(i).id, i));
        order
    }

    fn check_fields(&self, order: &[u8], report: &mut DomainReport) {
        for (n, &position) in order.iter().enumerate() {
            let domain = self.at(position);
            for field in domain.undefined_fields() {
                report.record(DomainFinding::FieldNotSet {
                    domain: domain.id,
                    field,
                });
            }
            if domain.cores.is_explicit() && domain.cores.is_empty() {
                report.record(DomainFinding::CoresEmpty(domain.id));
            }
            // Sorted, so a duplicate directly follows its first occurrence.
            if domain.id.is_valid() && n > 0 && self.at(order[n - 1]).id == domain.id {
                report.record(DomainFinding::DuplicateId(domain.id));
            }
        }
    }

    fn check_cores_exist(&self, order: &[u8], report: &mut DomainReport) {
        let booted = self.topology.boot_facts().core_count() as usize;
        for &position in order {
            let domain = self.at(position);
            if let Some(core) = domain
                .cores
                .iter()
                .find(|&core| core.index() >= booted || !self.topology.contains_core(core))
            {
                report.record(DomainFinding::CoreNotExist {
                    domain: domain.id,
                    core,
                });
            }
        }
    }

    /// Returns the union of every domain's cores.
    fn check_overlap(&self, order: &[u8], report: &mut DomainReport) -> CoreSet {
        let mut union = CoreSet::new();
        for (n, &position) in order.iter().enumerate() {
            let domain = self.at(position);
            if domain.cores.intersects(&union) {
                let other = order[..n]
                    .iter()
                    .map(|&p| self.at(p))
                    .find(|earlier| earlier.cores.intersects(&domain.cores));
                if let Some(other) = other {
                    report.record(DomainFinding::CoresOverlap {
                        domain: domain.id,
                        other: other.id,
                    });
                }
            } else {
                union.union_with(&domain.cores);
            }
        }
        // Unused cores are counted against every claim, overlapping ones too.
        for &position in order {
            union.union_with(&self.at(position).cores);
        }
        union
    }

    fn check_isolation(&self, order: &[u8], report: &mut DomainReport) {
        let all = self.topology.all_cores();
        for &position in order {
            let domain = self.at(position);
            let Some(required) = domain.isolation.level() else {
                continue;
            };
            if required == CacheIsolation::None {
                continue;
            }
            let counterexample = domain
                .cores
                .iter()
                .filter(|&core| self.topology.contains_core(core))
                .find_map(|inside| {
                    all.iter()
                        .filter(|&outside| !domain.cores.contains(outside))
                        .find_map(|outside| {
                            let actual = self.topology.isolation(inside, outside).ok()?;
                            (actual < required).then_some((inside, outside, actual))
                        })
                });
            if let Some((inside, outside, actual)) = counterexample {
                report.record(DomainFinding::CacheIsolationUnsatisfiable {
                    domain: domain.id,
                    inside,
                    outside,
                    required,
                    actual,
                });
            }
        }
    }

    fn check_numa(&self, order: &[u8], report: &mut DomainReport) {
        for &position in order {
            let domain = self.at(position);
            if domain.numa != NumaLocality::Local {
                continue;
            }
            let mut nodes = domain
                .cores
                .iter()
                .filter_map(|core| self.topology.numa_node(core).ok());
            if let Some(first) = nodes.next()
                && nodes.any(|node| node != first)
            {
                report.record(DomainFinding::NumaConstraintViolated(domain.id));
            }
        }
    }

    fn check_dependencies_exist(&self, order: &[u8], report: &mut DomainReport) {
        for &position in order {
            let domain = self.at(position);
            for &dependency in &domain.dependencies {
                if dependency == domain.id {
                    report.record(DomainFinding::DependencySelf(domain.id));
                } else if self.position_of(dependency).is_none() {
                    report.record(DomainFinding::DependencyNotExist {
                        domain: domain.id,
                        dependency,
                    });
                }
            }
        }
    }

    /// Iterative depth-first search with three colours. Roots are taken in
    /// ascending id order.
    fn check_acyclic(&self, order: &[u8], report: &mut DomainReport) {
        #[derive(Copy, Clone, Eq, PartialEq)]
        enum Colour {
            White,
            Grey,
            Black,
        }

        let mut colour = [Colour::White; MAX_DOMAINS];
        // (domain position, next dependency to follow)
        let mut stack: heapless::Vec<(u8, usize), MAX_DOMAINS> = heapless::Vec::new();

        for &root in order {
            if colour[usize::from(root)] != Colour::White {
                continue;
            }
            colour[usize::from(root)] = Colour::Grey;
            // The stack holds grey domains only, at most MAX_DOMAINS.
            let _ = stack.push((root, 0));

            while let Some(top) = stack.last_mut() {
                let (position, next) = *top;
                let domain = self.at(position);
                let Some(&dependency) = domain.dependencies.get(next) else {
                    colour[usize::from(position)] = Colour::Black;
                    stack.pop();
                    continue;
                };
                top.1 += 1;

                if dependency == domain.id {
                    continue;
                }
                let Some(target) = self.position_of(dependency) else {
                    continue;
                };
                match colour[usize::from(target)] {
                    Colour::White => {
                        colour[usize::from(target)] = Colour::Grey;
                        let _ = stack.push((target, 0));
                    }
                    Colour::Grey => {
                        report.record(DomainFinding::DependencyCircular(domain.id));
                    }
                    Colour::Black => {}
                }
            }
        }
    }
}

impl<'a> DomainGraph<'a, Sealed> {
    /// Domain with the given id.
    #[must_use]
    pub fn get(&self, id: DomainId) -> Option<&SecurityDomain> {
        self.position_of(id).map(|p| self.at(p))
    }

    /// Whether `to` is reachable from `from` along dependencies. Every
    /// known domain can access itself.
    #[must_use]
    pub fn can_access(&self, from: DomainId, to: DomainId) -> bool {
        let (Some(start), Some(goal)) = (self.position_of(from), self.position_of(to)) else {
            return false;
        };
        if start == goal {
            return true;
        }

        let mut visited: u64 = 1 << start;
        let mut stack: heapless::Vec<u8, MAX_DOMAINS> = heapless::Vec::new();
        let _ = stack.push(start);
        while let Some(position) = stack.pop() {
            for &dependency in &self.at(position).dependencies {
                let Some(next) = self.position_of(dependency) else {
                    continue;
                };
                if next == goal {
                    return true;
                }
                if visited & (1 << next) == 0 {
                    visited |= 1 << next;
                    // Each domain is pushed at most once.
                    let _ = stack.push(next);
                }
            }
        }
        false
    }

    /// Whether every core pair drawn one from each domain is isolated at
    /// least to the stricter of the two requirements. A domain is never
    /// isolated from itself.
    #[must_use]
    pub fn cores_isolated(&self, a: DomainId, b: DomainId) -> bool {
        let (Some(da), Some(db)) = (self.get(a), self.get(b)) else {
            return false;
        };
        if a == b {
            return false;
        }
        let Some(required) = da.isolation.max(db.isolation).level() else {
            return false;
        };
        da.cores.iter().all(|x| {
            db.cores.iter().all(|y| {
                self.topology
                    .can_isolate_cores(x, y, required)
                    .unwrap_or(false)
            })
        })
    }

    /// The domain owning `core`, if any.
    #[must_use]
    pub fn owner_of(&self, core: CoreId) -> Option<&SecurityDomain> {
        let position = (*self.table.owners.get(core.index())?)?;
        self.table.domains.get(usize::from(position))
    }

    /// Domains in insertion order.
    #[must_use]
    pub fn domains(&self) -> &[SecurityDomain] {
        &self.table.domains
    }

    #[must_use]
    pub const fn topology(&self) -> &'a Topology<'a, Sealed> {
        self.topology
    }

    #[must_use]
    pub const fn boot_facts(&self) -> &'a BootFacts<Sealed> {
        self.topology.boot_facts()
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

impl<S: SealState> DomainGraph<'_, S> {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.domains.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.domains.is_empty()
    }

    fn at(&self, position: u8) -> &SecurityDomain {
        &self.table.domains[usize::from(position)]
    }

    /// Position of the first domain with this id.
    fn position_of(&self, id: DomainId) -> Option<u8> {
        self.table
            .domains
            .iter()
            .position(|d| d.id == id)
            .and_then(|p| u8::try_from(p).ok())
    }
}
