//! Domain graph validation, sealing and queries on synthetic machines.

use kernel_domains::{
    DomainError, DomainField, DomainFinding, DomainGraph, DomainTable, IsolationRequirement, MemoryDomainType,
    NumaLocality, PreemptionPolicy, SecurityDomain, SecurityLevel,
};
use kernel_facts::{BootFacts, CacheKind, CacheLevelInfo, CacheLevels, CpuIdentity, FactTable};
use kernel_info::limits::{MAX_DOMAINS, MAX_NUMA_NODES};
use kernel_info::{CoreId, CoreSet, DomainId, NumaNodeId, SocketId};
use kernel_topology::{
    CacheDomains, CacheIsolation, CoreGeometry, CoreTable, LOCAL_NUMA_DISTANCE, Topology,
    TopologyTables,
};
use kernel_validation::{SealError, Severity};

fn facts(cores: u32, numa_nodes: u32) -> BootFacts {
    let mut caches = CacheLevels::new();
    caches
        .push(CacheLevelInfo {
            level: 3,
            kind: CacheKind::Unified,
            size_kb: 16 * 1024,
            line_size: 64,
            ways: 16,
            shared_by: 4,
        })
        .unwrap();
    let mut facts = BootFacts::new();
    facts
        .probe(&FactTable {
            identity: Some(CpuIdentity::empty()),
            caches: Some(caches),
            cores: Some(cores),
            numa_nodes: Some(numa_nodes),
            trng: true,
            secure_boot: true,
            ..FactTable::default()
        })
        .unwrap();
    facts.validate();
    facts.seal().unwrap()
}

/// Private L1 and L2 per core; one L3 and one NUMA node per `per_node` cores.
fn machine(cores: u32, per_node: u32) -> CoreTable {
    let nodes = cores.div_ceil(per_node) as usize;
    CoreTable::from_fn(cores as usize, |c| {
        let id = c.as_u32();
        let node = id / per_node;
        let mut row = [0; MAX_NUMA_NODES];
        for (i, d) in row.iter_mut().enumerate().take(nodes) {
            *d = if i == node as usize { LOCAL_NUMA_DISTANCE } else { 20 };
        }
        CoreGeometry::new(
            SocketId::new(0),
            CacheDomains::new(id, id, node),
            NumaNodeId::new(node),
            row,
        )
    })
}

fn topology<'f>(
    facts: &'f BootFacts,
    tables: &'f mut TopologyTables,
    table: &CoreTable,
) -> Topology<'f> {
    let mut topology = Topology::new(facts, tables);
    topology.probe_all_cores(table).unwrap();
    topology.build_cache_isolation_matrix().unwrap();
    assert!(topology.validate().allows_boot());
    topology.seal().unwrap()
}

fn cores(ids: &[u32]) -> CoreSet {
    CoreSet::declared(ids.iter().copied().map(CoreId::new)).unwrap()
}

fn d(id: u32) -> DomainId {
    DomainId::new(id)
}

fn domain(id: u32, level: u8, on: &[u32]) -> SecurityDomain {
    SecurityDomain::new(d(id))
        .with_name("domain")
        .unwrap()
        .with_level(SecurityLevel::new(level).unwrap())
        .with_isolation(IsolationRequirement::L2)
        .with_memory(MemoryDomainType::Isolated)
        .with_numa(NumaLocality::Any)
        .with_preemption(PreemptionPolicy::BySame)
        .with_cores(cores(on))
}

fn graph_of<'a>(
    topology: &'a Topology<'a>,
    table: &'a mut DomainTable,
    domains: Vec<SecurityDomain>,
) -> DomainGraph<'a, kernel_validation::Open> {
    let mut graph = DomainGraph::new(topology, table);
    for domain in domains {
        graph.add(domain).unwrap();
    }
    graph
}

#[test]
fn disjoint_domains_seal_and_answer_queries() {
    let facts = facts(4, 1);
    let mut tables = TopologyTables::new();
    let mut table = DomainTable::new();
    let topology = topology(&facts, &mut tables, &machine(4, 4));
    let mut graph = graph_of(
        &topology,
        &mut table,
        vec![domain(2, 3, &[2, 3]), domain(1, 5, &[0, 1])],
    );
    let report = graph.validate();
    assert_eq!(report.verdict(), Severity::Accept, "{:?}", report.findings());

    let graph = graph.seal().unwrap();
    assert_eq!(graph.len(), 2);
    assert_eq!(graph.owner_of(CoreId::new(0)).map(|d| d.id), Some(d(1)));
    assert_eq!(graph.owner_of(CoreId::new(3)).map(|d| d.id), Some(d(2)));
    assert!(graph.owner_of(CoreId::new(4)).is_none());
    assert_eq!(graph.get(d(2)).unwrap().level, SecurityLevel::new(3).unwrap());
    assert!(graph.get(d(9)).is_none());

    assert!(graph.cores_isolated(d(1), d(2)));
    assert!(!graph.cores_isolated(d(1), d(1)));
    assert!(!graph.cores_isolated(d(1), d(9)));

    // Any two sealed domains are disjoint.
    let domains = graph.domains();
    for (i, a) in domains.iter().enumerate() {
        for b in &domains[i + 1..] {
            assert!(!a.cores.intersects(&b.cores));
        }
    }
    assert_eq!(graph.boot_facts().core_count(), 4);
    assert_eq!(graph.verdict(), Severity::Accept);
}

#[test]
fn overlapping_core_is_a_hard_failure() {
    let facts = facts(4, 1);
    let mut tables = TopologyTables::new();
    let mut table = DomainTable::new();
    let topology = topology(&facts, &mut tables, &machine(4, 4));
    let mut graph = graph_of(&topology, &mut table, vec![domain(1, 3, &[0, 3]), domain(2, 3, &[3])]);
    let report = graph.validate();

    assert_eq!(report.verdict(), Severity::HardFail);
    assert!(report.findings().contains(&DomainFinding::CoresOverlap {
        domain: d(2),
        other: d(1)
    }));
    assert!(report.findings().contains(&DomainFinding::UnusedCores(2)));
    assert_eq!(
        graph.seal().unwrap_err().reason(),
        SealError::ValidationFailed(Severity::HardFail)
    );
}

#[test]
fn mutual_dependency_is_a_cycle() {
    let facts = facts(4, 1);
    let mut tables = TopologyTables::new();
    let mut table = DomainTable::new();
    let topology = topology(&facts, &mut tables, &machine(4, 4));
    let x = domain(1, 3, &[0, 1]).with_dependency(d(2)).unwrap();
    let y = domain(2, 3, &[2, 3]).with_dependency(d(1)).unwrap();
    let mut graph = graph_of(&topology, &mut table, vec![x, y]);
    let report = graph.validate();

    assert_eq!(report.verdict(), Severity::HardFail);
    assert!(report
        .findings()
        .iter()
        .any(|f| matches!(f, DomainFinding::DependencyCircular(_))));
}

#[test]
fn shared_l3_cannot_satisfy_full_isolation() {
    let facts = facts(2, 1);
    let mut tables = TopologyTables::new();
    let mut table = DomainTable::new();
    let topology = topology(&facts, &mut tables, &machine(2, 2));
    let strict = domain(1, 5, &[0]).with_isolation(IsolationRequirement::Full);
    let mut graph = graph_of(&topology, &mut table, vec![strict]);
    let report = graph.validate();

    assert_eq!(report.verdict(), Severity::HardFail);
    assert!(report.findings().contains(&DomainFinding::CacheIsolationUnsatisfiable {
        domain: d(1),
        inside: CoreId::new(0),
        outside: CoreId::new(1),
        required: CacheIsolation::Full,
        actual: CacheIsolation::L2,
    }));
}

#[test]
fn separate_l3_satisfies_full_isolation() {
    let facts = facts(4, 2);
    let mut tables = TopologyTables::new();
    let mut table = DomainTable::new();
    let topology = topology(&facts, &mut tables, &machine(4, 2));
    let strict = domain(1, 5, &[0, 1]).with_isolation(IsolationRequirement::Full);
    let mut graph = graph_of(&topology, &mut table, vec![strict, domain(2, 3, &[2, 3])]);
    assert_eq!(graph.validate().verdict(), Severity::Accept);
    let graph = graph.seal().unwrap();
    assert!(graph.cores_isolated(d(1), d(2)));
}

#[test]
fn missing_fields_are_reported_one_by_one() {
    let facts = facts(4, 1);
    let mut tables = TopologyTables::new();
    let mut table = DomainTable::new();
    let topology = topology(&facts, &mut tables, &machine(4, 4));
    let bare = SecurityDomain::new(d(1));
    let empty = domain(2, 3, &[]);
    let mut graph = graph_of(&topology, &mut table, vec![bare, empty, SecurityDomain::default()]);
    let report = graph.validate();

    assert_eq!(report.verdict(), Severity::HardFail);
    let missing_for = |id: DomainId| {
        report
            .findings()
            .iter()
            .filter(|f| matches!(f, DomainFinding::FieldNotSet { domain, .. } if *domain == id))
            .count()
    };
    assert_eq!(missing_for(d(1)), 7);
    assert_eq!(missing_for(DomainId::INVALID), 8);
    assert!(report.findings().contains(&DomainFinding::FieldNotSet {
        domain: d(1),
        field: DomainField::Preemption
    }));
    assert!(report.findings().contains(&DomainFinding::CoresEmpty(d(2))));
}

#[test]
fn duplicate_ids_and_unknown_cores_fail() {
    let facts = facts(4, 1);
    let mut tables = TopologyTables::new();
    let mut table = DomainTable::new();
    let topology = topology(&facts, &mut tables, &machine(4, 4));
    let mut graph = graph_of(
        &topology,
        &mut table,
        vec![domain(1, 3, &[0]), domain(1, 3, &[1]), domain(2, 3, &[2, 7])],
    );
    let report = graph.validate();
    assert!(report.findings().contains(&DomainFinding::DuplicateId(d(1))));
    assert!(report.findings().contains(&DomainFinding::CoreNotExist {
        domain: d(2),
        core: CoreId::new(7)
    }));
}

#[test]
fn numa_local_domains_stay_on_one_node() {
    let facts = facts(4, 2);
    let mut tables = TopologyTables::new();
    let mut table = DomainTable::new();
    let topology = topology(&facts, &mut tables, &machine(4, 2));
    let local = |id, on: &[u32]| {
        domain(id, 3, on)
            .with_numa(NumaLocality::Local)
            .with_isolation(IsolationRequirement::None)
    };
    let mut graph = graph_of(&topology, &mut table, vec![local(1, &[0]), local(2, &[1, 2]), local(3, &[3])]);
    let report = graph.validate();
    assert_eq!(
        report.findings(),
        &[DomainFinding::NumaConstraintViolated(d(2))]
    );
}

#[test]
fn dependency_references_are_checked() {
    let facts = facts(4, 1);
    let mut tables = TopologyTables::new();
    let mut table = DomainTable::new();
    let topology = topology(&facts, &mut tables, &machine(4, 4));
    let selfish = domain(1, 3, &[0, 1]).with_dependency(d(1)).unwrap();
    let dangling = domain(2, 3, &[2, 3]).with_dependency(d(42)).unwrap();
    let mut graph = graph_of(&topology, &mut table, vec![selfish, dangling]);
    let report = graph.validate();
    assert_eq!(
        report.findings(),
        &[
            DomainFinding::DependencySelf(d(1)),
            DomainFinding::DependencyNotExist {
                domain: d(2),
                dependency: d(42)
            },
        ]
    );
}

#[test]
fn validation_is_repeatable() {
    let facts = facts(4, 1);
    let mut tables = TopologyTables::new();
    let mut table = DomainTable::new();
    let topology = topology(&facts, &mut tables, &machine(4, 4));
    let x = domain(3, 3, &[0, 1]).with_dependency(d(1)).unwrap();
    let y = domain(1, 3, &[1]).with_dependency(d(3)).unwrap();
    let mut graph = graph_of(&topology, &mut table, vec![x, y, SecurityDomain::new(d(2))]);

    let first = graph.validate();
    let second = graph.validate();
    assert_eq!(first.verdict(), second.verdict());
    assert_eq!(first.findings(), second.findings());
    assert!(!first.is_empty());
}

#[test]
fn adding_after_validation_requires_another_pass() {
    let facts = facts(4, 1);
    let mut tables = TopologyTables::new();
    let mut table = DomainTable::new();
    let topology = topology(&facts, &mut tables, &machine(4, 4));
    let mut graph = graph_of(&topology, &mut table, vec![domain(1, 3, &[0, 1])]);
    assert!(graph.validate().allows_boot());
    graph.add(domain(2, 3, &[2, 3])).unwrap();

    let rejected = graph.seal().unwrap_err();
    assert_eq!(rejected.reason(), SealError::NotValidated);
    let mut graph = rejected.into_inner();
    assert_eq!(graph.validate().verdict(), Severity::Accept);
    assert!(graph.seal().is_ok());
}

#[test]
fn graph_capacity_is_enforced() {
    let facts = facts(4, 1);
    let mut tables = TopologyTables::new();
    let mut table = DomainTable::new();
    let topology = topology(&facts, &mut tables, &machine(4, 4));
    let mut graph = DomainGraph::new(&topology, &mut table);
    for id in 0..MAX_DOMAINS {
        graph.add(SecurityDomain::new(d(id as u32))).unwrap();
    }
    assert_eq!(
        graph.add(SecurityDomain::new(d(1000))),
        Err(DomainError::GraphFull)
    );
    assert_eq!(graph.len(), MAX_DOMAINS);
}

#[test]
fn table_is_cleared_for_a_new_graph() {
    let facts = facts(4, 1);
    let mut tables = TopologyTables::new();
    let mut table = DomainTable::new();
    let topology = topology(&facts, &mut tables, &machine(4, 4));

    let mut graph = graph_of(&topology, &mut table, vec![domain(1, 3, &[0, 1])]);
    assert!(graph.validate().allows_boot());
    assert!(graph.seal().unwrap().owner_of(CoreId::new(0)).is_some());

    let mut graph = graph_of(&topology, &mut table, vec![domain(2, 3, &[2])]);
    assert_eq!(graph.len(), 1);
    assert!(graph.validate().allows_boot());
    let graph = graph.seal().unwrap();
    assert!(graph.owner_of(CoreId::new(0)).is_none());
    assert_eq!(graph.owner_of(CoreId::new(2)).map(|d| d.id), Some(d(2)));
}

#[test]
fn access_follows_dependencies_only() {
    let facts = facts(4, 1);
    let mut tables = TopologyTables::new();
    let mut table = DomainTable::new();
    let topology = topology(&facts, &mut tables, &machine(4, 4));
    let a = domain(1, 5, &[0]).with_dependency(d(2)).unwrap();
    let b = domain(2, 4, &[1]).with_dependency(d(3)).unwrap();
    let c = domain(3, 3, &[2, 3]);
    let mut graph = graph_of(&topology, &mut table, vec![a, b, c]);
    assert!(graph.validate().allows_boot());
    let graph = graph.seal().unwrap();

    assert!(graph.can_access(d(1), d(3)));
    assert!(graph.can_access(d(2), d(3)));
    assert!(!graph.can_access(d(3), d(1)));
    assert!(graph.can_access(d(2), d(2)));
    assert!(!graph.can_access(d(1), d(9)));
    assert!(!graph.can_access(d(9), d(9)));

    for x in [1, 2, 3] {
        for y in [1, 2, 3] {
            if x != y {
                assert!(!(graph.can_access(d(x), d(y)) && graph.can_access(d(y), d(x))));
            }
        }
    }
}

#[test]
fn findings_read_well() {
    assert_eq!(
        DomainFinding::CoresOverlap {
            domain: d(2),
            other: d(1)
        }
        .to_string(),
        "domain#2 claims cores already owned by domain#1"
    );
    assert_eq!(
        DomainFinding::FieldNotSet {
            domain: DomainId::INVALID,
            field: DomainField::SecurityLevel
        }
        .to_string(),
        "domain#<invalid>: security level not set"
    );
}
