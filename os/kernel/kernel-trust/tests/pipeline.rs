//! The full boot pipeline from recorded CPUID to scheduling decisions.

use kernel_cpuid::{CpuidProvider, CpuidResult, CpuidTable, PlatformFacts};
use kernel_domains::{
    IsolationRequirement, MemoryDomainType, NumaLocality, PreemptionPolicy, SecurityDomain,
    SecurityLevel,
};
use kernel_facts::BootFactsError;
use kernel_info::limits::MAX_NUMA_NODES;
use kernel_info::{CoreId, CoreSet, DomainId, NumaNodeId, SocketId, TaskId};
use kernel_sched::{PreemptionDecision, Task};
use kernel_topology::{
    CacheDomains, CoreGeometry, CoreTable, LOCAL_NUMA_DISTANCE, TopologyError,
};
use kernel_trust::{TrustAnchor, TrustError};
use kernel_validation::{SealError, Severity};

type Table = CpuidTable<16>;

/// Four cores, one thread each, AES-NI and RDRAND, private L1d and L2.
fn cpuid() -> Table {
    let mut t = Table::new();
    let mut put = |leaf, subleaf, r| t.insert(leaf, subleaf, r).unwrap();
    put(0, 0, CpuidResult::new(0x0B, 0x756e_6547, 0x6c65_746e, 0x4965_6e69));
    put(1, 0, CpuidResult::new(0x0009_06ea, 0, (1 << 25) | (1 << 30), 1 << 19));
    put(4, 0, CpuidResult::new(0x0000_0121, 0x01c0_003f, 63, 0));
    put(4, 1, CpuidResult::new(0x0000_0143, 0x03c0_003f, 1023, 0));
    put(0xB, 0, CpuidResult::new(0, 1, 0x0100, 0));
    put(0xB, 1, CpuidResult::new(2, 4, 0x0201, 0));
    t
}

fn platform() -> PlatformFacts {
    PlatformFacts {
        total_memory_mb: Some(16 * 1024),
        numa_nodes: Some(1),
        uefi_boot: true,
        secure_boot: true,
    }
}

fn cores(count: usize) -> CoreTable {
    let mut row = [0; MAX_NUMA_NODES];
    row[0] = LOCAL_NUMA_DISTANCE;
    CoreTable::from_fn(count, |c| {
        let id = c.as_u32();
        CoreGeometry::new(SocketId::new(0), CacheDomains::new(id, id, 0), NumaNodeId::new(0), row)
            .with_frequency(3000, 3000)
    })
}

fn domain(id: u32, level: u8, preemption: PreemptionPolicy, on: &[u32]) -> SecurityDomain {
    SecurityDomain::new(DomainId::new(id))
        .with_name("domain")
        .unwrap()
        .with_level(SecurityLevel::new(level).unwrap())
        .with_isolation(IsolationRequirement::L2)
        .with_memory(MemoryDomainType::Isolated)
        .with_numa(NumaLocality::Local)
        .with_preemption(preemption)
        .with_cores(CoreSet::declared(on.iter().copied().map(CoreId::new)).unwrap())
}

fn policy() -> Vec<SecurityDomain> {
    vec![
        domain(1, 7, PreemptionPolicy::BySame, &[0, 1]),
        domain(2, 3, PreemptionPolicy::ByHigher, &[2, 3])
            .with_dependency(DomainId::new(1))
            .unwrap(),
    ]
}

#[test]
fn pipeline_establishes_a_bound_scheduler() {
    let table = cpuid();
    let provider = CpuidProvider::new(&table, platform());
    let anchor = TrustAnchor::new();

    let scheduler = anchor.establish(&provider, &cores(4), policy()).unwrap();
    assert!(anchor.is_established());
    assert!(scheduler.is_bound());

    let facts = anchor.boot_facts().unwrap();
    assert_eq!(facts.core_count(), 4);
    assert_eq!(facts.verdict(), Severity::Accept);
    assert!(facts.capabilities().constant_time());
    assert!(anchor.topology().unwrap().is_symmetric());
    assert!(anchor.domain_graph().unwrap().can_access(DomainId::new(2), DomainId::new(1)));

    let task = Task::new(TaskId::new(10), DomainId::new(2));
    assert!(scheduler.can_schedule_task(task, CoreId::new(3)));
    assert!(!scheduler.can_schedule_task(task, CoreId::new(0)));
    assert_eq!(
        scheduler.enforce_preemption(DomainId::new(1), DomainId::new(2), &|_: DomainId, _: DomainId| {}),
        PreemptionDecision::Allowed
    );

    let again = anchor.scheduler();
    assert!(again.can_schedule_task(task, CoreId::new(2)));
}

#[test]
fn pipeline_runs_once() {
    let table = cpuid();
    let provider = CpuidProvider::new(&table, platform());
    let anchor = TrustAnchor::new();
    anchor.establish(&provider, &cores(4), policy()).unwrap();

    assert_eq!(
        anchor.establish(&provider, &cores(4), policy()).err(),
        Some(TrustError::AlreadyEstablished)
    );
}

#[test]
fn rejected_policy_leaves_the_scheduler_unbound() {
    let table = cpuid();
    let provider = CpuidProvider::new(&table, platform());
    let anchor = TrustAnchor::new();
    let overlapping = vec![
        domain(1, 7, PreemptionPolicy::BySame, &[0, 1]),
        domain(2, 3, PreemptionPolicy::BySame, &[1, 2, 3]),
    ];

    assert_eq!(
        anchor.establish(&provider, &cores(4), overlapping).err(),
        Some(TrustError::DomainsRejected(SealError::ValidationFailed(
            Severity::HardFail
        )))
    );
    assert!(anchor.topology().is_some());
    assert!(anchor.domain_graph().is_none());
    assert!(!anchor.is_established());
    assert!(!anchor.scheduler().is_bound());
}

#[test]
fn missing_core_geometry_stops_the_pipeline() {
    let table = cpuid();
    let provider = CpuidProvider::new(&table, platform());
    let anchor = TrustAnchor::new();

    assert_eq!(
        anchor.establish(&provider, &cores(3), policy()).err(),
        Some(TrustError::Topology(TopologyError::ProbeFailed(CoreId::new(3))))
    );
    assert!(anchor.boot_facts().is_some());
    assert!(anchor.topology().is_none());
}

#[test]
fn silent_cpu_cannot_be_trusted() {
    let table = Table::new();
    let provider = CpuidProvider::new(&table, platform());
    let anchor = TrustAnchor::new();

    assert_eq!(
        anchor.establish(&provider, &cores(4), policy()).err(),
        Some(TrustError::BootFacts(BootFactsError::CpuDetectionFailed))
    );
    assert!(anchor.boot_facts().is_none());
}

#[test]
fn unowned_cores_are_never_schedulable() {
    let table = cpuid();
    let provider = CpuidProvider::new(&table, platform());
    let anchor = TrustAnchor::new();
    let partial = vec![domain(1, 7, PreemptionPolicy::Never, &[0, 1])];

    let scheduler = anchor.establish(&provider, &cores(4), partial).unwrap();
    for id in 0..32 {
        for core in [2, 3] {
            let task = Task::new(TaskId::new(id), DomainId::new(1));
            assert!(!scheduler.can_schedule_task(task, CoreId::new(core)));
        }
    }
}

static ANCHOR: TrustAnchor<'static> = TrustAnchor::new();

#[test]
fn static_anchor_serves_every_core() {
    let table = cpuid();
    let provider = CpuidProvider::new(&table, platform());
    ANCHOR.establish(&provider, &cores(4), policy()).unwrap();

    std::thread::scope(|s| {
        for core in 0..4_u32 {
            s.spawn(move || {
                let scheduler = ANCHOR.scheduler();
                let owner = if core < 2 { 1 } else { 2 };
                let task = Task::new(TaskId::new(u64::from(core)), DomainId::new(owner));
                assert!(scheduler.can_schedule_task(task, CoreId::new(core)));
            });
        }
    });
}

static SMALL_STACK_ANCHOR: TrustAnchor<'static> = TrustAnchor::new();

/// Stack size of the boot core.
const BOOT_STACK: usize = 64 * 1024;

#[test]
fn pipeline_fits_the_boot_stack() {
    let table = cpuid();
    let provider = CpuidProvider::new(&table, platform());
    let probe = cores(4);

    std::thread::scope(|s| {
        let boot = std::thread::Builder::new()
            .stack_size(BOOT_STACK)
            .spawn_scoped(s, || {
                SMALL_STACK_ANCHOR
                    .establish(&provider, &probe, policy())
                    .map(|scheduler| scheduler.is_bound())
            })
            .unwrap();
        assert_eq!(boot.join().unwrap(), Ok(true));
    });
    assert!(SMALL_STACK_ANCHOR.topology().unwrap().is_symmetric());
}
