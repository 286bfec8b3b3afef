use crate::domain::DomainField;
use kernel_info::limits::DOMAIN_FINDINGS_CAPACITY;
use kernel_info::{CoreId, DomainId};
use kernel_topology::CacheIsolation;
use kernel_validation::{Finding, Severity, ValidationContext};

/// Findings of a domain graph validation pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainFinding {
    #[error("{domain}: {field} not set")]
    FieldNotSet { domain: DomainId, field: DomainField },
    #[error("{0}: core set is empty")]
    CoresEmpty(DomainId),
    #[error("{0} is declared more than once")]
    DuplicateId(DomainId),
    #[error("{domain} claims {core}, which does not exist")]
    CoreNotExist { domain: DomainId, core: CoreId },
    #[error("{domain} claims cores already owned by {other}")]
    CoresOverlap { domain: DomainId, other: DomainId },
    #[error(
        "{domain} requires {required} isolation, but {inside} and {outside} are only isolated to {actual}"
    )]
    CacheIsolationUnsatisfiable {
        domain: DomainId,
        inside: CoreId,
        outside: CoreId,
        required: CacheIsolation,
        actual: CacheIsolation,
    },
    #[error("{0} requires NUMA-local cores but spans several nodes")]
    NumaConstraintViolated(DomainId),
    #[error("{domain} depends on unknown {dependency}")]
    DependencyNotExist {
        domain: DomainId,
        dependency: DomainId,
    },
    #[error("{0} depends on itself")]
    DependencySelf(DomainId),
    #[error("dependency cycle detected at {0}")]
    DependencyCircular(DomainId),
    #[error("{0} core(s) are not owned by any domain")]
    UnusedCores(usize),
    #[error("domains are placed on an asymmetric topology")]
    AsymmetricTopology,
}

impl Finding for DomainFinding {
    fn severity(&self) -> Severity {
        match self {
            Self::UnusedCores(_) | Self::AsymmetricTopology => Severity::Warn,
            _ => Severity::HardFail,
        }
    }
}

/// Result of [`DomainGraph::validate`](crate::DomainGraph::validate).
pub type DomainReport = ValidationContext<DomainFinding, DOMAIN_FINDINGS_CAPACITY>;
