//! Security domain declarations.
//!
//! Every policy field has a zero-valued `Undefined` variant, and a
//! default-constructed [`SecurityDomain`] carries nothing but those. A field
//! the declaration forgot is therefore visible to validation, never silently
//! replaced by a default.

use core::fmt;
use kernel_info::limits::{MAX_DEPENDENCIES, MAX_DOMAIN_NAME_LEN, MAX_SECURITY_LEVEL};
use kernel_info::{CoreSet, DomainId};
use kernel_topology::CacheIsolation;

/// Failed domain declaration or graph insertion.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("domain graph is full ({max} domains)", max = kernel_info::limits::MAX_DOMAINS)]
    GraphFull,
    #[error("domain name of {0} bytes exceeds {max} bytes", max = MAX_DOMAIN_NAME_LEN)]
    NameTooLong(usize),
    #[error("{0} declares more than {max} dependencies", max = MAX_DEPENDENCIES)]
    TooManyDependencies(DomainId),
}

/// Policy-defined ordinal. `1..=MAX_SECURITY_LEVEL`; zero is undefined.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct SecurityLevel(u8);

impl SecurityLevel {
    pub const UNDEFINED: Self = Self(0);
    pub const MAX: Self = Self(MAX_SECURITY_LEVEL);

    /// `None` outside `1..=MAX_SECURITY_LEVEL`.
    #[must_use]
    pub const fn new(level: u8) -> Option<Self> {
        if level == 0 || level > MAX_SECURITY_LEVEL {
            None
        } else {
            Some(Self(level))
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_defined(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "level {}", self.0)
    }
}

/// Cache isolation a domain demands from every core outside it.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
#[repr(u8)]
pub enum IsolationRequirement {
    #[default]
    Undefined = 0,
    /// May share every cache.
    None,
    /// Private L1.
    L1,
    /// Private L1 and L2.
    L2,
    /// Private L1, L2 and L3.
    L3,
    /// No shared cache at any level.
    Full,
}

impl IsolationRequirement {
    /// Minimum matrix level that satisfies the requirement.
    #[must_use]
    pub const fn level(self) -> Option<CacheIsolation> {
        match self {
            Self::Undefined => None,
            Self::None => Some(CacheIsolation::None),
            Self::L1 => Some(CacheIsolation::L1),
            Self::L2 => Some(CacheIsolation::L2),
            Self::L3 => Some(CacheIsolation::L3),
            Self::Full => Some(CacheIsolation::Full),
        }
    }
}

/// How a domain's memory may be shared.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[repr(u8)]
pub enum MemoryDomainType {
    #[default]
    Undefined = 0,
    Isolated,
    SharedRead,
    SharedWrite,
}

/// Who may preempt tasks of a domain.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[repr(u8)]
pub enum PreemptionPolicy {
    #[default]
    Undefined = 0,
    /// Tasks run to completion.
    Never,
    /// Only strictly higher security levels.
    ByHigher,
    /// Same or higher security levels.
    BySame,
    ByAny,
}

/// Whether all cores of a domain must sit on one NUMA node.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[repr(u8)]
pub enum NumaLocality {
    #[default]
    Undefined = 0,
    Local,
    Any,
}

pub type DomainName = heapless::String<MAX_DOMAIN_NAME_LEN>;
pub type DependencySet = heapless::Vec<DomainId, MAX_DEPENDENCIES>;

/// One trust boundary.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SecurityDomain {
    pub id: DomainId,
    pub name: DomainName,
    pub level: SecurityLevel,
    pub isolation: IsolationRequirement,
    pub memory: MemoryDomainType,
    pub numa: NumaLocality,
    pub preemption: PreemptionPolicy,
    pub cores: CoreSet,
    /// Domains that must be valid before this one.
    pub dependencies: DependencySet,
}

impl SecurityDomain {
    /// A declaration with only the id filled in.
    #[must_use]
    pub fn new(id: DomainId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// # Errors
    /// [`DomainError::NameTooLong`] if the name does not fit; the current
    /// name is kept.
    pub fn set_name(&mut self, name: &str) -> Result<(), DomainError> {
        let mut owned = DomainName::new();
        owned
            .push_str(name)
            .map_err(|()| DomainError::NameTooLong(name.len()))?;
        self.name = owned;
        Ok(())
    }

    /// # Errors
    /// See [`SecurityDomain::set_name`].
    pub fn with_name(mut self, name: &str) -> Result<Self, DomainError> {
        self.set_name(name)?;
        Ok(self)
    }

    #[must_use]
    pub const fn with_level(mut self, level: SecurityLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub const fn with_isolation(mut self, isolation: IsolationRequirement) -> Self {
        self.isolation = isolation;
        self
    }

    #[must_use]
    pub const fn with_memory(mut self, memory: MemoryDomainType) -> Self {
        self.memory = memory;
        self
    }

    #[must_use]
    pub const fn with_numa(mut self, numa: NumaLocality) -> Self {
        self.numa = numa;
        self
    }

    #[must_use]
    pub const fn with_preemption(mut self, preemption: PreemptionPolicy) -> Self {
        self.preemption = preemption;
        self
    }

    #[must_use]
    pub const fn with_cores(mut self, cores: CoreSet) -> Self {
        self.cores = cores;
        self
    }

    /// # Errors
    /// [`DomainError::TooManyDependencies`] once the set is full.
    pub fn with_dependency(mut self, dependency: DomainId) -> Result<Self, DomainError> {
        self.dependencies
            .push(dependency)
            .map_err(|_| DomainError::TooManyDependencies(self.id))?;
        Ok(self)
    }

    #[must_use]
    pub fn depends_on(&self, other: DomainId) -> bool {
        self.dependencies.contains(&other)
    }

    /// Fields still at their undefined sentinel, in declaration order.
    pub fn undefined_fields(&self) -> impl Iterator<Item = DomainField> + '_ {
        [
            (DomainField::Id, !self.id.is_valid()),
            (DomainField::Name, self.name.is_empty()),
            (DomainField::SecurityLevel, !self.level.is_defined()),
            (
                DomainField::CacheIsolation,
                self.isolation == IsolationRequirement::Undefined,
            ),
            (
                DomainField::MemoryType,
                self.memory == MemoryDomainType::Undefined,
            ),
            (DomainField::NumaLocality, self.numa == NumaLocality::Undefined),
            (
                DomainField::Preemption,
                self.preemption == PreemptionPolicy::Undefined,
            ),
            (DomainField::Cores, !self.cores.is_explicit()),
        ]
        .into_iter()
        .filter_map(|(field, missing)| missing.then_some(field))
    }
}

/// A declaration field that must be set explicitly.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum DomainField {
    Id,
    Name,
    SecurityLevel,
    CacheIsolation,
    MemoryType,
    NumaLocality,
    Preemption,
    Cores,
}

impl DomainField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::SecurityLevel => "security level",
            Self::CacheIsolation => "cache isolation",
            Self::MemoryType => "memory type",
            Self::NumaLocality => "NUMA locality",
            Self::Preemption => "preemption policy",
            Self::Cores => "core set",
        }
    }
}

impl fmt::Display for DomainField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_info::CoreId;

    #[test]
    fn fresh_declaration_is_all_undefined() {
        let domain = SecurityDomain::default();
        let missing: Vec<_> = domain.undefined_fields().collect();
        assert_eq!(
            missing,
            [
                DomainField::Id,
                DomainField::Name,
                DomainField::SecurityLevel,
                DomainField::CacheIsolation,
                DomainField::MemoryType,
                DomainField::NumaLocality,
                DomainField::Preemption,
                DomainField::Cores,
            ]
        );
    }

    #[test]
    fn complete_declaration_has_nothing_missing() {
        let domain = SecurityDomain::new(DomainId::new(3))
            .with_name("crypto")
            .unwrap()
            .with_level(SecurityLevel::new(5).unwrap())
            .with_isolation(IsolationRequirement::L2)
            .with_memory(MemoryDomainType::Isolated)
            .with_numa(NumaLocality::Any)
            .with_preemption(PreemptionPolicy::Never)
            .with_cores(CoreSet::declared([CoreId::new(1)]).unwrap());
        assert_eq!(domain.undefined_fields().count(), 0);
    }

    #[test]
    fn levels_are_bounded() {
        assert_eq!(SecurityLevel::new(0), None);
        assert_eq!(SecurityLevel::new(MAX_SECURITY_LEVEL + 1), None);
        assert!(SecurityLevel::new(3) < SecurityLevel::new(7));
        assert_eq!(SecurityLevel::default(), SecurityLevel::UNDEFINED);
    }

    #[test]
    fn long_names_are_refused() {
        let mut domain = SecurityDomain::new(DomainId::new(1));
        domain.set_name("net").unwrap();
        let long = "x".repeat(MAX_DOMAIN_NAME_LEN + 1);
        assert_eq!(
            domain.set_name(&long),
            Err(DomainError::NameTooLong(MAX_DOMAIN_NAME_LEN + 1))
        );
        assert_eq!(domain.name.as_str(), "net");
    }

    #[test]
    fn dependency_set_is_bounded() {
        let mut domain = SecurityDomain::new(DomainId::new(1));
        for i in 0..MAX_DEPENDENCIES {
            domain = domain.with_dependency(DomainId::new(i as u32 + 2)).unwrap();
        }
        assert!(domain.depends_on(DomainId::new(2)));
        assert_eq!(
            domain.with_dependency(DomainId::new(99)),
            Err(DomainError::TooManyDependencies(DomainId::new(1)))
        );
    }

    #[test]
    fn requirement_maps_to_matrix_level() {
        assert_eq!(IsolationRequirement::Undefined.level(), None);
        assert_eq!(IsolationRequirement::None.level(), Some(CacheIsolation::None));
        assert_eq!(IsolationRequirement::Full.level(), Some(CacheIsolation::Full));
        assert!(IsolationRequirement::L3 > IsolationRequirement::L2);
    }
}
