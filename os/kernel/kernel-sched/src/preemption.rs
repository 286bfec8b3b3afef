//! Preemption policy.

use kernel_domains::{PreemptionPolicy, SecurityDomain, SecurityLevel};
use kernel_info::DomainId;

/// Performs the context switch once a preemption was allowed.
pub trait PreemptionHook {
    fn switch(&self, preempting: DomainId, preempted: DomainId);
}

impl<F> PreemptionHook for F
where
    F: Fn(DomainId, DomainId),
{
    fn switch(&self, preempting: DomainId, preempted: DomainId) {
        self(preempting, preempted);
    }
}

/// Outcome of [`Scheduler::enforce_preemption`](crate::Scheduler::enforce_preemption).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PreemptionDecision {
    /// The hook was invoked.
    Allowed,
    /// Nothing happened. The caller schedules elsewhere.
    Refused(PreemptionRefusal),
}

impl PreemptionDecision {
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Why a preemption was refused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreemptionRefusal {
    #[error("scheduler is not bound to a sealed policy")]
    Unbound,
    #[error("{0} is not part of the sealed policy")]
    UnknownDomain(DomainId),
    #[error("a domain does not preempt itself")]
    SameDomain,
    #[error("the preempted domain is never preempted")]
    PolicyNever,
    #[error("{preempting} does not outrank {preempted}")]
    LevelTooLow {
        preempting: SecurityLevel,
        preempted: SecurityLevel,
    },
    #[error("the preempted domain has no preemption policy")]
    PolicyUndefined,
}

/// Apply the preempted domain's policy.
///
/// # Errors
/// The refusal reason. Identity and lookup failures are the caller's.
pub const fn check_policy(
    preempting: &SecurityDomain,
    preempted: &SecurityDomain,
) -> Result<(), PreemptionRefusal> {
    let (by, of) = (preempting.level, preempted.level);
    let allowed = match preempted.preemption {
        PreemptionPolicy::Undefined => return Err(PreemptionRefusal::PolicyUndefined),
        PreemptionPolicy::Never => return Err(PreemptionRefusal::PolicyNever),
        PreemptionPolicy::ByHigher => by.as_u8() > of.as_u8(),
        PreemptionPolicy::BySame => by.as_u8() >= of.as_u8(),
        PreemptionPolicy::ByAny => true,
    };
    if allowed {
        Ok(())
    } else {
        Err(PreemptionRefusal::LevelTooLow {
            preempting: by,
            preempted: of,
        })
    }
}
