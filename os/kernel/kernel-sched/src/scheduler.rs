use crate::preemption::{PreemptionDecision, PreemptionHook, PreemptionRefusal, check_policy};
use core::ptr;
use kernel_domains::DomainGraph;
use kernel_info::{CoreId, CoreSet, DomainId, TaskId};
use kernel_topology::Topology;
use log::trace;

/// A schedulable unit and the domain it belongs to.
///
/// The domain is assigned by whatever creates the task and is trusted.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Task {
    pub id: TaskId,
    pub domain: DomainId,
}

impl Task {
    #[must_use]
    pub const fn new(id: TaskId, domain: DomainId) -> Self {
        Self { id, domain }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedError {
    #[error("domain graph was validated against a different topology")]
    TopologyMismatch,
}

/// Verdict of [`Scheduler::placement`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Placement {
    Allowed,
    Unbound,
    CoreNotPresent,
    /// No sealed domain owns the core.
    Unowned,
    /// The core belongs to another domain.
    ForeignCore { owner: DomainId },
}

impl Placement {
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Decision layer over a sealed topology and domain graph.
///
/// Holds shared references only; copies are free and every query is safe
/// from any number of cores at once.
#[derive(Copy, Clone, Debug)]
pub struct Scheduler<'a> {
    policy: Option<Policy<'a>>,
}

#[derive(Copy, Clone, Debug)]
struct Policy<'a> {
    topology: &'a Topology<'a>,
    graph: &'a DomainGraph<'a>,
}

impl Default for Scheduler<'_> {
    fn default() -> Self {
        Self::unbound()
    }
}

impl<'a> Scheduler<'a> {
    /// A scheduler that refuses everything.
    #[must_use]
    pub const fn unbound() -> Self {
        Self { policy: None }
    }

    /// # Errors
    /// [`SchedError::TopologyMismatch`] if `graph` was not built on `topology`.
    pub fn new(topology: &'a Topology<'a>, graph: &'a DomainGraph<'a>) -> Result<Self, SchedError> {
        if !ptr::eq(graph.topology(), topology) {
            return Err(SchedError::TopologyMismatch);
        }
        Ok(Self {
            policy: Some(Policy { topology, graph }),
        })
    }

    #[inline]
    #[must_use]
    pub const fn is_bound(&self) -> bool {
        self.policy.is_some()
    }

    /// Whether `task` may run on `core`.
    #[must_use]
    pub fn can_schedule_task(&self, task: Task, core: CoreId) -> bool {
        self.placement(task, core).is_allowed()
    }

    /// [`can_schedule_task`](Self::can_schedule_task) with the reason.
    #[must_use]
    pub fn placement(&self, task: Task, core: CoreId) -> Placement {
        let placement = self.place(task, core);
        if !placement.is_allowed() {
            trace!("sched: {} on {core} refused: {placement:?}", task.id);
        }
        placement
    }

    fn place(&self, task: Task, core: CoreId) -> Placement {
        let Some(policy) = self.policy else {
            return Placement::Unbound;
        };
        if !policy.topology.contains_core(core) {
            return Placement::CoreNotPresent;
        }
        match policy.graph.owner_of(core) {
            None => Placement::Unowned,
            Some(owner) if owner.id == task.domain => Placement::Allowed,
            Some(owner) => Placement::ForeignCore { owner: owner.id },
        }
    }

    /// Let `preempting` preempt `preempted` if the latter's policy allows it,
    /// invoking `hook` on success.
    pub fn enforce_preemption<H>(
        &self,
        preempting: DomainId,
        preempted: DomainId,
        hook: &H,
    ) -> PreemptionDecision
    where
        H: PreemptionHook + ?Sized,
    {
        match self.check_preemption(preempting, preempted) {
            Ok(()) => {
                hook.switch(preempting, preempted);
                PreemptionDecision::Allowed
            }
            Err(refusal) => {
                trace!("sched: {preempting} preempting {preempted} refused: {refusal}");
                PreemptionDecision::Refused(refusal)
            }
        }
    }

    fn check_preemption(
        &self,
        preempting: DomainId,
        preempted: DomainId,
    ) -> Result<(), PreemptionRefusal> {
        let policy = self.policy.ok_or(PreemptionRefusal::Unbound)?;
        let by = policy
            .graph
            .get(preempting)
            .ok_or(PreemptionRefusal::UnknownDomain(preempting))?;
        let of = policy
            .graph
            .get(preempted)
            .ok_or(PreemptionRefusal::UnknownDomain(preempted))?;
        if preempting == preempted {
            return Err(PreemptionRefusal::SameDomain);
        }
        check_policy(by, of)
    }

    /// Cores `task` may run on: those of its domain.
    #[must_use]
    pub fn allowed_cores(&self, task: Task) -> Option<&'a CoreSet> {
        let policy = self.policy?;
        policy.graph.get(task.domain).map(|domain| &domain.cores)
    }
}
