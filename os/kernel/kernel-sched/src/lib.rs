//! # Scheduler Enforcement
//!
//! Binary legality decisions over a sealed [`Topology`](kernel_topology::Topology)
//! and [`DomainGraph`](kernel_domains::DomainGraph):
//!
//! * [`Scheduler::can_schedule_task`]: a task runs only on cores its own
//!   domain owns. Dependencies never grant placement on foreign cores.
//! * [`Scheduler::enforce_preemption`]: the preempted domain's policy
//!   decides. An allowed preemption calls the [`PreemptionHook`]; a refused
//!   one is a value, not an error.
//! * [`Scheduler::allowed_cores`]: core affinity of a task.
//!
//! An [`unbound`](Scheduler::unbound) scheduler refuses everything:
//!
//! ```rust
//! use kernel_info::{CoreId, DomainId, TaskId};
//! use kernel_sched::{PreemptionDecision, PreemptionRefusal, Scheduler, Task};
//!
//! let scheduler = Scheduler::unbound();
//! let task = Task::new(TaskId::new(1), DomainId::new(1));
//! assert!(!scheduler.can_schedule_task(task, CoreId::new(0)));
//! assert_eq!(
//!     scheduler.enforce_preemption(DomainId::new(2), DomainId::new(1), &|_: DomainId, _: DomainId| {}),
//!     PreemptionDecision::Refused(PreemptionRefusal::Unbound)
//! );
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod preemption;
mod scheduler;

pub use preemption::{PreemptionDecision, PreemptionHook, PreemptionRefusal, check_policy};
pub use scheduler::{Placement, SchedError, Scheduler, Task};
