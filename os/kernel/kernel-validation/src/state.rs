//! Seal type-states.
//!
//! Boot facts, topology and domain graph are generic over a [`SealState`].
//! Mutation lives on the [`Open`] type, queries on the [`Sealed`] type, and
//! `seal()` consumes the former to produce the latter, so a query on
//! unsealed data or a mutation after sealing does not compile.

use crate::Severity;
use core::fmt;

/// Sealed trait pattern to restrict `SealState` impls to our markers.
mod sealed {
    pub trait Sealed {}
}

/// Marker trait for the two lifecycle states.
pub trait SealState: sealed::Sealed + Copy + Clone + Eq + fmt::Debug {
    const IS_SEALED: bool;
}

/// Still being populated, probed or validated.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Open;
impl sealed::Sealed for Open {}
impl SealState for Open {
    const IS_SEALED: bool = false;
}

/// Frozen. Read-only for the rest of the boot.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Sealed;
impl sealed::Sealed for Sealed {}
impl SealState for Sealed {
    const IS_SEALED: bool = true;
}

/// Why a `seal()` call was refused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SealError {
    #[error("not validated since the last modification")]
    NotValidated,
    #[error("last validation ended in {0}")]
    ValidationFailed(Severity),
}

/// A refused seal. Hands the unsealed value back to the caller.
pub struct SealRejected<T> {
    unsealed: T,
    reason: SealError,
}

impl<T> SealRejected<T> {
    #[must_use]
    pub const fn new(unsealed: T, reason: SealError) -> Self {
        Self { unsealed, reason }
    }

    #[must_use]
    pub const fn reason(&self) -> SealError {
        self.reason
    }

    /// Recover the value that could not be sealed.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.unsealed
    }
}

impl<T> fmt::Debug for SealRejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealRejected")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for SealRejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seal rejected: {}", self.reason)
    }
}

impl<T> core::error::Error for SealRejected<T> {}

/// Progress of a validate-then-seal lifecycle, shared by every sealable
/// structure.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum Validation {
    /// Never validated, or modified since.
    #[default]
    Pending,
    /// The most recent pass ended with this verdict.
    Done(Severity),
}

impl Validation {
    /// Check whether the recorded verdict permits sealing.
    ///
    /// # Errors
    /// [`SealError::NotValidated`] if pending, [`SealError::ValidationFailed`]
    /// if the last verdict was a hard failure.
    pub const fn permits_seal(self) -> Result<Severity, SealError> {
        match self {
            Self::Pending => Err(SealError::NotValidated),
            Self::Done(Severity::HardFail) => Err(SealError::ValidationFailed(Severity::HardFail)),
            Self::Done(verdict) => Ok(verdict),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_non_failing_verdicts_permit_sealing() {
        assert_eq!(
            Validation::Pending.permits_seal(),
            Err(SealError::NotValidated)
        );
        assert_eq!(
            Validation::Done(Severity::HardFail).permits_seal(),
            Err(SealError::ValidationFailed(Severity::HardFail))
        );
        assert_eq!(
            Validation::Done(Severity::Warn).permits_seal(),
            Ok(Severity::Warn)
        );
    }

    #[test]
    fn rejection_returns_the_value() {
        let rejected = SealRejected::new(7u32, SealError::NotValidated);
        assert_eq!(rejected.reason(), SealError::NotValidated);
        assert_eq!(rejected.into_inner(), 7);
    }

    #[test]
    fn markers_report_their_state() {
        const { assert!(!Open::IS_SEALED) };
        const { assert!(Sealed::IS_SEALED) };
    }
}
