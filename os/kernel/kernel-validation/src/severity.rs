use core::fmt;

/// Outcome of a validation pass, ordered by how bad it is.
///
/// `HardFail` blocks sealing and therefore blocks boot. `Warn` is logged and
/// boot continues.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
#[repr(u8)]
pub enum Severity {
    #[default]
    Accept = 0,
    Warn = 1,
    HardFail = 2,
}

impl Severity {
    /// The more severe of the two.
    #[inline]
    #[must_use]
    pub const fn worst(self, other: Self) -> Self {
        if (other as u8) > (self as u8) {
            other
        } else {
            self
        }
    }

    #[inline]
    #[must_use]
    pub const fn allows_boot(self) -> bool {
        !matches!(self, Self::HardFail)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "ACCEPT",
            Self::Warn => "WARN",
            Self::HardFail => "HARD_FAIL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_badness() {
        assert!(Severity::Accept < Severity::Warn);
        assert!(Severity::Warn < Severity::HardFail);
        assert_eq!(Severity::Warn.worst(Severity::Accept), Severity::Warn);
        assert_eq!(Severity::Warn.worst(Severity::HardFail), Severity::HardFail);
    }

    #[test]
    fn only_hard_fail_blocks_boot() {
        assert!(Severity::Accept.allows_boot());
        assert!(Severity::Warn.allows_boot());
        assert!(!Severity::HardFail.allows_boot());
    }
}
