//! Accumulating validation context.

use crate::Severity;
use core::fmt;
use log::{error, info, warn};

/// A typed validation finding.
///
/// Findings are only ever `Warn` or `HardFail`; a pass that records nothing
/// is the only way to get [`Severity::Accept`].
pub trait Finding: fmt::Display {
    fn severity(&self) -> Severity;
}

/// Fixed-capacity, append-only log of findings plus the worst severity seen.
///
/// Once `N` findings are stored, further findings are counted in
/// [`dropped`](Self::dropped) but still raise the verdict.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationContext<F, const N: usize> {
    findings: heapless::Vec<F, N>,
    dropped: usize,
    worst: Severity,
}

impl<F, const N: usize> Default for ValidationContext<F, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F, const N: usize> ValidationContext<F, N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            findings: heapless::Vec::new(),
            dropped: 0,
            worst: Severity::Accept,
        }
    }

    /// Worst severity recorded so far.
    #[inline]
    #[must_use]
    pub const fn verdict(&self) -> Severity {
        self.worst
    }

    #[inline]
    #[must_use]
    pub const fn allows_boot(&self) -> bool {
        self.worst.allows_boot()
    }

    /// Findings in the order they were recorded.
    #[inline]
    #[must_use]
    pub fn findings(&self) -> &[F] {
        &self.findings
    }

    /// Findings that did not fit into the log.
    #[inline]
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.findings.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty() && self.dropped == 0
    }

    /// Whether any stored finding matches.
    pub fn any(&self, predicate: impl Fn(&F) -> bool) -> bool {
        self.findings.iter().any(predicate)
    }
}

impl<F: Finding, const N: usize> ValidationContext<F, N> {
    /// Append a finding and raise the verdict. Returns the finding's severity.
    pub fn record(&mut self, finding: F) -> Severity {
        let severity = finding.severity();
        self.worst = self.worst.worst(severity);
        if self.findings.push(finding).is_err() {
            self.dropped += 1;
        }
        severity
    }

    /// Number of stored findings of the given severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity() == severity)
            .count()
    }

    /// Write every finding and the verdict to the boot log.
    pub fn log(&self, subsystem: &str) {
        for (i, finding) in self.findings.iter().enumerate() {
            match finding.severity() {
                Severity::HardFail => error!("{subsystem}: [{i}] {finding}"),
                Severity::Warn => warn!("{subsystem}: [{i}] {finding}"),
                Severity::Accept => info!("{subsystem}: [{i}] {finding}"),
            }
        }
        if self.dropped > 0 {
            warn!(
                "{subsystem}: {} further finding(s) exceeded the log capacity of {N}",
                self.dropped
            );
        }
        info!(
            "{subsystem}: {} finding(s), verdict {}",
            self.findings.len() + self.dropped,
            self.worst
        );
    }
}
