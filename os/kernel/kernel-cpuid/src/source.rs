/// Register values returned by one `cpuid` invocation.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
#[repr(C)]
pub struct CpuidResult {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

impl CpuidResult {
    #[must_use]
    pub const fn new(eax: u32, ebx: u32, ecx: u32, edx: u32) -> Self {
        Self { eax, ebx, ecx, edx }
    }
}

/// Anything that can answer a `cpuid(leaf, subleaf)` query.
///
/// Leaves beyond the reported maximum return whatever the source returns;
/// callers check [`CpuidRanges`](crate::CpuidRanges) first.
pub trait CpuidSource {
    fn cpuid(&self, leaf: u32, subleaf: u32) -> CpuidResult;
}

impl<S: CpuidSource + ?Sized> CpuidSource for &S {
    #[inline]
    fn cpuid(&self, leaf: u32, subleaf: u32) -> CpuidResult {
        (**self).cpuid(leaf, subleaf)
    }
}

/// The `cpuid` instruction of the executing processor.
#[cfg(all(target_arch = "x86_64", feature = "native"))]
#[derive(Debug, Copy, Clone, Default)]
pub struct NativeCpuid;

#[cfg(all(target_arch = "x86_64", feature = "native"))]
impl CpuidSource for NativeCpuid {
    #[inline]
    #[allow(unsafe_code, unused_unsafe)]
    fn cpuid(&self, leaf: u32, subleaf: u32) -> CpuidResult {
        // SAFETY: `cpuid` is part of the x86-64 baseline.
        let r = unsafe { core::arch::x86_64::__cpuid_count(leaf, subleaf) };
        CpuidResult::new(r.eax, r.ebx, r.ecx, r.edx)
    }
}

/// A recorded CPUID dump, e.g. captured on a reference machine.
///
/// Unknown queries return all-zero registers, which every leaf decoder
/// treats as "feature absent".
#[derive(Debug, Clone, Default)]
pub struct CpuidTable<const N: usize> {
    entries: heapless::Vec<(u32, u32, CpuidResult), N>,
}

impl<const N: usize> CpuidTable<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    /// Record the answer for `(leaf, subleaf)`, replacing an earlier one.
    ///
    /// # Errors
    /// Returns the entry back if the table is full.
    pub fn insert(
        &mut self,
        leaf: u32,
        subleaf: u32,
        result: CpuidResult,
    ) -> Result<(), (u32, u32, CpuidResult)> {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(l, s, _)| *l == leaf && *s == subleaf)
        {
            entry.2 = result;
            return Ok(());
        }
        self.entries.push((leaf, subleaf, result))
    }
}

impl<const N: usize> CpuidSource for CpuidTable<N> {
    fn cpuid(&self, leaf: u32, subleaf: u32) -> CpuidResult {
        self.entries
            .iter()
            .find(|(l, s, _)| *l == leaf && *s == subleaf)
            .map(|(_, _, r)| *r)
            .unwrap_or_default()
    }
}
