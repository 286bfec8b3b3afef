use core::fmt;
use kernel_info::limits::{CPU_BRAND_LEN, MAX_CACHE_LEVELS};

/// CPU manufacturer as reported by the vendor string.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum CpuVendor {
    Intel,
    Amd,
    #[default]
    Other,
}

impl CpuVendor {
    /// Classify a 12-byte vendor string such as `GenuineIntel`.
    #[must_use]
    pub fn from_vendor_string(vendor: &[u8]) -> Self {
        match vendor {
            b"GenuineIntel" => Self::Intel,
            b"AuthenticAMD" => Self::Amd,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Intel => "Intel",
            Self::Amd => "AMD",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for CpuVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type CpuBrand = heapless::String<CPU_BRAND_LEN>;

/// Who built the CPU and which model it is.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CpuIdentity {
    pub vendor: CpuVendor,
    /// Effective family.
    pub family: u16,
    /// Effective model.
    pub model: u8,
    pub stepping: u8,
    /// Brand string with padding trimmed; empty if the CPU reports none.
    pub brand: CpuBrand,
}

impl CpuIdentity {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            vendor: CpuVendor::Other,
            family: 0,
            model: 0,
            stepping: 0,
            brand: heapless::String::new(),
        }
    }
}

impl fmt::Display for CpuIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} family {:#x} model {:#x} stepping {}",
            self.vendor, self.family, self.model, self.stepping
        )?;
        if !self.brand.is_empty() {
            write!(f, " ({})", self.brand)?;
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CacheKind {
    Data,
    Instruction,
    Unified,
}

/// One data or unified cache level.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CacheLevelInfo {
    /// 1 for L1, 2 for L2, ...
    pub level: u8,
    pub kind: CacheKind,
    pub size_kb: u32,
    pub line_size: u16,
    pub ways: u16,
    /// Logical processors sharing one instance of this cache.
    pub shared_by: u16,
}

/// Data/unified cache levels, innermost first.
pub type CacheLevels = heapless::Vec<CacheLevelInfo, MAX_CACHE_LEVELS>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_strings_are_classified() {
        assert_eq!(CpuVendor::from_vendor_string(b"GenuineIntel"), CpuVendor::Intel);
        assert_eq!(CpuVendor::from_vendor_string(b"AuthenticAMD"), CpuVendor::Amd);
        assert_eq!(CpuVendor::from_vendor_string(b"HygonGenuine"), CpuVendor::Other);
    }

    #[test]
    fn identity_display_includes_brand() {
        let mut id = CpuIdentity {
            vendor: CpuVendor::Intel,
            family: 6,
            model: 0x55,
            stepping: 4,
            ..CpuIdentity::empty()
        };
        assert_eq!(id.to_string(), "Intel family 0x6 model 0x55 stepping 4");
        id.brand.push_str("Xeon").unwrap();
        assert_eq!(id.to_string(), "Intel family 0x6 model 0x55 stepping 4 (Xeon)");
    }
}
