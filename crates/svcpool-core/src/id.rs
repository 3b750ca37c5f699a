//! Handle and context identifiers

use core::fmt;

/// Logical address of a receiver within one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Handle(pub u32);

impl Handle {
    /// True for handles below the dynamic allocation range.
    #[inline]
    pub const fn is_fixed(self) -> bool {
        self.0 < crate::constants::FIRST_DYNAMIC_HANDLE
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

impl From<u32> for Handle {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Identifies one router (one process-level message space).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ContextId(pub u32);

impl ContextId {
    pub const LOCAL: Self = Self(crate::constants::LOCAL_CONTEXT);
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_range() {
        assert!(Handle(10).is_fixed());
        assert!(Handle(999).is_fixed());
        assert!(!Handle(1000).is_fixed());
    }

    #[test]
    fn test_display() {
        assert_eq!(Handle(1003).to_string(), "h1003");
        assert_eq!(ContextId::LOCAL.to_string(), "ctx0");
    }
}
