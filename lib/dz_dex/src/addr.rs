//! Code address representation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An address inside a method bytecode, in 16-bit code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Addr(pub usize);

impl Addr {
    #[inline]
    #[must_use]
    pub const fn entry() -> Self {
        Self(0)
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl Addr {
    /// Applies a signed branch offset. Offsets going below the method entry are
    /// reported as [`None`].
    #[must_use]
    pub fn checked_offset(self, offset: i32) -> Option<Self> {
        if offset.is_negative() {
            self.0.checked_sub(offset.unsigned_abs() as usize).map(Self)
        } else {
            self.0.checked_add(offset.unsigned_abs() as usize).map(Self)
        }
    }

    #[must_use]
    pub const fn forward(self, units: usize) -> Self {
        Self(self.0 + units)
    }
}
