//! Types definitions to address Dalvik registers.
//!
//! In Dalvik bytecode, registers (or register pairs) are addressed either on 8 or 16 bits.
//! To ease the bytecode manipulation, we define a [register](Reg) wrapper over an 16 bits integer.
//! This allows to differentiate registers from constant values in instruction operands.
//!
//! Finally, registers groups (lists or ranges) used by invoke-kind instructions are
//! defined in this module.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The register type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reg(u16);

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u8> for Reg {
    fn from(r: u8) -> Self {
        Self(u16::from(r))
    }
}

impl From<u16> for Reg {
    fn from(r: u16) -> Self {
        Self(r)
    }
}

impl From<Reg> for u16 {
    fn from(r: Reg) -> Self {
        r.0
    }
}

impl Reg {
    /// Returns the wrapped register slot number.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Returns the register slot as an index into per-register tables.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the following register.
    ///
    /// This function is used to address register pairs without manipulating slot
    /// numbers directly.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// An explicit list of registers, used for methods parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegList(Vec<Reg>);

impl fmt::Display for RegList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, reg) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{reg}")?;
        }
        write!(f, "}}")
    }
}

impl<T> From<Vec<T>> for RegList
where
    Reg: From<T>,
{
    fn from(args: Vec<T>) -> Self {
        Self(args.into_iter().map(Reg::from).collect())
    }
}

impl RegList {
    /// Checks if the list contains no register.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn get(&self, i: usize) -> Option<Reg> {
        self.0.get(i).copied()
    }

    /// Returns a new iterator over the registers list.
    pub fn iter(&self) -> impl Iterator<Item = Reg> + '_ {
        self.0.iter().copied()
    }
}

/// A range of register addresses, used to pass consecutive register slots as method parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegRange {
    first: Reg,
    count: u16,
}

impl fmt::Display for RegRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.count == 0 {
            write!(f, "{{}}")
        } else {
            write!(f, "{{{} .. v{}}}", self.first, self.first.0 + self.count - 1)
        }
    }
}

impl RegRange {
    /// Builds the range of `count` registers starting at `first`.
    #[must_use]
    pub fn new<R: Into<Reg>>(first: R, count: u16) -> Self {
        Self {
            first: first.into(),
            count,
        }
    }

    /// Returns the first register of the range.
    #[inline]
    #[must_use]
    pub const fn first(&self) -> Reg {
        self.first
    }

    /// Returns the number of registers in the range.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count as usize
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns a new iterator over the register range.
    pub fn iter(&self) -> impl Iterator<Item = Reg> {
        let first = self.first.0;
        (first..first + self.count).map(Reg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reg_list() {
        let list = RegList::from(vec![1u8, 4, 5]);
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(1), Some(Reg::from(4u8)));
        assert_eq!(format!("{list}"), "{v1, v4, v5}");
    }

    #[test]
    fn reg_range() {
        let range = RegRange::new(10u16, 3);
        let regs: Vec<u16> = range.iter().map(Reg::value).collect();
        assert_eq!(regs, vec![10, 11, 12]);
        assert_eq!(format!("{range}"), "{v10 .. v12}");
        assert!(RegRange::new(0u16, 0).iter().next().is_none());
    }
}
