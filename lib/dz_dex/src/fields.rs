//! Dalvik class fields data structures.

use crate::errors::{DexError, DexResult};
use crate::types::TypeIdItem;
use crate::{Dex, DexIndex, Index, PrettyPrint};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A field reference: defining class, field type and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIdItem {
    pub(crate) class_idx: Index<TypeIdItem>,
    pub(crate) type_idx: Index<TypeIdItem>,
    pub(crate) name: String,
}

impl DexIndex for Index<FieldIdItem> {
    type T = FieldIdItem;

    fn get(self, dex: &Dex) -> DexResult<&Self::T> {
        dex.field_id_items
            .get(self.as_usize())
            .ok_or_else(|| DexError::ResNotFound("FieldIdItem".to_string()))
    }
}

impl FieldIdItem {
    #[inline]
    #[must_use]
    pub const fn class_idx(&self) -> Index<TypeIdItem> {
        self.class_idx
    }

    #[inline]
    #[must_use]
    pub const fn type_idx(&self) -> Index<TypeIdItem> {
        self.type_idx
    }

    /// Descriptor of the class type that defines the field.
    pub fn class_descriptor<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        Ok(self.class_idx.get(dex)?.descriptor())
    }

    pub fn type_descriptor<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        Ok(self.type_idx.get(dex)?.descriptor())
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PrettyPrint for FieldIdItem {
    fn pp(&self, f: &mut fmt::Formatter, dex: &Dex) -> DexResult<()> {
        let class = self.class_descriptor(dex)?;
        let typ = self.type_descriptor(dex)?;
        write!(f, "{class}->{}:{typ}", self.name)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedField {
    pub(crate) field_idx: Index<FieldIdItem>,
    pub(crate) access_flags: FieldFlags,
}

impl EncodedField {
    #[must_use]
    pub const fn new(field_idx: Index<FieldIdItem>, access_flags: FieldFlags) -> Self {
        Self {
            field_idx,
            access_flags,
        }
    }

    #[inline]
    #[must_use]
    pub const fn index(&self) -> Index<FieldIdItem> {
        self.field_idx
    }

    pub fn descriptor<'a>(&self, dex: &'a Dex) -> DexResult<&'a FieldIdItem> {
        self.field_idx.get(dex)
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> FieldFlags {
        self.access_flags
    }
}

bitflags! {
    pub struct FieldFlags: u32 {
        const ACC_PUBLIC                = 0x00001;
        const ACC_PRIVATE               = 0x00002;
        const ACC_PROTECTED             = 0x00004;
        const ACC_STATIC                = 0x00008;
        const ACC_FINAL                 = 0x00010;
        const ACC_VOLATILE              = 0x00040;
        const ACC_TRANSIENT             = 0x00080;
        const ACC_SYNTHETIC             = 0x01000;
        const ACC_ENUM                  = 0x04000;
    }
}

flags_serde!(FieldFlags);
