//! Dalvik class methods data structures.

use crate::code::CodeItem;
use crate::errors::{DexError, DexResult};
use crate::types::{ProtoIdItem, TypeIdItem};
use crate::{Dex, DexIndex, Index, PrettyPrint};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A method reference: defining class, prototype and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodIdItem {
    pub(crate) class_idx: Index<TypeIdItem>,
    pub(crate) proto_idx: Index<ProtoIdItem>,
    pub(crate) name: String,
}

impl DexIndex for Index<MethodIdItem> {
    type T = MethodIdItem;

    fn get(self, dex: &Dex) -> DexResult<&Self::T> {
        dex.method_id_items
            .get(self.as_usize())
            .ok_or_else(|| DexError::ResNotFound("MethodIdItem".to_string()))
    }
}

impl MethodIdItem {
    #[inline]
    #[must_use]
    pub const fn class_idx(&self) -> Index<TypeIdItem> {
        self.class_idx
    }

    #[inline]
    #[must_use]
    pub const fn proto_idx(&self) -> Index<ProtoIdItem> {
        self.proto_idx
    }

    /// Descriptor of the type that defined the method.
    /// According to the Dalvik documentation, this must be a class type or an array type.
    pub fn class_descriptor<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        Ok(self.class_idx.get(dex)?.descriptor())
    }

    pub fn proto<'a>(&self, dex: &'a Dex) -> DexResult<&'a ProtoIdItem> {
        self.proto_idx.get(dex)
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `name(params)ret` signature, which identifies a method inside its class.
    pub fn short_string(&self, dex: &Dex) -> DexResult<String> {
        Ok(format!("{}{}", self.name, self.proto(dex)?.descriptor(dex)?))
    }

    /// The `Lcls;->name(params)ret` form, which identifies a method globally.
    pub fn full_string(&self, dex: &Dex) -> DexResult<String> {
        Ok(format!(
            "{}->{}",
            self.class_descriptor(dex)?,
            self.short_string(dex)?
        ))
    }
}

impl PrettyPrint for MethodIdItem {
    fn pp(&self, f: &mut fmt::Formatter, dex: &Dex) -> DexResult<()> {
        write!(f, "{}", self.full_string(dex)?)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedMethod {
    pub(crate) method_idx: Index<MethodIdItem>,
    pub(crate) access_flags: MethodFlags,
    #[serde(default)]
    pub(crate) code: Option<CodeItem>,
}

impl EncodedMethod {
    #[must_use]
    pub const fn new(
        method_idx: Index<MethodIdItem>,
        access_flags: MethodFlags,
        code: Option<CodeItem>,
    ) -> Self {
        Self {
            method_idx,
            access_flags,
            code,
        }
    }

    #[inline]
    #[must_use]
    pub const fn index(&self) -> Index<MethodIdItem> {
        self.method_idx
    }

    pub fn descriptor<'a>(&self, dex: &'a Dex) -> DexResult<&'a MethodIdItem> {
        self.method_idx.get(dex)
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> MethodFlags {
        self.access_flags
    }

    #[inline]
    #[must_use]
    pub const fn code(&self) -> Option<&CodeItem> {
        self.code.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodFlags::ACC_STATIC)
    }
}

bitflags! {
    pub struct MethodFlags: u32 {
        const ACC_PUBLIC                = 0x00001;
        const ACC_PRIVATE               = 0x00002;
        const ACC_PROTECTED             = 0x00004;
        const ACC_STATIC                = 0x00008;
        const ACC_FINAL                 = 0x00010;
        const ACC_SYNCHRONIZED          = 0x00020;
        const ACC_BRIDGE                = 0x00040;
        const ACC_VARARGS               = 0x00080;
        const ACC_NATIVE                = 0x00100;
        const ACC_ABSTRACT              = 0x00400;
        const ACC_STRICT                = 0x00800;
        const ACC_SYNTHETIC             = 0x01000;
        const ACC_CONSTRUCTOR           = 0x10000;
        const ACC_DECLARED_SYNCHRONIZED = 0x20000;
    }
}

flags_serde!(MethodFlags);

impl MethodFlags {
    /// A virtual method without any of the three visibility modifiers is package-private.
    #[must_use]
    pub fn is_package_private(self) -> bool {
        !self.intersects(Self::ACC_PUBLIC | Self::ACC_PRIVATE | Self::ACC_PROTECTED)
    }
}
