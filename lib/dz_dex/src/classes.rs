//! Dalvik classes data structures.

use crate::errors::DexResult;
use crate::fields::EncodedField;
use crate::methods::EncodedMethod;
use crate::types::TypeIdItem;
use crate::{Dex, DexIndex, Index};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// The Dalvik class definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDefItem {
    pub(crate) class_idx: Index<TypeIdItem>,
    pub(crate) access_flags: ClassFlags,
    #[serde(default)]
    pub(crate) superclass_idx: Option<Index<TypeIdItem>>,
    #[serde(default)]
    pub(crate) interfaces: Vec<Index<TypeIdItem>>,
    #[serde(default)]
    pub(crate) class_data: Option<ClassDataItem>,
}

impl ClassDefItem {
    #[must_use]
    pub const fn new(class_idx: Index<TypeIdItem>, access_flags: ClassFlags) -> Self {
        Self {
            class_idx,
            access_flags,
            superclass_idx: None,
            interfaces: Vec::new(),
            class_data: None,
        }
    }

    #[must_use]
    pub const fn with_superclass(mut self, superclass_idx: Index<TypeIdItem>) -> Self {
        self.superclass_idx = Some(superclass_idx);
        self
    }

    #[must_use]
    pub fn with_interface(mut self, interface_idx: Index<TypeIdItem>) -> Self {
        self.interfaces.push(interface_idx);
        self
    }

    #[must_use]
    pub fn with_class_data(mut self, class_data: ClassDataItem) -> Self {
        self.class_data = Some(class_data);
        self
    }

    #[inline]
    #[must_use]
    pub const fn class_idx(&self) -> Index<TypeIdItem> {
        self.class_idx
    }

    /// Returns the descriptor of the class, e.g. `Ljava/lang/Object;`.
    pub fn class_descriptor<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        Ok(self.class_idx.get(dex)?.descriptor())
    }

    /// Returns the flags of the class.
    #[inline]
    #[must_use]
    pub const fn flags(&self) -> ClassFlags {
        self.access_flags
    }

    #[inline]
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassFlags::ACC_INTERFACE)
    }

    /// Returns the descriptor of the superclass if it exists, returns [`None`] otherwise.
    pub fn superclass_descriptor<'a>(&self, dex: &'a Dex) -> DexResult<Option<&'a str>> {
        self.superclass_idx
            .map(|idx| Ok(idx.get(dex)?.descriptor()))
            .transpose()
    }

    /// Returns the descriptors of the interfaces directly implemented by the class.
    pub fn interface_descriptors<'a>(&self, dex: &'a Dex) -> DexResult<Vec<&'a str>> {
        self.interfaces
            .iter()
            .map(|idx| Ok(idx.get(dex)?.descriptor()))
            .collect()
    }

    #[inline]
    #[must_use]
    pub const fn class_data(&self) -> Option<&ClassDataItem> {
        self.class_data.as_ref()
    }
}

bitflags! {
    /// Dalvik class flags
    pub struct ClassFlags: u32 {
        const ACC_PUBLIC                = 0x00001;
        const ACC_PRIVATE               = 0x00002;
        const ACC_PROTECTED             = 0x00004;
        const ACC_STATIC                = 0x00008;
        const ACC_FINAL                 = 0x00010;
        const ACC_INTERFACE             = 0x00200;
        const ACC_ABSTRACT              = 0x00400;
        const ACC_SYNTHETIC             = 0x01000;
        const ACC_ANNOTATION            = 0x02000;
        const ACC_ENUM                  = 0x04000;
    }
}

flags_serde!(ClassFlags);

/// Dalvik class fields and methods data definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassDataItem {
    #[serde(default)]
    pub(crate) static_fields: Vec<EncodedField>,
    #[serde(default)]
    pub(crate) instance_fields: Vec<EncodedField>,
    #[serde(default)]
    pub(crate) direct_methods: Vec<EncodedMethod>,
    #[serde(default)]
    pub(crate) virtual_methods: Vec<EncodedMethod>,
}

impl ClassDataItem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_static_field(mut self, field: EncodedField) -> Self {
        self.static_fields.push(field);
        self
    }

    #[must_use]
    pub fn with_instance_field(mut self, field: EncodedField) -> Self {
        self.instance_fields.push(field);
        self
    }

    #[must_use]
    pub fn with_direct_method(mut self, method: EncodedMethod) -> Self {
        self.direct_methods.push(method);
        self
    }

    #[must_use]
    pub fn with_virtual_method(mut self, method: EncodedMethod) -> Self {
        self.virtual_methods.push(method);
        self
    }

    /// Returns an iterator over instance fields of the class.
    #[inline]
    pub fn iter_instance_fields(&self) -> impl Iterator<Item = &EncodedField> {
        self.instance_fields.iter()
    }

    /// Returns an iterator over direct methods of the class.
    #[inline]
    pub fn iter_direct_methods(&self) -> impl Iterator<Item = &EncodedMethod> {
        self.direct_methods.iter()
    }

    /// Returns an iterator over virtual methods of the class.
    #[inline]
    pub fn iter_virtual_methods(&self) -> impl Iterator<Item = &EncodedMethod> {
        self.virtual_methods.iter()
    }

    /// Returns an iterator over all methods declared in the class.
    #[inline]
    pub fn iter_methods(&self) -> impl Iterator<Item = &EncodedMethod> {
        self.iter_direct_methods()
            .chain(self.iter_virtual_methods())
    }
}
