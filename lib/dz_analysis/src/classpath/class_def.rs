//! Resolved class definitions and the raw class records they are built from.

use crate::errors::{AnalysisError, AnalysisResult};
use crate::uids::ClassUid;
use dz_dex::classes::{ClassDefItem, ClassFlags};
use dz_dex::Dex;
use std::collections::BTreeMap;
use std::rc::Rc;

/// A virtual method slot of a class vtable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualMethod {
    /// Class declaring the method.
    pub containing_class: String,
    /// Short signature `name(params)ret`.
    pub method: String,
    pub is_package_private: bool,
}

/// An instance field, as laid out by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub defining_class: String,
    pub name: String,
    pub type_: String,
}

/// How a method declared (or inherited) by a class is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// Vtable slot index.
    Virtual(usize),
    Direct,
    Static,
}

/// Raw description of a class, extracted from a container before resolution.
#[derive(Debug, Clone)]
pub(crate) struct ClassInfo {
    pub(crate) source: String,
    pub(crate) name: String,
    pub(crate) is_public: bool,
    pub(crate) is_interface: bool,
    pub(crate) superclass: Option<String>,
    pub(crate) interfaces: Vec<String>,
    /// Short signatures, with the static flag.
    pub(crate) direct_methods: Vec<(String, bool)>,
    pub(crate) virtual_methods: Vec<VirtualMethod>,
    /// Names and type descriptors, in declaration order.
    pub(crate) instance_fields: Vec<(String, String)>,
}

impl ClassInfo {
    pub(crate) fn from_class_def(
        class: &ClassDefItem,
        dex: &Dex,
        source: &str,
    ) -> AnalysisResult<Self> {
        let name = class.class_descriptor(dex)?.to_string();
        let mut info = Self {
            source: source.to_string(),
            is_public: class.flags().contains(ClassFlags::ACC_PUBLIC),
            is_interface: class.is_interface(),
            superclass: class.superclass_descriptor(dex)?.map(str::to_string),
            interfaces: class
                .interface_descriptors(dex)?
                .into_iter()
                .map(str::to_string)
                .collect(),
            direct_methods: Vec::new(),
            virtual_methods: Vec::new(),
            instance_fields: Vec::new(),
            name,
        };
        if let Some(data) = class.class_data() {
            for method in data.iter_direct_methods() {
                let signature = method.descriptor(dex)?.short_string(dex)?;
                info.direct_methods.push((signature, method.is_static()));
            }
            for method in data.iter_virtual_methods() {
                info.virtual_methods.push(VirtualMethod {
                    containing_class: info.name.clone(),
                    method: method.descriptor(dex)?.short_string(dex)?,
                    is_package_private: method.flags().is_package_private(),
                });
            }
            for field in data.iter_instance_fields() {
                let field = field.descriptor(dex)?;
                info.instance_fields
                    .push((field.name().to_string(), field.type_descriptor(dex)?.to_string()));
            }
        }
        Ok(info)
    }
}

/// What kind of class definition a [`ClassDef`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// Loaded from a container.
    Regular,
    /// Synthesized array class, with its base element class and dimensions count.
    Array { element: ClassUid, dimensions: usize },
    /// One of the eight primitive types.
    Primitive,
    /// Placeholder for a class that could not be loaded. It behaves as the root object
    /// class for dispatch purposes and fails any query that needs the real definition.
    Unresolved,
}

/// A resolved class definition, cached in the [class path](super::ClassPath).
#[derive(Debug)]
pub struct ClassDef {
    pub(crate) uid: ClassUid,
    pub(crate) name: String,
    pub(crate) flavor: Flavor,
    pub(crate) superclass: Option<ClassUid>,
    pub(crate) is_interface: bool,
    pub(crate) is_public: bool,
    pub(crate) depth: usize,
    /// Every interface implemented, directly or not, by name.
    pub(crate) implemented_interfaces: BTreeMap<String, ClassUid>,
    /// Declared interfaces followed by the interfaces they extend, in discovery order.
    pub(crate) interface_table: Vec<ClassUid>,
    /// Virtual methods declared by the class itself.
    pub(crate) virtual_methods: Vec<Rc<VirtualMethod>>,
    pub(crate) vtable: Vec<Rc<VirtualMethod>>,
    pub(crate) method_lookup: BTreeMap<String, MethodKind>,
    /// Instance fields by byte offset, inherited ones included.
    pub(crate) instance_fields: BTreeMap<usize, FieldDef>,
}

impl ClassDef {
    #[inline]
    #[must_use]
    pub const fn uid(&self) -> ClassUid {
        self.uid
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub const fn flavor(&self) -> Flavor {
        self.flavor
    }

    #[inline]
    #[must_use]
    pub const fn superclass(&self) -> Option<ClassUid> {
        self.superclass
    }

    #[inline]
    #[must_use]
    pub const fn is_unresolved(&self) -> bool {
        matches!(self.flavor, Flavor::Unresolved)
    }

    #[inline]
    #[must_use]
    pub const fn is_primitive(&self) -> bool {
        matches!(self.flavor, Flavor::Primitive)
    }

    #[inline]
    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self.flavor, Flavor::Array { .. })
    }

    #[must_use]
    pub const fn array_dimensions(&self) -> Option<usize> {
        match self.flavor {
            Flavor::Array { dimensions, .. } => Some(dimensions),
            _ => None,
        }
    }

    /// Innermost element class of an array class.
    #[must_use]
    pub const fn base_element_class(&self) -> Option<ClassUid> {
        match self.flavor {
            Flavor::Array { element, .. } => Some(element),
            _ => None,
        }
    }

    pub(crate) fn unresolved_error(&self) -> AnalysisError {
        AnalysisError::validation(format!("class {} cannot be resolved.", self.name))
    }

    pub fn is_interface(&self) -> AnalysisResult<bool> {
        if self.is_unresolved() {
            return Err(self.unresolved_error());
        }
        Ok(self.is_interface)
    }

    pub fn is_public(&self) -> AnalysisResult<bool> {
        if self.is_unresolved() {
            return Err(self.unresolved_error());
        }
        Ok(self.is_public)
    }

    /// Number of superclasses between this class and the root object class.
    pub fn depth(&self) -> AnalysisResult<usize> {
        if self.is_unresolved() {
            return Err(self.unresolved_error());
        }
        Ok(self.depth)
    }

    pub fn implements_interface(&self, interface: &ClassDef) -> AnalysisResult<bool> {
        if self.is_unresolved() {
            return Err(self.unresolved_error());
        }
        Ok(self.implemented_interfaces.contains_key(&interface.name))
    }

    #[inline]
    #[must_use]
    pub fn vtable(&self) -> &[Rc<VirtualMethod>] {
        &self.vtable
    }

    #[inline]
    #[must_use]
    pub fn interface_table(&self) -> &[ClassUid] {
        &self.interface_table
    }

    #[inline]
    pub fn iter_virtual_methods(&self) -> impl Iterator<Item = &VirtualMethod> {
        self.virtual_methods.iter().map(AsRef::as_ref)
    }

    /// Short signature of the method at the given vtable index.
    #[must_use]
    pub fn virtual_method(&self, index: usize) -> Option<&VirtualMethod> {
        self.vtable.get(index).map(AsRef::as_ref)
    }

    /// Dispatch kind of the method with the given short signature.
    #[must_use]
    pub fn method_type(&self, signature: &str) -> Option<MethodKind> {
        self.method_lookup.get(signature).copied()
    }

    /// Placeholders only know the root object methods and fail on anything else.
    pub fn has_virtual_method(&self, signature: &str) -> AnalysisResult<bool> {
        let found = matches!(self.method_type(signature), Some(MethodKind::Virtual(_)));
        if !found && self.is_unresolved() {
            return Err(self.unresolved_error());
        }
        Ok(found)
    }

    /// Instance field stored at the given byte offset.
    #[must_use]
    pub fn instance_field(&self, offset: usize) -> Option<&FieldDef> {
        self.instance_fields.get(&offset)
    }

    #[inline]
    pub fn iter_instance_fields(&self) -> impl Iterator<Item = (usize, &FieldDef)> {
        self.instance_fields.iter().map(|(offset, field)| (*offset, field))
    }

    /// First byte offset following the last instance field.
    pub(crate) fn next_field_offset(&self) -> usize {
        match self.instance_fields.iter().next_back() {
            Some((offset, field)) if is_wide(&field.type_) => offset + 8,
            Some((offset, _)) => offset + 4,
            None => 8,
        }
    }
}

fn is_wide(descriptor: &str) -> bool {
    matches!(descriptor.chars().next(), Some('J' | 'D'))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Reference,
    Wide,
    Other,
}

impl FieldKind {
    fn of(descriptor: &str) -> Self {
        match descriptor.chars().next() {
            Some('L' | '[') => Self::Reference,
            Some('J' | 'D') => Self::Wide,
            _ => Self::Other,
        }
    }
}

/// Moves every field of the given kind to the front of `fields[front..]`, by swapping
/// them with fields found from the back. Returns the index of the first field of
/// another kind.
fn group_front(fields: &mut [(FieldKind, FieldDef)], mut front: usize, kind: FieldKind) -> usize {
    let mut back = fields.len().saturating_sub(1);
    while front < fields.len() {
        if fields[front].0 != kind {
            while back > front {
                if fields[back].0 == kind {
                    fields.swap(front, back);
                    back -= 1;
                    break;
                }
                back -= 1;
            }
        }
        if fields[front].0 != kind {
            break;
        }
        front += 1;
    }
    front
}

/// Computes instance field offsets the way the runtime does: references first, then
/// 8-byte aligned wide fields, then everything else, after the superclass fields.
pub(crate) fn layout_fields(
    class_name: &str,
    declared: &[(String, String)],
    superclass: Option<&ClassDef>,
) -> BTreeMap<usize, FieldDef> {
    let mut fields: Vec<(FieldKind, FieldDef)> = declared
        .iter()
        .map(|(name, type_)| {
            (
                FieldKind::of(type_),
                FieldDef {
                    defining_class: class_name.to_string(),
                    name: name.clone(),
                    type_: type_.clone(),
                },
            )
        })
        .collect();

    let mut front = group_front(&mut fields, 0, FieldKind::Reference);

    let start_offset = superclass.map_or(8, ClassDef::next_field_offset);
    let field_index_mod = usize::from(start_offset % 8 != 0);

    // wide fields must be 8-byte aligned: borrow a 32-bit field from the back if needed
    if front < fields.len() && front % 2 != field_index_mod {
        if fields[front].0 == FieldKind::Wide {
            let mut back = fields.len() - 1;
            while back > front {
                if fields[back].0 == FieldKind::Other {
                    fields.swap(front, back);
                    front += 1;
                    break;
                }
                back -= 1;
            }
        } else {
            front += 1;
        }
    }

    group_front(&mut fields, front, FieldKind::Wide);

    let mut instance_fields = superclass
        .map(|class| class.instance_fields.clone())
        .unwrap_or_default();
    let mut offset = start_offset;
    let mut got_wide = false;
    for (kind, field) in fields {
        if kind == FieldKind::Wide && !got_wide {
            if offset % 8 != 0 {
                offset += 4;
            }
            got_wide = true;
        }
        instance_fields.insert(offset, field);
        offset += if kind == FieldKind::Wide { 8 } else { 4 };
    }
    instance_fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter()
            .map(|(n, t)| ((*n).to_string(), (*t).to_string()))
            .collect()
    }

    fn offsets(layout: &BTreeMap<usize, FieldDef>) -> Vec<(usize, &str)> {
        layout
            .iter()
            .map(|(offset, field)| (*offset, field.name.as_str()))
            .collect()
    }

    #[test]
    fn references_then_aligned_wide() {
        let layout = layout_fields(
            "LFoo;",
            &fields(&[("a", "I"), ("b", "J"), ("c", "Ljava/lang/Object;")]),
            None,
        );
        // the narrow field fills the gap that aligns the wide group
        assert_eq!(offsets(&layout), vec![(8, "c"), (12, "a"), (16, "b")]);
    }

    #[test]
    fn wide_padding_without_spare_field() {
        let layout = layout_fields(
            "LFoo;",
            &fields(&[("d", "D"), ("o", "Ljava/lang/String;")]),
            None,
        );
        assert_eq!(offsets(&layout), vec![(8, "o"), (16, "d")]);
    }

    #[test]
    fn inherited_fields_come_first() {
        let parent_fields = layout_fields("LParent;", &fields(&[("p", "I")]), None);
        let parent = ClassDef {
            uid: ClassUid::from_idx(0),
            name: "LParent;".to_string(),
            flavor: Flavor::Regular,
            superclass: None,
            is_interface: false,
            is_public: true,
            depth: 1,
            implemented_interfaces: BTreeMap::new(),
            interface_table: Vec::new(),
            virtual_methods: Vec::new(),
            vtable: Vec::new(),
            method_lookup: BTreeMap::new(),
            instance_fields: parent_fields,
        };
        assert_eq!(parent.next_field_offset(), 12);

        let layout = layout_fields(
            "LChild;",
            &fields(&[("w", "J"), ("x", "Z")]),
            Some(&parent),
        );
        assert_eq!(offsets(&layout), vec![(8, "p"), (12, "x"), (16, "w")]);
        assert_eq!(layout[&16].defining_class, "LChild;");
        assert_eq!(layout[&8].defining_class, "LParent;");
    }
}
