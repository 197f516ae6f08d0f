//! Decoded Dalvik bytecode data structures.
//!
//! This crate models what the analysis engine consumes from a Dex (or odex) container:
//! the string/type/proto/field/method id pools, class definitions with their fields and
//! methods, and method bodies as lists of already decoded [instructions](instrs::Instr).
//! Pools can be searched and extended (interning) so that deodexing can introduce
//! references that were not present in the container.

macro_rules! flags_serde {
    ($flags:ident) => {
        impl serde::Serialize for $flags {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_u32(self.bits())
            }
        }

        impl<'de> serde::Deserialize<'de> for $flags {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let bits = <u32 as serde::Deserialize>::deserialize(deserializer)?;
                Ok(Self::from_bits_truncate(bits))
            }
        }
    };
}

mod addr;
mod loader;
mod strings;

pub mod classes;
pub mod code;
pub mod errors;
pub mod fields;
pub mod instrs;
pub mod methods;
pub mod registers;
pub mod types;

pub use crate::addr::Addr;
pub use crate::loader::{open, save, ContainerLoader, JsonLoader};
pub use crate::strings::StringIdItem;

use crate::classes::ClassDefItem;
use crate::code::CodeItem;
use crate::errors::{DexError, DexResult};
use crate::fields::FieldIdItem;
use crate::methods::MethodIdItem;
use crate::types::{ProtoIdItem, TypeIdItem};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A typed index into one of the [`Dex`] pools.
pub struct Index<T: ?Sized> {
    value: usize,
    marker: PhantomData<T>,
}

impl<T> Clone for Index<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Index<T> {}

impl<T> PartialEq for Index<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Index<T> {}

impl<T> PartialOrd for Index<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Index<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T> Hash for Index<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> fmt::Debug for Index<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Index({})", self.value)
    }
}

impl<T> Serialize for Index<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.value as u64)
    }
}

impl<'de, T> Deserialize<'de> for Index<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = usize::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}

impl<T> Index<T> {
    #[must_use]
    pub const fn new(idx: usize) -> Self {
        Self {
            value: idx,
            marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn as_usize(&self) -> usize {
        self.value
    }
}

pub trait DexIndex: Sized {
    type T;

    fn get(self, dex: &Dex) -> DexResult<&Self::T>;
}

pub trait PrettyPrint {
    fn pp(&self, f: &mut fmt::Formatter, dex: &Dex) -> DexResult<()>;
}

pub struct PrettyPrinter<'a, T>(pub &'a T, pub &'a Dex);

impl<'a, T: PrettyPrint> fmt::Display for PrettyPrinter<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.pp(f, self.1).map_err(|_| fmt::Error)
    }
}

/// Reverse lookup tables over the pools, rebuilt after deserialization.
#[derive(Debug, Default)]
struct Lookup {
    strings: BTreeMap<String, Index<StringIdItem>>,
    types: BTreeMap<String, Index<TypeIdItem>>,
    protos: BTreeMap<(Index<TypeIdItem>, Vec<Index<TypeIdItem>>), Index<ProtoIdItem>>,
    fields: BTreeMap<(Index<TypeIdItem>, String, Index<TypeIdItem>), Index<FieldIdItem>>,
    methods: BTreeMap<(Index<TypeIdItem>, String, Index<ProtoIdItem>), Index<MethodIdItem>>,
}

/// The top-level Dex data structure.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(from = "RawDex")]
pub struct Dex {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) odex_dependencies: Option<Vec<String>>,

    pub(crate) string_id_items: Vec<StringIdItem>,
    pub(crate) type_id_items: Vec<TypeIdItem>,
    pub(crate) proto_id_items: Vec<ProtoIdItem>,
    pub(crate) field_id_items: Vec<FieldIdItem>,
    pub(crate) method_id_items: Vec<MethodIdItem>,
    pub(crate) class_def_items: Vec<ClassDefItem>,

    #[serde(skip)]
    lookup: Lookup,
}

#[derive(Deserialize)]
struct RawDex {
    #[serde(default)]
    odex_dependencies: Option<Vec<String>>,
    #[serde(default)]
    string_id_items: Vec<StringIdItem>,
    #[serde(default)]
    type_id_items: Vec<TypeIdItem>,
    #[serde(default)]
    proto_id_items: Vec<ProtoIdItem>,
    #[serde(default)]
    field_id_items: Vec<FieldIdItem>,
    #[serde(default)]
    method_id_items: Vec<MethodIdItem>,
    #[serde(default)]
    class_def_items: Vec<ClassDefItem>,
}

impl From<RawDex> for Dex {
    fn from(raw: RawDex) -> Self {
        let mut dex = Self {
            odex_dependencies: raw.odex_dependencies,
            string_id_items: raw.string_id_items,
            type_id_items: raw.type_id_items,
            proto_id_items: raw.proto_id_items,
            field_id_items: raw.field_id_items,
            method_id_items: raw.method_id_items,
            class_def_items: raw.class_def_items,
            lookup: Lookup::default(),
        };
        dex.rebuild_lookup();
        dex
    }
}

impl Dex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an empty odex container with the given boot dependencies.
    #[must_use]
    pub fn new_odex(dependencies: Vec<String>) -> Self {
        Self {
            odex_dependencies: Some(dependencies),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_odex(&self) -> bool {
        self.odex_dependencies.is_some()
    }

    /// Boot class path entries the odex file was optimized against.
    #[inline]
    #[must_use]
    pub fn odex_dependencies(&self) -> Option<&[String]> {
        self.odex_dependencies.as_deref()
    }

    fn rebuild_lookup(&mut self) {
        let mut lookup = Lookup::default();
        for (i, s) in self.string_id_items.iter().enumerate() {
            lookup.strings.entry(s.0.clone()).or_insert(Index::new(i));
        }
        for (i, t) in self.type_id_items.iter().enumerate() {
            lookup
                .types
                .entry(t.descriptor.clone())
                .or_insert(Index::new(i));
        }
        for (i, p) in self.proto_id_items.iter().enumerate() {
            lookup
                .protos
                .entry((p.return_type, p.parameters.clone()))
                .or_insert(Index::new(i));
        }
        for (i, f) in self.field_id_items.iter().enumerate() {
            lookup
                .fields
                .entry((f.class_idx, f.name.clone(), f.type_idx))
                .or_insert(Index::new(i));
        }
        for (i, m) in self.method_id_items.iter().enumerate() {
            lookup
                .methods
                .entry((m.class_idx, m.name.clone(), m.proto_idx))
                .or_insert(Index::new(i));
        }
        self.lookup = lookup;
    }

    #[inline]
    pub fn iter_type_ids(&self) -> impl Iterator<Item = &TypeIdItem> {
        self.type_id_items.iter()
    }

    #[inline]
    pub fn iter_field_ids(&self) -> impl Iterator<Item = &FieldIdItem> {
        self.field_id_items.iter()
    }

    #[inline]
    pub fn iter_method_ids(&self) -> impl Iterator<Item = &MethodIdItem> {
        self.method_id_items.iter()
    }

    #[inline]
    pub fn iter_class_defs(&self) -> impl Iterator<Item = &ClassDefItem> {
        self.class_def_items.iter()
    }

    #[inline]
    #[must_use]
    pub fn class_defs_count(&self) -> usize {
        self.class_def_items.len()
    }

    pub fn add_class(&mut self, class_def: ClassDefItem) -> Index<ClassDefItem> {
        self.class_def_items.push(class_def);
        Index::new(self.class_def_items.len() - 1)
    }

    /// Finds the class definition of the given type descriptor.
    #[must_use]
    pub fn find_class_def(&self, descriptor: &str) -> Option<&ClassDefItem> {
        let type_idx = self.find_type(descriptor)?;
        self.class_def_items
            .iter()
            .find(|class| class.class_idx == type_idx)
    }

    /// Finds the code of the method definition referenced by the given method id.
    pub fn method_code_mut(&mut self, method: Index<MethodIdItem>) -> Option<&mut CodeItem> {
        self.class_def_items
            .iter_mut()
            .filter_map(|class| class.class_data.as_mut())
            .flat_map(|data| {
                data.direct_methods
                    .iter_mut()
                    .chain(data.virtual_methods.iter_mut())
            })
            .find(|m| m.method_idx == method)
            .and_then(|m| m.code.as_mut())
    }

    #[must_use]
    pub fn find_string(&self, s: &str) -> Option<Index<StringIdItem>> {
        self.lookup.strings.get(s).copied()
    }

    pub fn intern_string(&mut self, s: &str) -> Index<StringIdItem> {
        if let Some(idx) = self.find_string(s) {
            return idx;
        }
        let idx = Index::new(self.string_id_items.len());
        self.string_id_items.push(StringIdItem(s.to_string()));
        self.lookup.strings.insert(s.to_string(), idx);
        idx
    }

    #[must_use]
    pub fn find_type(&self, descriptor: &str) -> Option<Index<TypeIdItem>> {
        self.lookup.types.get(descriptor).copied()
    }

    pub fn intern_type(&mut self, descriptor: &str) -> Index<TypeIdItem> {
        if let Some(idx) = self.find_type(descriptor) {
            return idx;
        }
        let idx = Index::new(self.type_id_items.len());
        self.type_id_items.push(TypeIdItem {
            descriptor: descriptor.to_string(),
        });
        self.lookup.types.insert(descriptor.to_string(), idx);
        idx
    }

    #[must_use]
    pub fn find_proto(
        &self,
        return_type: Index<TypeIdItem>,
        parameters: &[Index<TypeIdItem>],
    ) -> Option<Index<ProtoIdItem>> {
        self.lookup
            .protos
            .get(&(return_type, parameters.to_vec()))
            .copied()
    }

    pub fn intern_proto(
        &mut self,
        return_type: Index<TypeIdItem>,
        parameters: &[Index<TypeIdItem>],
    ) -> Index<ProtoIdItem> {
        if let Some(idx) = self.find_proto(return_type, parameters) {
            return idx;
        }
        let idx = Index::new(self.proto_id_items.len());
        self.proto_id_items.push(ProtoIdItem {
            return_type,
            parameters: parameters.to_vec(),
        });
        self.lookup
            .protos
            .insert((return_type, parameters.to_vec()), idx);
        idx
    }

    #[must_use]
    pub fn find_field(
        &self,
        class: Index<TypeIdItem>,
        name: &str,
        type_: Index<TypeIdItem>,
    ) -> Option<Index<FieldIdItem>> {
        self.lookup
            .fields
            .get(&(class, name.to_string(), type_))
            .copied()
    }

    pub fn intern_field(
        &mut self,
        class: Index<TypeIdItem>,
        name: &str,
        type_: Index<TypeIdItem>,
    ) -> Index<FieldIdItem> {
        if let Some(idx) = self.find_field(class, name, type_) {
            return idx;
        }
        let idx = Index::new(self.field_id_items.len());
        self.field_id_items.push(FieldIdItem {
            class_idx: class,
            type_idx: type_,
            name: name.to_string(),
        });
        self.lookup
            .fields
            .insert((class, name.to_string(), type_), idx);
        idx
    }

    #[must_use]
    pub fn find_method(
        &self,
        class: Index<TypeIdItem>,
        name: &str,
        proto: Index<ProtoIdItem>,
    ) -> Option<Index<MethodIdItem>> {
        self.lookup
            .methods
            .get(&(class, name.to_string(), proto))
            .copied()
    }

    pub fn intern_method(
        &mut self,
        class: Index<TypeIdItem>,
        name: &str,
        proto: Index<ProtoIdItem>,
    ) -> Index<MethodIdItem> {
        if let Some(idx) = self.find_method(class, name, proto) {
            return idx;
        }
        let idx = Index::new(self.method_id_items.len());
        self.method_id_items.push(MethodIdItem {
            class_idx: class,
            proto_idx: proto,
            name: name.to_string(),
        });
        self.lookup
            .methods
            .insert((class, name.to_string(), proto), idx);
        idx
    }

    /// Looks a field reference up by descriptors, without creating anything.
    #[must_use]
    pub fn find_field_ref(
        &self,
        class: &str,
        name: &str,
        type_: &str,
    ) -> Option<Index<FieldIdItem>> {
        self.find_field(self.find_type(class)?, name, self.find_type(type_)?)
    }

    /// Looks a field reference up by descriptors, creating the missing pool entries.
    pub fn intern_field_ref(&mut self, class: &str, name: &str, type_: &str) -> Index<FieldIdItem> {
        let class = self.intern_type(class);
        let type_ = self.intern_type(type_);
        self.intern_field(class, name, type_)
    }

    /// Looks a method reference up by descriptors, without creating anything.
    #[must_use]
    pub fn find_method_ref(
        &self,
        class: &str,
        name: &str,
        parameters: &[&str],
        return_type: &str,
    ) -> Option<Index<MethodIdItem>> {
        let class = self.find_type(class)?;
        let return_type = self.find_type(return_type)?;
        let parameters = parameters
            .iter()
            .map(|p| self.find_type(p))
            .collect::<Option<Vec<_>>>()?;
        let proto = self.find_proto(return_type, &parameters)?;
        self.find_method(class, name, proto)
    }

    /// Looks a method reference up by descriptors, creating the missing pool entries.
    pub fn intern_method_ref(
        &mut self,
        class: &str,
        name: &str,
        parameters: &[&str],
        return_type: &str,
    ) -> Index<MethodIdItem> {
        let class = self.intern_type(class);
        let return_type = self.intern_type(return_type);
        let parameters: Vec<_> = parameters.iter().map(|p| self.intern_type(p)).collect();
        let proto = self.intern_proto(return_type, &parameters);
        self.intern_method(class, name, proto)
    }

    /// Parses a `(params)ret` descriptor and interns the matching method reference.
    pub fn intern_method_descriptor(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> DexResult<Index<MethodIdItem>> {
        let (parameters, return_type) = types::parse_method_descriptor(descriptor)?;
        Ok(self.intern_method_ref(class, name, &parameters, return_type))
    }

    pub fn validate(&self) -> DexResult<()> {
        for class in &self.class_def_items {
            class.class_idx.get(self)?;
            if let Some(data) = class.class_data() {
                for method in data.iter_methods() {
                    method.method_idx.get(self)?;
                }
            }
        }
        if self.type_id_items.len() != self.lookup.types.len() {
            return Err(DexError::Structure("duplicate type descriptors".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning() {
        let mut dex = Dex::new();
        let t1 = dex.intern_type("La/B;");
        let t2 = dex.intern_type("La/B;");
        assert_eq!(t1, t2);
        assert_eq!(dex.find_type("La/B;"), Some(t1));
        assert_eq!(dex.find_type("La/C;"), None);

        let m1 = dex.intern_method_ref("La/B;", "f", &["I", "J"], "V");
        let m2 = dex
            .intern_method_descriptor("La/B;", "f", "(IJ)V")
            .unwrap();
        assert_eq!(m1, m2);
        let method = m1.get(&dex).unwrap();
        assert_eq!(method.short_string(&dex).unwrap(), "f(IJ)V");
        assert_eq!(method.full_string(&dex).unwrap(), "La/B;->f(IJ)V");
        assert_eq!(
            method.proto(&dex).unwrap().parameter_registers(&dex).unwrap(),
            3
        );

        let f1 = dex.intern_field_ref("La/B;", "x", "I");
        assert_eq!(dex.find_field_ref("La/B;", "x", "I"), Some(f1));
        assert_eq!(dex.find_field_ref("La/B;", "x", "J"), None);
    }

    #[test]
    fn json_round_trip_rebuilds_lookup() {
        let mut dex = Dex::new_odex(vec!["/system/framework/core.jar".to_string()]);
        let object = dex.intern_type("Ljava/lang/Object;");
        dex.add_class(ClassDefItem::new(object, classes::ClassFlags::ACC_PUBLIC));
        let m = dex.intern_method_ref("Ljava/lang/Object;", "<init>", &[], "V");

        let json = serde_json::to_string(&dex).unwrap();
        let loaded: Dex = serde_json::from_str(&json).unwrap();
        assert!(loaded.is_odex());
        assert_eq!(
            loaded.find_method_ref("Ljava/lang/Object;", "<init>", &[], "V"),
            Some(m)
        );
        assert!(loaded.validate().is_ok());
    }
}
