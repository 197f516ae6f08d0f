//! Deodexing support: resolution of inline indexes, field offsets and vtable indexes back
//! to symbolic references.

mod field_mapper;
mod inline;

pub use crate::deodex::field_mapper::OdexedFieldInstructionMapper;
pub use crate::deodex::inline::{InlineMethod, InlineMethodResolver, InvokeKind};

use crate::classpath::{package_of, ClassDef, ClassPath};
use crate::config::InlineTable;
use crate::errors::{AnalysisError, AnalysisResult};
use dz_dex::fields::FieldIdItem;
use dz_dex::instrs::Instr;
use dz_dex::methods::MethodIdItem;
use dz_dex::types::parse_parameters;
use dz_dex::{Dex, Index};
use lazy_static::lazy_static;
use log::trace;
use regex::Regex;
use std::rc::Rc;

lazy_static! {
    static ref SHORT_METHOD: Regex =
        Regex::new(r"^([^(]+)\(([^)]*)\)(.+)$").expect("short method regex");
}

/// Resolves odexed references against the class path.
///
/// References are looked up in the container being deodexed first. When none is found,
/// the missing pool entries are created.
#[derive(Debug, Clone)]
pub struct DeodexUtil {
    inline_resolver: InlineMethodResolver,
}

impl DeodexUtil {
    #[must_use]
    pub const fn new(inline_resolver: InlineMethodResolver) -> Self {
        Self { inline_resolver }
    }

    pub fn for_odex_version(version: u32) -> AnalysisResult<Self> {
        Ok(Self::new(InlineMethodResolver::for_version(version)?))
    }

    pub fn from_inline_table(table: &InlineTable, class_path: &ClassPath) -> AnalysisResult<Self> {
        match table {
            InlineTable::Version(version) => Self::for_odex_version(*version),
            InlineTable::File(path) => Ok(Self::new(InlineMethodResolver::from_file(
                path, class_path,
            )?)),
        }
    }

    #[inline]
    #[must_use]
    pub const fn inline_resolver(&self) -> &InlineMethodResolver {
        &self.inline_resolver
    }

    /// Inline method called by an `execute-inline[/range]` instruction.
    pub fn lookup_inline_method(&self, instr: &Instr) -> AnalysisResult<&InlineMethod> {
        match (instr, instr.invoke_args()) {
            (Instr::ExecuteInline(_, index) | Instr::ExecuteInlineRange(_, index), Some(args)) => {
                self.inline_resolver.resolve(*index, args.len())
            }
            _ => Err(AnalysisError::Internal(
                "inline method lookup on a non execute-inline instruction".to_string(),
            )),
        }
    }

    /// Method reference of an inline method.
    pub fn inline_method_ref(
        &self,
        method: &InlineMethod,
        class_path: &ClassPath,
        dex: &mut Dex,
    ) -> AnalysisResult<Option<Index<MethodIdItem>>> {
        let class = class_path.class_def(method.class(), true)?;
        resolve_method(
            class_path,
            dex,
            &class,
            &class,
            method.class(),
            method.name(),
            method.parameters(),
            method.return_type(),
        )
    }

    /// Reference of the instance field stored at `offset` in objects of `instance`.
    pub fn lookup_field(
        &self,
        class_path: &ClassPath,
        dex: &mut Dex,
        accessing: &ClassDef,
        instance: &ClassDef,
        offset: usize,
    ) -> AnalysisResult<Option<Index<FieldIdItem>>> {
        let Some(field) = instance.instance_field(offset) else {
            return Ok(None);
        };
        trace!(
            "field at offset {offset} of {}: {}->{}:{}",
            instance.name(),
            field.defining_class,
            field.name,
            field.type_
        );

        // from the defining class down to the instance class
        let mut chain = vec![class_path.get(instance.uid())?];
        while let Some(class) = chain.last() {
            if class.name() == field.defining_class {
                break;
            }
            match class.superclass() {
                Some(uid) => chain.push(class_path.get(uid)?),
                None => break,
            }
        }
        chain.reverse();

        for class in &chain {
            if let Some(idx) = dex.find_field_ref(class.name(), &field.name, &field.type_) {
                if can_access(accessing, class) {
                    return Ok(Some(idx));
                }
            }
        }
        Ok(chain
            .iter()
            .find(|class| can_access(accessing, class))
            .map(|class| dex.intern_field_ref(class.name(), &field.name, &field.type_)))
    }

    /// Reference of the method at vtable slot `index` of `instance`.
    pub fn lookup_virtual_method(
        &self,
        class_path: &ClassPath,
        dex: &mut Dex,
        accessing: &ClassDef,
        instance: &ClassDef,
        index: usize,
    ) -> AnalysisResult<Option<Index<MethodIdItem>>> {
        let Some(method) = instance.virtual_method(index) else {
            return Ok(None);
        };
        let caps = SHORT_METHOD.captures(&method.method).ok_or_else(|| {
            AnalysisError::Internal(format!("Invalid method descriptor: {}", method.method))
        })?;

        let defining = if instance.is_unresolved() {
            // only the root object methods can be found in a placeholder vtable
            class_path.object()?
        } else if instance.is_interface()? {
            match instance.superclass() {
                Some(uid) => class_path.get(uid)?,
                None => class_path.object()?,
            }
        } else {
            class_path.get(instance.uid())?
        };

        resolve_method(
            class_path,
            dex,
            accessing,
            &defining,
            &method.containing_class,
            &caps[1],
            &caps[2],
            &caps[3],
        )
    }
}

fn can_access(accessing: &ClassDef, class: &ClassDef) -> bool {
    // unresolved placeholders are public
    class.is_public || package_of(accessing.name()) == package_of(class.name())
}

/// Looks a method up from `defining` to the root class, creating it on the declaring class
/// (or the first accessible class) when it is not referenced yet.
#[allow(clippy::too_many_arguments)]
fn resolve_method(
    class_path: &ClassPath,
    dex: &mut Dex,
    accessing: &ClassDef,
    defining: &Rc<ClassDef>,
    declaring: &str,
    name: &str,
    parameters: &str,
    return_type: &str,
) -> AnalysisResult<Option<Index<MethodIdItem>>> {
    let parameters = parse_parameters(parameters)?;

    let mut chain = vec![defining.clone()];
    while let Some(uid) = chain.last().and_then(|class| class.superclass()) {
        chain.push(class_path.get(uid)?);
    }

    for class in &chain {
        if let Some(idx) = dex.find_method_ref(class.name(), name, &parameters, return_type) {
            if can_access(accessing, class) {
                return Ok(Some(idx));
            }
        }
    }

    let target = chain
        .iter()
        .find(|class| class.name() == declaring && can_access(accessing, class))
        .or_else(|| chain.iter().find(|class| can_access(accessing, class)));
    Ok(target.map(|class| dex.intern_method_ref(class.name(), name, &parameters, return_type)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, ClassBuilder};
    use dz_dex::methods::MethodFlags;
    use dz_dex::DexIndex;

    fn app() -> Dex {
        let mut dex = Dex::new();
        ClassBuilder::new("Lcom/app/Base;")
            .field("count", "I")
            .field("name", "Ljava/lang/String;")
            .virtual_method("run()V", MethodFlags::ACC_PUBLIC, None)
            .build(&mut dex);
        ClassBuilder::new("Lcom/app/Child;")
            .extends("Lcom/app/Base;")
            .field("total", "J")
            .virtual_method("run()V", MethodFlags::ACC_PUBLIC, None)
            .build(&mut dex);
        dex
    }

    #[test]
    fn inherited_vtable_slot() {
        let mut dex = app();
        let class_path = testing::class_path_with(&dex);
        let util = DeodexUtil::for_odex_version(35).unwrap();
        let child = class_path.class_def("Lcom/app/Child;", false).unwrap();

        let idx = util
            .lookup_virtual_method(&class_path, &mut dex, &child, &child, 0)
            .unwrap()
            .unwrap();
        assert_eq!(
            idx.get(&dex).unwrap().full_string(&dex).unwrap(),
            "Ljava/lang/Object;->toString()Ljava/lang/String;"
        );

        let run = child.method_type("run()V").unwrap();
        let crate::classpath::MethodKind::Virtual(slot) = run else {
            panic!("run is virtual");
        };
        let idx = util
            .lookup_virtual_method(&class_path, &mut dex, &child, &child, slot)
            .unwrap()
            .unwrap();
        assert_eq!(
            idx.get(&dex).unwrap().full_string(&dex).unwrap(),
            "Lcom/app/Child;->run()V"
        );

        assert!(util
            .lookup_virtual_method(&class_path, &mut dex, &child, &child, 42)
            .unwrap()
            .is_none());
    }

    #[test]
    fn field_offsets() {
        let mut dex = app();
        let class_path = testing::class_path_with(&dex);
        let util = DeodexUtil::for_odex_version(35).unwrap();
        let child = class_path.class_def("Lcom/app/Child;", false).unwrap();

        // Base: name@8, count@12; Child: total@16
        let name = util
            .lookup_field(&class_path, &mut dex, &child, &child, 8)
            .unwrap()
            .unwrap();
        let name = name.get(&dex).unwrap();
        assert_eq!(name.class_descriptor(&dex).unwrap(), "Lcom/app/Base;");
        assert_eq!(name.name(), "name");

        let total = util
            .lookup_field(&class_path, &mut dex, &child, &child, 16)
            .unwrap()
            .unwrap();
        assert_eq!(total.get(&dex).unwrap().name(), "total");

        assert!(util
            .lookup_field(&class_path, &mut dex, &child, &child, 12 + 1)
            .unwrap()
            .is_none());
    }

    #[test]
    fn inline_method_references() {
        let mut dex = app();
        let class_path = testing::class_path_with(&dex);
        let util = DeodexUtil::for_odex_version(35).unwrap();

        let instr = Instr::ExecuteInline(vec![dz_dex::registers::Reg::from(0u8)].into(), 4);
        let method = util.lookup_inline_method(&instr).unwrap();
        assert_eq!(method.to_string(), "Ljava/lang/String;->length()I");
        let idx = util
            .inline_method_ref(method, &class_path, &mut dex)
            .unwrap()
            .unwrap();
        assert_eq!(
            idx.get(&dex).unwrap().full_string(&dex).unwrap(),
            "Ljava/lang/String;->length()I"
        );

        // interning again gives the same reference
        let again = util
            .inline_method_ref(method, &class_path, &mut dex)
            .unwrap()
            .unwrap();
        assert_eq!(idx, again);
    }
}
