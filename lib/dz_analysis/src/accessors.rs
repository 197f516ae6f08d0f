//! Resolution of the synthetic accessors generated by compilers to give inner classes access
//! to the private members of their enclosing class.

use crate::errors::AnalysisResult;
use dz_dex::fields::FieldIdItem;
use dz_dex::instrs::{Instruction, Reference};
use dz_dex::methods::{MethodFlags, MethodIdItem};
use dz_dex::{Dex, DexIndex, Index};
use log::trace;
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Member an accessor forwards to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessedMember {
    Method(Index<MethodIdItem>),
    Getter(Index<FieldIdItem>),
    Setter(Index<FieldIdItem>),
}

/// Resolves `access$NNN` methods of a container to the member they give access to.
#[derive(Debug)]
pub struct SyntheticAccessorResolver<'a> {
    dex: &'a Dex,
    resolved: RefCell<BTreeMap<String, AccessedMember>>,
}

impl<'a> SyntheticAccessorResolver<'a> {
    #[must_use]
    pub fn new(dex: &'a Dex) -> Self {
        Self {
            dex,
            resolved: RefCell::new(BTreeMap::new()),
        }
    }

    /// Cheap name check, to be done before [`Self::accessed_member`].
    pub fn looks_like_synthetic_accessor(&self, method: Index<MethodIdItem>) -> AnalysisResult<bool> {
        Ok(method.get(self.dex)?.name().starts_with("access$"))
    }

    /// Member the given accessor forwards to, `None` when the method is not an accessor.
    pub fn accessed_member(&self, method: Index<MethodIdItem>) -> AnalysisResult<Option<AccessedMember>> {
        let descriptor = method.get(self.dex)?;
        if !descriptor.name().starts_with("access$") {
            return Ok(None);
        }
        let method_string = descriptor.full_string(self.dex)?;
        if let Some(member) = self.resolved.borrow().get(&method_string) {
            return Ok(Some(*member));
        }

        let Some(encoded) = self
            .dex
            .find_class_def(descriptor.class_descriptor(self.dex)?)
            .and_then(|class| class.class_data())
            .and_then(|data| data.iter_direct_methods().find(|m| m.index() == method))
        else {
            return Ok(None);
        };
        if !encoded.flags().contains(MethodFlags::ACC_SYNTHETIC) {
            return Ok(None);
        }
        let Some(code) = encoded.code() else {
            return Ok(None);
        };

        let count = code.instructions_count();
        let Some(first) = code.iter_instructions().next() else {
            return Ok(None);
        };
        let member = match (first.format(), first.reference()) {
            // the invoke is followed by a return, and a move-result when a value is returned
            ("35c" | "3rc", Some(Reference::Method(target))) if (2..=3).contains(&count) => {
                AccessedMember::Method(target)
            }
            ("22c", Some(Reference::Field(field))) if count == 2 => {
                if first.sets_register() || first.sets_wide_register() {
                    AccessedMember::Getter(field)
                } else {
                    AccessedMember::Setter(field)
                }
            }
            _ => return Ok(None),
        };
        trace!("{method_string} is an accessor of {member:?}");
        self.resolved.borrow_mut().insert(method_string, member);
        Ok(Some(member))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, ClassBuilder};
    use dz_dex::code::CodeItem;
    use dz_dex::instrs::Instr;
    use dz_dex::registers::{Reg, RegList};

    fn r(n: u8) -> Reg {
        Reg::from(n)
    }

    fn synthetic() -> MethodFlags {
        MethodFlags::ACC_STATIC | MethodFlags::ACC_SYNTHETIC
    }

    fn outer() -> Dex {
        let mut dex = Dex::new();
        let count = dex.intern_field_ref("Lcom/app/Outer;", "count", "I");
        let secret = testing::method_ref(&mut dex, "Lcom/app/Outer;", "secret()I");
        ClassBuilder::new("Lcom/app/Outer;")
            .field("count", "I")
            .direct_method(
                "access$000(Lcom/app/Outer;)I",
                synthetic(),
                Some(CodeItem::new(
                    2,
                    1,
                    vec![Instr::Iget(r(0), r(1), count), Instr::Return(r(0))],
                )),
            )
            .direct_method(
                "access$002(Lcom/app/Outer;I)I",
                synthetic(),
                Some(CodeItem::new(
                    2,
                    2,
                    vec![Instr::Iput(r(1), r(0), count), Instr::Return(r(1))],
                )),
            )
            .direct_method(
                "access$100(Lcom/app/Outer;)I",
                synthetic(),
                Some(CodeItem::new(
                    2,
                    1,
                    vec![
                        Instr::InvokeDirect(RegList::from(vec![1u8]), secret),
                        Instr::MoveResult(r(0)),
                        Instr::Return(r(0)),
                    ],
                )),
            )
            .direct_method(
                "access$200()I",
                MethodFlags::ACC_STATIC,
                Some(CodeItem::new(1, 0, vec![Instr::Const4(r(0), 1), Instr::Return(r(0))])),
            )
            .direct_method(
                "access$300()I",
                synthetic(),
                Some(CodeItem::new(1, 0, vec![Instr::Const4(r(0), 1), Instr::Return(r(0))])),
            )
            .direct_method("secret()I", MethodFlags::ACC_PRIVATE, None)
            .build(&mut dex);
        dex
    }

    fn accessor(dex: &mut Dex, signature: &str) -> Index<MethodIdItem> {
        testing::method_ref(dex, "Lcom/app/Outer;", signature)
    }

    #[test]
    fn field_accessors() {
        let mut dex = outer();
        let getter = accessor(&mut dex, "access$000(Lcom/app/Outer;)I");
        let setter = accessor(&mut dex, "access$002(Lcom/app/Outer;I)I");
        let count = dex.find_field_ref("Lcom/app/Outer;", "count", "I").unwrap();

        let resolver = SyntheticAccessorResolver::new(&dex);
        assert_eq!(
            resolver.accessed_member(getter).unwrap(),
            Some(AccessedMember::Getter(count))
        );
        assert_eq!(
            resolver.accessed_member(setter).unwrap(),
            Some(AccessedMember::Setter(count))
        );
        // cached
        assert_eq!(
            resolver.accessed_member(getter).unwrap(),
            Some(AccessedMember::Getter(count))
        );
    }

    #[test]
    fn method_accessor() {
        let mut dex = outer();
        let method = accessor(&mut dex, "access$100(Lcom/app/Outer;)I");
        let secret = accessor(&mut dex, "secret()I");

        let resolver = SyntheticAccessorResolver::new(&dex);
        assert!(resolver.looks_like_synthetic_accessor(method).unwrap());
        assert_eq!(
            resolver.accessed_member(method).unwrap(),
            Some(AccessedMember::Method(secret))
        );
    }

    #[test]
    fn not_accessors() {
        let mut dex = outer();
        let not_synthetic = accessor(&mut dex, "access$200()I");
        let no_member = accessor(&mut dex, "access$300()I");
        let secret = accessor(&mut dex, "secret()I");
        let unknown = testing::method_ref(&mut dex, "Lcom/app/Missing;", "access$000()V");

        let resolver = SyntheticAccessorResolver::new(&dex);
        assert!(!resolver.looks_like_synthetic_accessor(secret).unwrap());
        assert_eq!(resolver.accessed_member(secret).unwrap(), None);
        assert_eq!(resolver.accessed_member(not_synthetic).unwrap(), None);
        assert_eq!(resolver.accessed_member(no_member).unwrap(), None);
        assert_eq!(resolver.accessed_member(unknown).unwrap(), None);
    }
}
